use std::collections::BTreeSet;

use crate::model::Message;

/// Phrases to highlight when `document_id` is viewed from `message`.
///
/// A document the user has not asked to analyze stays clean: without an
/// analysis entry the result is empty even when citations point at it. Once
/// an entry exists, the message's citation snippets for the document are
/// merged with the stored phrases.
pub fn resolve(message: &Message, document_id: &str) -> BTreeSet<String> {
    let Some(analyzed) = message.highlights_for(document_id) else {
        return BTreeSet::new();
    };

    message
        .snippets_for(document_id)
        .map(str::to_string)
        .chain(analyzed.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Citation;

    fn cited_message() -> Message {
        Message::assistant(
            "You get 25 days of annual leave.",
            vec![
                Citation::new("vacation", "25 days of annual leave"),
                Citation::new("holidays", "public holidays"),
                Citation::new("vacation", "carried over"),
            ],
        )
    }

    #[test]
    fn test_unanalyzed_document_resolves_empty() {
        let message = cited_message();
        assert!(resolve(&message, "vacation").is_empty());
        assert!(resolve(&message, "unknown").is_empty());
    }

    #[test]
    fn test_analyzed_document_merges_snippets_and_phrases() {
        let message = cited_message().with_highlights(
            "vacation",
            vec!["25 days of annual leave".to_string(), "per year".to_string()],
        );

        let phrases = resolve(&message, "vacation");
        let expected: BTreeSet<String> = ["25 days of annual leave", "carried over", "per year"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(phrases, expected);
        assert!(resolve(&message, "holidays").is_empty());
    }

    #[test]
    fn test_empty_analysis_still_returns_snippets() {
        let message = cited_message().with_highlights("holidays", vec![]);
        let phrases = resolve(&message, "holidays");
        assert_eq!(phrases.into_iter().collect::<Vec<_>>(), vec!["public holidays"]);
    }

    #[test]
    fn test_union_is_case_sensitive() {
        let message = cited_message().with_highlights(
            "vacation",
            vec!["25 Days of Annual Leave".to_string()],
        );
        assert_eq!(resolve(&message, "vacation").len(), 3);
    }
}
