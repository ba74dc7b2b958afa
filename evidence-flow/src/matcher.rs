//! Phrase matching over rendered document text.
//!
//! [`match_phrases`] cuts a text into plain and matched [`Span`]s. The spans
//! always concatenate back to the input, matched spans never overlap, and a
//! phrase is searched literally and case-insensitively.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::ops::Range;
use tracing::debug;

/// Phrases whose trimmed length is at or below this many characters are ignored.
pub const MIN_PHRASE_CHARS: usize = 3;

/// A contiguous run of text, either plain or matched by a phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub text: String,
    pub is_match: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_match: false,
        }
    }

    pub fn matched(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_match: true,
        }
    }
}

#[derive(Debug, Clone)]
struct Segment {
    range: Range<usize>,
    is_match: bool,
}

/// Split `text` into spans, marking every occurrence of any of `phrases`.
///
/// Longer phrases are applied first; once a region is matched it is never
/// scanned again, so a phrase nested inside an already matched one does not
/// split it.
pub fn match_phrases<I, S>(text: &str, phrases: I) -> Vec<Span>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let targets = match_targets(phrases);
    if text.is_empty() || targets.is_empty() {
        return vec![Span::plain(text)];
    }

    let mut segments = vec![Segment {
        range: 0..text.len(),
        is_match: false,
    }];

    for phrase in &targets {
        let pattern = match RegexBuilder::new(&regex::escape(phrase))
            .case_insensitive(true)
            .build()
        {
            Ok(pattern) => pattern,
            Err(e) => {
                debug!("Skipping phrase that cannot be compiled: {}", e);
                continue;
            }
        };

        let mut next = Vec::with_capacity(segments.len());
        for segment in segments {
            if segment.is_match {
                next.push(segment);
                continue;
            }

            let offset = segment.range.start;
            let haystack = &text[segment.range.clone()];
            let mut cursor = 0;

            for found in pattern.find_iter(haystack) {
                if found.start() > cursor {
                    next.push(Segment {
                        range: offset + cursor..offset + found.start(),
                        is_match: false,
                    });
                }
                next.push(Segment {
                    range: offset + found.start()..offset + found.end(),
                    is_match: true,
                });
                cursor = found.end();
            }

            if cursor < haystack.len() {
                next.push(Segment {
                    range: offset + cursor..segment.range.end,
                    is_match: false,
                });
            }
        }
        segments = next;
    }

    segments
        .into_iter()
        .map(|segment| Span {
            text: text[segment.range].to_string(),
            is_match: segment.is_match,
        })
        .collect()
}

/// Trimmed, distinct phrases long enough to match, longest first. Equal-length
/// phrases keep their input order.
fn match_targets<I, S>(phrases: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut targets: Vec<String> = phrases
        .into_iter()
        .map(|phrase| phrase.as_ref().trim().to_string())
        .filter(|phrase| phrase.chars().count() > MIN_PHRASE_CHARS)
        .filter(|phrase| seen.insert(phrase.clone()))
        .collect();

    targets.sort_by_key(|phrase| Reverse(phrase.chars().count()));
    targets
}

/// Join spans back into one string, wrapping matched spans in `open`/`close`.
pub fn render_marked(spans: &[Span], open: &str, close: &str) -> String {
    let mut rendered = String::new();
    for span in spans {
        if span.is_match {
            rendered.push_str(open);
            rendered.push_str(&span.text);
            rendered.push_str(close);
        } else {
            rendered.push_str(&span.text);
        }
    }
    rendered
}
