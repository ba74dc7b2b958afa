//! Loads handbook documents from a directory of markdown files.

use async_trait::async_trait;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{
    backend::DocumentSource,
    error::{EvidenceError, Result},
    model::Document,
};

const DEFAULT_CATEGORY: &str = "General";

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    id: Option<String>,
    title: Option<String>,
    category: Option<String>,
}

/// A directory tree of `*.md` files, one document per file. The first
/// directory level is the category.
#[derive(Debug, Clone)]
pub struct MarkdownHandbook {
    root: PathBuf,
}

impl MarkdownHandbook {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn load(&self) -> Result<Vec<Document>> {
        if !self.root.is_dir() {
            return Err(EvidenceError::Handbook(format!(
                "handbook directory not found: {}",
                self.root.display()
            )));
        }

        let mut files = Vec::new();
        collect_markdown(&self.root, &mut files)?;
        files.sort();

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            let relative = path.strip_prefix(&self.root).unwrap_or(&path);
            match fs::read_to_string(&path) {
                Ok(raw) => documents.push(parse_document(relative, &raw)),
                Err(e) => warn!("Skipping unreadable handbook file {}: {}", relative.display(), e),
            }
        }

        debug!(
            "Loaded {} markdown documents from {}",
            documents.len(),
            self.root.display()
        );
        Ok(documents)
    }
}

#[async_trait]
impl DocumentSource for MarkdownHandbook {
    async fn fetch_documents(&self) -> Result<Vec<Document>> {
        let handbook = self.clone();
        tokio::task::spawn_blocking(move || handbook.load())
            .await
            .map_err(|e| EvidenceError::Handbook(e.to_string()))?
    }
}

fn collect_markdown(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_markdown(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "md") {
            files.push(path);
        }
    }
    Ok(())
}

/// Build a document from a file's path (relative to the handbook root) and
/// raw contents.
pub fn parse_document(relative: &Path, raw: &str) -> Document {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let components: Vec<String> = relative
        .with_extension("")
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();

    let stem_title = relative
        .file_stem()
        .map(|stem| humanize(&stem.to_string_lossy()))
        .unwrap_or_default();

    let mut id = components.join("-");
    let mut title = stem_title.clone();
    let mut category = if components.len() > 1 {
        humanize(&components[0])
    } else {
        DEFAULT_CATEGORY.to_string()
    };
    let mut content = raw.to_string();

    if raw.starts_with("---") {
        let parts: Vec<&str> = raw.splitn(3, "---").collect();
        if parts.len() == 3 {
            content = parts[2].trim().to_string();
            match serde_yaml::from_str::<Option<FrontMatter>>(parts[1]) {
                Ok(front_matter) => {
                    let front_matter = front_matter.unwrap_or_default();
                    id = front_matter.id.unwrap_or(id);
                    title = front_matter.title.unwrap_or(title);
                    category = front_matter.category.unwrap_or(category);
                }
                Err(e) => warn!(
                    "Invalid front matter in {}: {}",
                    relative.display(),
                    e
                ),
            }
        }
    }

    if title == stem_title {
        if let Some(heading) = content.lines().find_map(|line| line.strip_prefix("# ")) {
            title = heading.trim().to_string();
        }
    }

    Document {
        id,
        title,
        category,
        content,
    }
}

/// `it-security` / `vacation_policy` to `It Security` / `Vacation Policy`.
fn humanize(raw: &str) -> String {
    raw.replace(['_', '-'], " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
