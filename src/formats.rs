use serde::{Deserialize, Serialize};

use crate::chapter::ChapterRecord;
use crate::resources::{ResourceKind, ResourceRef};

/// One line of `chapters.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSnapshot {
    pub index: usize,
    pub title: String,
    pub url: String,
    pub chapter_boundary: bool,
    pub file_name: String,
    /// The restructured fragment serialized as XHTML.
    pub content: String,
}

impl From<&ChapterRecord> for ChapterSnapshot {
    fn from(record: &ChapterRecord) -> Self {
        Self {
            index: record.index,
            title: record.title.clone(),
            url: record.url.to_string(),
            chapter_boundary: record.is_chapter_boundary,
            file_name: record.file_name(),
            content: record.content.to_xhtml(record.content.root()),
        }
    }
}

/// One line of `resources.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub url: String,
    pub path: String,
    pub kind: ResourceKind,
    pub media_type: String,
}

impl From<&ResourceRef> for ResourceSnapshot {
    fn from(resource: &ResourceRef) -> Self {
        Self {
            url: resource.url.to_string(),
            path: resource.path.clone(),
            kind: resource.kind,
            media_type: resource.media_type.clone(),
        }
    }
}
