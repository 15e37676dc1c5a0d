use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::dom::Document;

static CHAPTER_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(?:c|chapter|chapitre|part|partie)-?(\d+)").expect("valid chapter marker regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterMarker {
    pub number: u64,
    /// Byte offset where the marker starts; everything before it is the
    /// collection prefix.
    pub start: usize,
}

pub fn chapter_marker(path: &str) -> Option<ChapterMarker> {
    let caps = CHAPTER_MARKER.captures(path)?;
    let whole = caps.get(0)?;
    let number = caps.get(1)?.as_str().parse().ok()?;
    Some(ChapterMarker {
        number,
        start: whole.start(),
    })
}

#[derive(Debug, Clone)]
pub struct ChapterRecord {
    pub index: usize,
    pub title: String,
    pub content: Document,
    pub url: Url,
    pub is_chapter_boundary: bool,
}

impl ChapterRecord {
    pub fn file_name(&self) -> String {
        chapter_file_name(self.index)
    }
}

pub fn chapter_file_name(index: usize) -> String {
    format!("chap_{index:03}.xhtml")
}

/// Table-of-contents entry. Borrows its record, so a title fixed up later is
/// what the entry shows.
#[derive(Debug, Clone, Copy)]
pub struct NavEntry<'a> {
    pub record: &'a ChapterRecord,
}

impl NavEntry<'_> {
    pub fn title(&self) -> &str {
        &self.record.title
    }

    pub fn file_name(&self) -> String {
        self.record.file_name()
    }
}

pub fn nav_entries(records: &[ChapterRecord]) -> impl Iterator<Item = NavEntry<'_>> {
    records
        .iter()
        .filter(|r| r.is_chapter_boundary)
        .map(|record| NavEntry { record })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, title: &str, boundary: bool) -> anyhow::Result<ChapterRecord> {
        Ok(ChapterRecord {
            index,
            title: title.to_owned(),
            content: Document::new("div"),
            url: Url::parse(&format!("https://example.com/book/page-{index}/"))?,
            is_chapter_boundary: boundary,
        })
    }

    #[test]
    fn chapter_marker_variants() {
        let cases = [
            ("/book/alice/chapter-4/", Some(4)),
            ("/book/alice/chapitre12", Some(12)),
            ("/book/c-7/", Some(7)),
            ("/partie-02/", Some(2)),
            ("/contents/", None),
            ("/introduction/", None),
        ];
        for (path, expected) in cases {
            assert_eq!(chapter_marker(path).map(|m| m.number), expected, "{path}");
        }
        assert_eq!(chapter_marker("/book/alice/chapter-4/").map(|m| m.start), Some(11));
    }

    #[test]
    fn nav_entries_follow_records_by_identity() -> anyhow::Result<()> {
        let mut records = vec![
            record(1, "Chapter 1", true),
            record(2, "Chapter 1", true),
            record(3, "Page 3", false),
        ]
        .into_iter()
        .collect::<anyhow::Result<Vec<_>>>()?;
        records[1].title = "Chapter 2".to_owned();

        let entries = nav_entries(&records)
            .map(|e| (e.title().to_owned(), e.file_name()))
            .collect::<Vec<_>>();

        assert_eq!(
            entries,
            vec![
                ("Chapter 1".to_owned(), "chap_001.xhtml".to_owned()),
                ("Chapter 2".to_owned(), "chap_002.xhtml".to_owned()),
            ]
        );
        Ok(())
    }
}
