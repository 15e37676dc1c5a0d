use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::chapter::chapter_marker;
use crate::dom::Document;
use crate::profile::SiteProfile;

static CHAPTER_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:chapter|part|chapitre|partie)\s*\d+").expect("valid chapter title regex")
});

const TITLE_HEADINGS: &[&str] = &["h1", "h2", "h3"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleRule {
    Heading,
    UrlChapterNumber,
    UrlKeyword,
    Ordinal,
}

pub const TITLE_RULES: [TitleRule; 4] = [
    TitleRule::Heading,
    TitleRule::UrlChapterNumber,
    TitleRule::UrlKeyword,
    TitleRule::Ordinal,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub title: String,
    pub rule: TitleRule,
    pub is_chapter_boundary: bool,
}

pub fn classify(
    fragment: &Document,
    url: &Url,
    ordinal: usize,
    profile: &SiteProfile,
) -> Classification {
    let (title, rule) = TITLE_RULES
        .iter()
        .find_map(|rule| resolve_title(*rule, fragment, url, ordinal, profile).map(|t| (t, *rule)))
        .unwrap_or_else(|| (format!("Page {ordinal}"), TitleRule::Ordinal));
    let is_chapter_boundary = is_chapter_boundary(url, &title);

    Classification {
        title,
        rule,
        is_chapter_boundary,
    }
}

pub fn resolve_title(
    rule: TitleRule,
    fragment: &Document,
    url: &Url,
    ordinal: usize,
    profile: &SiteProfile,
) -> Option<String> {
    let path = url.path().to_ascii_lowercase();
    match rule {
        TitleRule::Heading => fragment
            .find_all(fragment.root(), |e| {
                TITLE_HEADINGS.contains(&e.name.as_str())
                    && profile.title_classes.iter().any(|c| e.has_class(c))
            })
            .into_iter()
            .map(|heading| fragment.text(heading).trim().to_owned())
            .find(|text| !text.is_empty()),
        TitleRule::UrlChapterNumber => {
            chapter_marker(&path).map(|marker| format!("Chapter {}", marker.number))
        }
        TitleRule::UrlKeyword => ["introduction", "preface"]
            .into_iter()
            .find(|word| path.contains(word))
            .map(capitalize),
        TitleRule::Ordinal => Some(format!("Page {ordinal}")),
    }
}

/// A page is a TOC entry only when both its URL and its title look like a
/// numbered chapter or part.
pub fn is_chapter_boundary(url: &Url, title: &str) -> bool {
    chapter_marker(&url.path().to_ascii_lowercase()).is_some()
        && CHAPTER_TITLE.is_match(title.trim())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(body: &str) -> Document {
        let page = Document::parse(&format!("<html><body>{body}</body></html>"));
        let mut fragment = Document::new("div");
        let root = fragment.root();
        if let Some(body) = page.find_first_by_tag(page.root(), "body") {
            for child in page.children(body) {
                let copy = fragment.import(&page, *child);
                fragment.append(root, copy);
            }
        }
        fragment
    }

    fn url(path: &str) -> Url {
        Url::parse("https://www.bilinguis.com")
            .and_then(|base| base.join(path))
            .expect("valid test url")
    }

    #[test]
    fn heading_with_title_class_wins() {
        let doc = fragment(r#"<h2>Plain</h2><h2 class="chapter-title">Le Terrier</h2>"#);
        let got = classify(&doc, &url("/book/alice/fr/en/chapter-1/"), 1, &SiteProfile::default());
        assert_eq!(got.title, "Le Terrier");
        assert_eq!(got.rule, TitleRule::Heading);
        assert!(!got.is_chapter_boundary);
    }

    #[test]
    fn url_number_gives_chapter_title_and_boundary() {
        let doc = fragment("<p>text</p>");
        let got = classify(&doc, &url("/book/alice/fr/en/chapter-03/"), 4, &SiteProfile::default());
        assert_eq!(got.title, "Chapter 3");
        assert_eq!(got.rule, TitleRule::UrlChapterNumber);
        assert!(got.is_chapter_boundary);
    }

    #[test]
    fn keywords_and_ordinal_fallback() {
        let doc = fragment("<p>text</p>");
        let profile = SiteProfile::default();
        assert_eq!(
            classify(&doc, &url("/book/alice/Preface/"), 2, &profile).title,
            "Preface"
        );
        assert_eq!(
            classify(&doc, &url("/book/alice/introduction"), 2, &profile).title,
            "Introduction"
        );
        let fallback = classify(&doc, &url("/book/alice/"), 7, &profile);
        assert_eq!(fallback.title, "Page 7");
        assert_eq!(fallback.rule, TitleRule::Ordinal);
        assert!(!fallback.is_chapter_boundary);
    }

    #[test]
    fn boundary_needs_url_and_title_to_agree() {
        assert!(is_chapter_boundary(&url("/chapter-3/"), "Chapter 3"));
        assert!(!is_chapter_boundary(&url("/chapter-3/"), "Page 7"));
        assert!(!is_chapter_boundary(&url("/about/"), "Chapter 3"));
        assert!(is_chapter_boundary(&url("/partie-2/"), "part 2: the sea"));
    }

    #[test]
    fn heading_reading_chapter_still_needs_chapter_url() {
        let doc = fragment(r#"<h1 class="text-center">Chapter 3</h1>"#);
        let got = classify(&doc, &url("/book/alice/story/"), 1, &SiteProfile::default());
        assert_eq!(got.title, "Chapter 3");
        assert!(!got.is_chapter_boundary);
    }
}
