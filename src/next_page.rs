use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::chapter::chapter_marker;
use crate::dom::{Document, NodeId};
use crate::profile::SiteProfile;

const RIGHT_GLYPHS: &[char] = &['»', '›', '→'];
const LEFT_GLYPHS: &[char] = &['«', '‹', '←'];

static NEXT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)next|suivant|suivante").expect("valid next-word regex"));
static PREVIOUS_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)previous|précédent").expect("valid previous-word regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextCue {
    Glyph,
    Word,
    Rel,
}

pub fn find_next(page: &Document, current: &Url, profile: &SiteProfile) -> Option<Url> {
    find_by_cue(page, current, profile).or_else(|| find_by_increment(page, current))
}

pub fn find_by_cue(page: &Document, current: &Url, profile: &SiteProfile) -> Option<Url> {
    for link in page.find_by_tag(page.root(), "a") {
        let Some(href) = page.attr(link, "href") else {
            continue;
        };
        let text = page.text(link);
        let text = text.trim();
        let Some(cue) = next_cue(page, link, text) else {
            continue;
        };
        let Ok(target) = current.join(href) else {
            continue;
        };
        if !is_forward_target(current, &target) {
            continue;
        }

        let in_nav_container = page
            .find_ancestor(link, |e| {
                e.name == "div"
                    && profile
                        .next_link_container_classes
                        .iter()
                        .any(|c| e.has_class(c))
            })
            .is_some();
        if in_nav_container {
            tracing::debug!(%target, ?cue, "next link inside navigation container");
            return Some(target);
        }
        if says_next(text) {
            tracing::debug!(%target, ?cue, "next link by text");
            return Some(target);
        }
        tracing::debug!(%target, ?cue, "ignoring weak next-link candidate");
    }
    None
}

pub fn next_cue(page: &Document, link: NodeId, text: &str) -> Option<NextCue> {
    if text.contains(RIGHT_GLYPHS) && !text.contains(LEFT_GLYPHS) {
        return Some(NextCue::Glyph);
    }
    if NEXT_WORD.is_match(text) {
        return Some(NextCue::Word);
    }
    let rel_next = page
        .attr(link, "rel")
        .is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case("next")));
    rel_next.then_some(NextCue::Rel)
}

fn says_next(text: &str) -> bool {
    NEXT_WORD.is_match(text) && !PREVIOUS_WORD.is_match(text)
}

/// Same origin, and not the current page or an anchor within it.
fn is_forward_target(current: &Url, target: &Url) -> bool {
    if target.origin() != current.origin() {
        return false;
    }
    if target.path() == current.path() {
        return target.query() != current.query() && target.fragment().is_none();
    }
    true
}

pub fn find_by_increment(page: &Document, current: &Url) -> Option<Url> {
    let current_path = current.path().to_ascii_lowercase();
    let marker = chapter_marker(&current_path)?;
    let prefix = &current_path[..marker.start];
    let wanted = marker.number.checked_add(1)?;

    for link in page.find_by_tag(page.root(), "a") {
        let Some(href) = page.attr(link, "href") else {
            continue;
        };
        let Ok(target) = current.join(href) else {
            continue;
        };
        if target.origin() != current.origin() {
            continue;
        }
        let target_path = target.path().to_ascii_lowercase();
        let Some(candidate) = chapter_marker(&target_path) else {
            continue;
        };
        if candidate.number == wanted && &target_path[..candidate.start] == prefix {
            tracing::debug!(%target, "next link by chapter number");
            return Some(target);
        }
    }
    None
}
