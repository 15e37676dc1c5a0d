use std::collections::{HashMap, HashSet};

use crate::dom::{Document, NodeId};
use crate::error::PageError;
use crate::profile::SiteProfile;

const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "form", "iframe", "nav", "header", "footer", "noscript",
];

const PRUNABLE_TAGS: &[&str] = &["p", "div", "span", "h1", "h2", "h3", "h4", "h5", "h6"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowVerdict {
    /// The row is the end marker or comes after it; slicing stops.
    EndMarker,
    /// The row wraps the end marker; its own nested rows are judged instead.
    EnclosesEndMarker,
    /// An enclosing row was already taken.
    Covered,
    Chrome,
    Empty,
    Content,
}

/// Copies the content rows of `page` into a new detached fragment rooted at a
/// `<div>`. The page itself is left untouched.
pub fn slice_content(page: &Document, profile: &SiteProfile) -> Result<Document, PageError> {
    let body = page
        .find_first_by_tag(page.root(), "body")
        .unwrap_or(page.root());

    let markers = page.find_by_class(body, Some("div"), &profile.section_marker_class);
    let end_marker = end_marker(&markers);
    if end_marker.is_none() {
        tracing::debug!(
            markers = markers.len(),
            "fewer than 3 section markers; keeping every content row"
        );
    }

    let order = page
        .descendants(body)
        .enumerate()
        .map(|(idx, id)| (id, idx))
        .collect::<HashMap<_, _>>();

    let mut fragment = Document::new("div");
    let root = fragment.root();
    let mut taken: HashSet<NodeId> = HashSet::new();

    for (idx, row) in page
        .find_by_class(body, Some("div"), &profile.row_class)
        .into_iter()
        .enumerate()
    {
        let verdict = row_verdict(page, row, end_marker, &order, &taken, profile);
        match verdict {
            RowVerdict::EndMarker => {
                tracing::debug!(row = idx, "reached end marker");
                break;
            }
            RowVerdict::Content => {
                let copy = fragment.import(page, row);
                fragment.append(root, copy);
                taken.insert(row);
            }
            _ => tracing::debug!(row = idx, ?verdict, "skipping row"),
        }
    }

    strip_chrome(&mut fragment, profile);
    prune_empty(&mut fragment);

    if !fragment.has_text(root) {
        return Err(PageError::EmptyContent);
    }
    Ok(fragment)
}

pub fn end_marker(markers: &[NodeId]) -> Option<NodeId> {
    markers.len().checked_sub(3).map(|idx| markers[idx])
}

pub fn row_verdict(
    page: &Document,
    row: NodeId,
    end_marker: Option<NodeId>,
    order: &HashMap<NodeId, usize>,
    taken: &HashSet<NodeId>,
    profile: &SiteProfile,
) -> RowVerdict {
    if let Some(marker) = end_marker {
        if row == marker || order.get(&row) > order.get(&marker) {
            return RowVerdict::EndMarker;
        }
        if page.contains(row, marker) {
            return RowVerdict::EnclosesEndMarker;
        }
    }
    if page.ancestors(row).any(|a| taken.contains(&a)) {
        return RowVerdict::Covered;
    }
    if is_chrome_row(page, row, profile) {
        return RowVerdict::Chrome;
    }
    if !page.has_text(row) && !page.contains_tag(row, "img") {
        return RowVerdict::Empty;
    }
    RowVerdict::Content
}

fn is_chrome_row(page: &Document, row: NodeId, profile: &SiteProfile) -> bool {
    page.has_class(row, &profile.breadcrumb_class)
        || page
            .find_first(row, |e| {
                e.has_class(&profile.breadcrumb_class)
                    || (e.name == "nav" && e.has_class(&profile.navbar_class))
            })
            .is_some()
}

fn strip_chrome(fragment: &mut Document, profile: &SiteProfile) {
    let root = fragment.root();
    let doomed = fragment.find_all(root, |e| {
        STRIPPED_TAGS.contains(&e.name.as_str())
            || profile.chrome_classes.iter().any(|c| e.has_class(c))
            || e.attr("id").is_some_and(|id| profile.chrome_ids.iter().any(|c| c == id))
    });
    for node in doomed {
        fragment.remove(node);
    }
}

fn prune_empty(fragment: &mut Document) {
    let root = fragment.root();
    let nodes = fragment.descendants(root).collect::<Vec<_>>();
    // Reverse pre-order visits every node after all of its descendants.
    for node in nodes.into_iter().rev() {
        let prunable = fragment
            .tag_name(node)
            .is_some_and(|name| PRUNABLE_TAGS.contains(&name));
        if !prunable {
            continue;
        }
        let keeps_something = fragment.has_text(node)
            || fragment.contains_tag(node, "img")
            || fragment
                .find_first(node, |e| e.name == "a" && e.attr("href").is_some())
                .is_some();
        if !keeps_something {
            fragment.remove(node);
        }
    }
}
