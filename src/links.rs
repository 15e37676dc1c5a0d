use std::collections::HashMap;

use url::Url;

use crate::chapter::{ChapterRecord, chapter_file_name};
use crate::dom::Document;
use crate::fetch::Fetcher;
use crate::resources::{ResourceKind, ResourceStore};

/// Points every `<img>` at its stored copy. Images that cannot be stored are
/// removed from the fragment.
pub async fn rewrite_images(
    fragment: &mut Document,
    page_url: &Url,
    fetcher: &dyn Fetcher,
    store: &mut ResourceStore,
) {
    let root = fragment.root();
    for img in fragment.find_by_tag(root, "img") {
        let Some(src) = fragment.attr(img, "src").map(str::to_owned) else {
            continue;
        };
        if src.starts_with("data:") {
            continue;
        }

        let stored = match page_url.join(&src) {
            Ok(url) => store.intern(fetcher, &url, ResourceKind::Image).await,
            Err(err) => {
                tracing::warn!(%src, error = %err, "unparsable image source");
                None
            }
        };
        match stored {
            Some(path) => {
                fragment.set_attr(img, "src", &path);
                fragment.remove_attr(img, "srcset");
            }
            None => {
                tracing::warn!(%src, page = %page_url, "dropping image");
                fragment.remove(img);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinkRewriter {
    targets: HashMap<String, usize>,
}

impl LinkRewriter {
    pub fn new(records: &[ChapterRecord]) -> Self {
        let mut targets = HashMap::new();
        for record in records {
            targets.entry(link_key(&record.url)).or_insert(record.index);
        }
        Self { targets }
    }

    /// Links to a crawled page become `chap_NNN.xhtml`, keeping any fragment.
    /// Other same-origin links are unwrapped to plain text.
    pub fn rewrite(&self, record: &mut ChapterRecord) {
        let page_url = record.url.clone();
        let content = &mut record.content;
        let root = content.root();

        for link in content.find_by_tag(root, "a") {
            let Some(href) = content.attr(link, "href") else {
                continue;
            };
            if href.starts_with("data:") || href.starts_with('#') {
                continue;
            }
            let Ok(target) = page_url.join(href) else {
                continue;
            };
            if target.origin() != page_url.origin() {
                continue;
            }

            match self.targets.get(&link_key(&target)) {
                Some(index) => {
                    let mut local = chapter_file_name(*index);
                    if let Some(fragment) = target.fragment() {
                        local.push('#');
                        local.push_str(fragment);
                    }
                    content.set_attr(link, "href", &local);
                }
                None => {
                    tracing::debug!(%target, "unwrapping link to uncrawled page");
                    content.unwrap(link);
                }
            }
        }
    }
}

fn link_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_query(None);
    key.set_fragment(None);
    key.into()
}
