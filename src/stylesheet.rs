use std::sync::LazyLock;

use regex::Regex;
use url::{Origin, Url};

use crate::dom::Document;
use crate::fetch::Fetcher;
use crate::resources::{ResourceKind, ResourceStore};

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")]*?)['"]?\s*\)"#).expect("valid css url regex")
});

/// Layout every book gets, ahead of the site's own rules. The bilingual
/// table keeps both languages side by side at equal width.
pub const BASE_CSS: &str = r#"@charset "utf-8";

html { font-family: serif; }
body { margin: 0; padding: 0 1em; line-height: 1.5; }
p { margin: 0 0 0.6em 0; }
img { max-width: 100%; height: auto; }

table.epub-bilingual-table {
  width: 100%;
  table-layout: fixed;
  border-collapse: collapse;
  margin: 0 0 1em 0;
}
table.epub-bilingual-table td {
  width: 50%;
  vertical-align: top;
  padding: 0.2em 0.6em;
}
table.epub-bilingual-table td + td {
  border-left: 1px solid #ccc;
}
"#;

pub async fn collect_stylesheet(
    page: &Document,
    page_url: &Url,
    fetcher: &dyn Fetcher,
    store: &mut ResourceStore,
) -> String {
    let origin = page_url.origin();
    let mut css = BASE_CSS.to_owned();

    let root = page.root();
    for node in page.find_all(root, |e| e.name == "style" || e.name == "link") {
        let block = if page.is_tag(node, "style") {
            let text = page.text(node);
            rewrite_css_urls(&text, page_url, &origin, fetcher, store).await
        } else {
            let is_stylesheet = page.attr(node, "rel").is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|r| r.eq_ignore_ascii_case("stylesheet"))
            });
            let Some(href) = page.attr(node, "href").filter(|_| is_stylesheet) else {
                continue;
            };
            let Ok(sheet_url) = page_url.join(href) else {
                tracing::warn!(href, "unparsable stylesheet link");
                continue;
            };
            match fetcher.fetch_bytes(&sheet_url).await {
                Ok(fetched) => {
                    let text = String::from_utf8_lossy(&fetched.bytes);
                    rewrite_css_urls(&text, &sheet_url, &origin, fetcher, store).await
                }
                Err(err) => {
                    tracing::warn!(url = %sheet_url, error = %err, "stylesheet download failed");
                    continue;
                }
            }
        };
        css.push('\n');
        css.push_str(block.trim());
        css.push('\n');
    }
    css
}

pub async fn rewrite_css_urls(
    css: &str,
    base: &Url,
    origin: &Origin,
    fetcher: &dyn Fetcher,
    store: &mut ResourceStore,
) -> String {
    let references = CSS_URL
        .captures_iter(css)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let target = caps.get(1)?.as_str().trim();
            Some((whole.start(), whole.end(), target.to_owned()))
        })
        .collect::<Vec<_>>();

    let mut out = String::with_capacity(css.len());
    let mut cursor = 0;
    for (start, end, target) in references {
        out.push_str(&css[cursor..start]);
        cursor = end;

        let stored = match stored_reference(&target, base, origin) {
            Some((url, kind)) => store.intern(fetcher, &url, kind).await,
            None => None,
        };
        match stored {
            Some(path) => {
                out.push_str("url('../");
                out.push_str(&path);
                out.push_str("')");
            }
            None => out.push_str(&css[start..end]),
        }
    }
    out.push_str(&css[cursor..]);
    out
}

fn stored_reference(target: &str, base: &Url, origin: &Origin) -> Option<(Url, ResourceKind)> {
    if target.is_empty() || target.starts_with("data:") || target.starts_with('#') {
        return None;
    }
    let url = base.join(target).ok()?;
    if &url.origin() != origin {
        return None;
    }
    let kind = ResourceKind::from_reference(&url)?;
    Some((url, kind))
}
