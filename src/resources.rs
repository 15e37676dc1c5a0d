use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use url::Url;

use crate::fetch::Fetcher;
use crate::workspace::write_asset;

static IMAGE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(?:png|jpe?g|gif|svg|webp)$").expect("valid image extension regex")
});
static FONT_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(?:ttf|otf|woff2?|eot)$").expect("valid font extension regex")
});
static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("valid file name regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Image,
    Font,
}

impl ResourceKind {
    pub fn folder(self) -> &'static str {
        match self {
            ResourceKind::Image => "images",
            ResourceKind::Font => "fonts",
        }
    }

    pub fn from_reference(url: &Url) -> Option<Self> {
        let path = url.path();
        if IMAGE_EXTENSION.is_match(path) {
            Some(ResourceKind::Image)
        } else if FONT_EXTENSION.is_match(path) {
            Some(ResourceKind::Font)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub url: Url,
    pub path: String,
    pub kind: ResourceKind,
    pub media_type: String,
}

/// Deduplicates resources by absolute URL and persists their bytes under
/// `assets_dir`. Failed downloads are not remembered, so a later reference
/// to the same URL tries again.
#[derive(Debug)]
pub struct ResourceStore {
    assets_dir: PathBuf,
    by_url: HashMap<Url, usize>,
    refs: Vec<ResourceRef>,
    used_paths: HashSet<String>,
}

impl ResourceStore {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            by_url: HashMap::new(),
            refs: Vec::new(),
            used_paths: HashSet::new(),
        }
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    pub fn refs(&self) -> &[ResourceRef] {
        &self.refs
    }

    pub fn into_refs(self) -> Vec<ResourceRef> {
        self.refs
    }

    pub fn lookup(&self, url: &Url) -> Option<&ResourceRef> {
        self.by_url.get(url).map(|idx| &self.refs[*idx])
    }

    pub async fn intern(
        &mut self,
        fetcher: &dyn Fetcher,
        url: &Url,
        kind: ResourceKind,
    ) -> Option<String> {
        if let Some(existing) = self.lookup(url) {
            return Some(existing.path.clone());
        }

        let fetched = match fetcher.fetch_bytes(url).await {
            Ok(fetched) => fetched,
            Err(err) => {
                tracing::warn!(%url, error = %err, "resource download failed");
                return None;
            }
        };

        let file_name = target_file_name(url, fetched.content_type.as_deref());
        let path = self.unique_path(kind.folder(), &file_name);
        if let Err(err) = write_asset(&self.assets_dir, &path, &fetched.bytes) {
            tracing::warn!(%url, %path, error = %format!("{err:#}"), "resource not stored");
            return None;
        }

        tracing::debug!(%url, %path, "stored resource");
        self.used_paths.insert(path.clone());
        self.by_url.insert(url.clone(), self.refs.len());
        self.refs.push(ResourceRef {
            url: url.clone(),
            media_type: media_type_for_path(&path, fetched.content_type.as_deref()),
            path: path.clone(),
            kind,
        });
        Some(path)
    }

    fn unique_path(&self, folder: &str, file_name: &str) -> String {
        let candidate = format!("{folder}/{file_name}");
        if !self.used_paths.contains(&candidate) {
            return candidate;
        }
        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (file_name, None),
        };
        (1..)
            .map(|n| match ext {
                Some(ext) => format!("{folder}/{stem}_{n}.{ext}"),
                None => format!("{folder}/{stem}_{n}"),
            })
            .find(|p| !self.used_paths.contains(p))
            .unwrap_or(candidate)
    }
}

/// File name for a downloaded resource: the sanitized last path segment, or
/// a hash of the URL when the segment is empty or has no extension.
pub fn target_file_name(url: &Url, content_type: Option<&str>) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let sanitized = UNSAFE_FILE_CHARS.replace_all(segment, "_");
    let has_extension = sanitized
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty());
    if has_extension {
        return sanitized.into_owned();
    }

    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    let ext = content_type
        .map(extension_for_content_type)
        .unwrap_or("bin");
    format!("res_{}.{ext}", &digest[..16])
}

pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let Some((_, subtype)) = essence.split_once('/') else {
        return "bin";
    };
    match subtype {
        "jpeg" | "jpg" | "pjpeg" => "jpg",
        "png" => "png",
        "gif" => "gif",
        "svg+xml" => "svg",
        "webp" => "webp",
        "woff" | "font-woff" | "x-font-woff" => "woff",
        "woff2" | "font-woff2" | "x-font-woff2" => "woff2",
        "otf" | "x-font-otf" | "opentype" | "x-font-opentype" => "otf",
        "ttf" | "sfnt" | "truetype" | "x-font-ttf" | "x-font-truetype" => "ttf",
        "vnd.ms-fontobject" | "x-font-eot" => "eot",
        _ => "bin",
    }
}

pub fn media_type_for_path(path: &str, content_type: Option<&str>) -> String {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let known = match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "webp" => Some("image/webp"),
        "ttf" => Some("font/ttf"),
        "otf" => Some("font/otf"),
        "woff" => Some("font/woff"),
        "woff2" => Some("font/woff2"),
        "eot" => Some("application/vnd.ms-fontobject"),
        _ => None,
    };
    match (known, content_type) {
        (Some(known), _) => known.to_owned(),
        (None, Some(header)) => header
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_owned(),
        (None, None) => "application/octet-stream".to_owned(),
    }
}
