use std::fs::OpenOptions;
use std::io::{BufRead as _, BufReader, BufWriter, Write as _};
use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::chapter::ChapterRecord;
use crate::formats::{ChapterSnapshot, ResourceSnapshot};
use crate::resources::ResourceRef;

pub const CHAPTERS_FILE: &str = "chapters.jsonl";
pub const RESOURCES_FILE: &str = "resources.jsonl";
pub const STYLESHEET_FILE: &str = "style.css";
pub const ASSETS_DIR: &str = "assets";

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Creates a fresh workspace. An existing directory is never reused.
    pub fn create(root: &Path) -> anyhow::Result<Self> {
        if root.exists() {
            anyhow::bail!("workspace directory already exists: {}", root.display());
        }
        let assets = root.join(ASSETS_DIR);
        std::fs::create_dir_all(&assets)
            .with_context(|| format!("create workspace dir: {}", assets.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn open(root: &Path) -> anyhow::Result<Self> {
        if !root.is_dir() {
            anyhow::bail!("workspace directory not found: {}", root.display());
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    pub fn chapters_path(&self) -> PathBuf {
        self.root.join(CHAPTERS_FILE)
    }

    pub fn resources_path(&self) -> PathBuf {
        self.root.join(RESOURCES_FILE)
    }

    pub fn stylesheet_path(&self) -> PathBuf {
        self.root.join(STYLESHEET_FILE)
    }

    pub fn write_snapshot(
        &self,
        chapters: &[ChapterRecord],
        resources: &[ResourceRef],
        stylesheet: &str,
    ) -> anyhow::Result<()> {
        write_jsonl(
            &self.chapters_path(),
            chapters.iter().map(ChapterSnapshot::from),
        )?;
        write_jsonl(
            &self.resources_path(),
            resources.iter().map(ResourceSnapshot::from),
        )?;
        let path = self.stylesheet_path();
        std::fs::write(&path, stylesheet)
            .with_context(|| format!("write stylesheet: {}", path.display()))?;
        Ok(())
    }

    pub fn read_chapters(&self) -> anyhow::Result<Vec<ChapterSnapshot>> {
        read_jsonl(&self.chapters_path())
    }

    pub fn read_resources(&self) -> anyhow::Result<Vec<ResourceSnapshot>> {
        read_jsonl(&self.resources_path())
    }

    pub fn read_stylesheet(&self) -> anyhow::Result<String> {
        let path = self.stylesheet_path();
        std::fs::read_to_string(&path)
            .with_context(|| format!("read stylesheet: {}", path.display()))
    }

    pub fn asset_path(&self, rel_path: &str) -> anyhow::Result<PathBuf> {
        asset_path(&self.assets_dir(), rel_path)
    }
}

/// Joins a resource's relative path onto `assets_dir`, refusing anything that
/// could land outside it.
pub fn asset_path(assets_dir: &Path, rel_path: &str) -> anyhow::Result<PathBuf> {
    let rel = Path::new(rel_path);
    if rel_path.is_empty() {
        anyhow::bail!("asset path must not be empty");
    }
    if !rel
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        anyhow::bail!("asset path must be a plain relative path: {rel_path}");
    }
    Ok(assets_dir.join(rel))
}

pub fn write_asset(assets_dir: &Path, rel_path: &str, bytes: &[u8]) -> anyhow::Result<()> {
    let path = asset_path(assets_dir, rel_path)?;
    if path.exists() {
        anyhow::bail!("asset already exists: {}", path.display());
    }

    let parent_dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("asset path must have parent: {}", path.display()))?;
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("create asset dir: {}", parent_dir.display()))?;

    std::fs::write(&path, bytes).with_context(|| format!("write asset: {}", path.display()))?;

    Ok(())
}

fn write_jsonl<T: Serialize>(path: &Path, records: impl Iterator<Item = T>) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .with_context(|| format!("create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut out, &record)
            .with_context(|| format!("write record json: {}", path.display()))?;
        out.write_all(b"\n")
            .with_context(|| format!("write record newline: {}", path.display()))?;
    }
    out.flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

fn read_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let file = std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("parse {} line {}", path.display(), idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::dom::Document;
    use crate::resources::ResourceKind;

    #[test]
    fn create_refuses_existing_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;

        let err = Workspace::create(dir.path()).err();

        assert!(
            err.is_some_and(|e| e.to_string().contains("already exists")),
            "existing workspace must be rejected"
        );
        Ok(())
    }

    #[test]
    fn snapshot_is_read_back_in_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let workspace = Workspace::create(&dir.path().join("ws"))?;
        let mut content = Document::new("div");
        let p = content.create_element("p");
        let text = content.create_text("Bonjour & adieu");
        content.append(p, text);
        content.append(content.root(), p);
        let chapters = vec![
            ChapterRecord {
                index: 1,
                title: "Chapter 1".to_owned(),
                content,
                url: Url::parse("https://example.com/chapter-1/")?,
                is_chapter_boundary: true,
            },
            ChapterRecord {
                index: 2,
                title: "Page 2".to_owned(),
                content: Document::new("div"),
                url: Url::parse("https://example.com/chapter-1/2/")?,
                is_chapter_boundary: false,
            },
        ];
        let resources = vec![ResourceRef {
            url: Url::parse("https://example.com/a.png")?,
            path: "images/a.png".to_owned(),
            kind: ResourceKind::Image,
            media_type: "image/png".to_owned(),
        }];

        workspace.write_snapshot(&chapters, &resources, "body {}")?;

        let read = Workspace::open(workspace.root())?;
        let chapters = read.read_chapters()?;
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].file_name, "chap_001.xhtml");
        assert_eq!(chapters[0].content, "<div><p>Bonjour &amp; adieu</p></div>");
        assert!(!chapters[1].chapter_boundary);
        assert_eq!(read.read_resources()?[0].kind, ResourceKind::Image);
        assert_eq!(read.read_stylesheet()?, "body {}");
        Ok(())
    }

    #[test]
    fn asset_paths_stay_inside_assets_dir() {
        let base = Path::new("/tmp/ws/assets");
        assert!(asset_path(base, "images/a.png").is_ok());
        assert!(asset_path(base, "../escape.png").is_err());
        assert!(asset_path(base, "/etc/passwd").is_err());
        assert!(asset_path(base, "images/./a.png").is_ok());
        assert!(asset_path(base, "").is_err());
    }
}
