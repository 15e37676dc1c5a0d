use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// Markup conventions of the source site that the slicing and restructuring
/// heuristics key on. Defaults match bilinguis-style two-column pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub section_marker_class: String,
    pub row_class: String,
    pub column_class: String,
    pub breadcrumb_class: String,
    pub navbar_class: String,
    pub title_classes: Vec<String>,
    pub next_link_container_classes: Vec<String>,
    pub chrome_classes: Vec<String>,
    pub chrome_ids: Vec<String>,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            section_marker_class: "text-center".to_owned(),
            row_class: "row".to_owned(),
            column_class: "col-xs-6".to_owned(),
            breadcrumb_class: "breadcrumb".to_owned(),
            navbar_class: "navbar".to_owned(),
            title_classes: vec![
                "text-center".to_owned(),
                "chapter-title".to_owned(),
                "section-title".to_owned(),
            ],
            next_link_container_classes: vec![
                "text-center".to_owned(),
                "prev-next-links".to_owned(),
            ],
            chrome_classes: vec![
                "social-share-buttons".to_owned(),
                "navbar".to_owned(),
                "breadcrumb".to_owned(),
                "menu".to_owned(),
                "prev-next-links".to_owned(),
            ],
            chrome_ids: vec!["pagination".to_owned()],
        }
    }
}

impl SiteProfile {
    /// Reads a YAML profile; keys missing from the file keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("read site profile: {}", path.display()))?;
        serde_yaml::from_str(&yaml)
            .with_context(|| format!("parse site profile: {}", path.display()))
    }

    pub fn load_or_default(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(Path::new(path)),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_profile_keeps_defaults() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("profile.yaml");
        std::fs::write(&path, "row_class: line\ncolumn_class: half\n")?;

        let profile = SiteProfile::load(&path)?;

        assert_eq!(profile.row_class, "line");
        assert_eq!(profile.column_class, "half");
        assert_eq!(profile.section_marker_class, "text-center");
        assert_eq!(profile.chrome_ids, vec!["pagination"]);
        Ok(())
    }
}
