use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Utc;
use zip::write::SimpleFileOptions;

use crate::chapter::chapter_file_name;
use crate::cli::PackageArgs;
use crate::formats::{ChapterSnapshot, ResourceSnapshot};
use crate::workspace::Workspace;

const STYLESHEET_HREF: &str = "style/default.css";

#[derive(Debug, Clone)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub lang: String,
}

pub fn run(args: PackageArgs) -> anyhow::Result<PathBuf> {
    let workspace = Workspace::open(Path::new(&args.workspace))?;
    let out_path = match args.out {
        Some(out) => PathBuf::from(out),
        None => workspace.root().join(default_epub_file_name(&args.title)),
    };
    let metadata = BookMetadata {
        title: args.title,
        author: args.author,
        lang: args.lang,
    };

    create_from_workspace(&workspace, &out_path, &metadata, args.force)?;
    tracing::info!(epub = %out_path.display(), "wrote epub");
    Ok(out_path)
}

/// Title with everything but ASCII letters, digits and whitespace removed,
/// spaces turned into underscores.
pub fn default_epub_file_name(title: &str) -> String {
    let stem = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .replace(' ', "_");
    if stem.is_empty() {
        return "book.epub".to_owned();
    }
    format!("{stem}.epub")
}

pub fn create_from_workspace(
    workspace: &Workspace,
    out_path: &Path,
    metadata: &BookMetadata,
    force: bool,
) -> anyhow::Result<()> {
    if out_path.exists() && !force {
        anyhow::bail!("epub output already exists: {}", out_path.display());
    }
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create epub parent dir: {}", parent.display()))?;
    }

    let chapters = workspace.read_chapters().context("read chapters")?;
    if chapters.is_empty() {
        anyhow::bail!(
            "workspace has no chapters: {}",
            workspace.chapters_path().display()
        );
    }
    let resources = workspace.read_resources().context("read resources")?;
    let stylesheet = workspace.read_stylesheet()?;

    let lang = metadata.lang.trim();
    let lang = if lang.is_empty() { "und" } else { lang };
    let toc = toc_chapters(&chapters);

    let uuid = uuid::Uuid::new_v4();
    let modified = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    let container_xml = render_container_xml();
    let nav_xhtml = render_nav_xhtml(&metadata.title, lang, &toc);
    let toc_ncx = render_toc_ncx(&metadata.title, uuid, &toc);
    let content_opf = render_content_opf(metadata, lang, uuid, &modified, &chapters, &resources);

    let mut out_options = OpenOptions::new();
    out_options.write(true);
    if force {
        out_options.create(true).truncate(true);
    } else {
        out_options.create_new(true);
    }
    let out_file = out_options
        .open(out_path)
        .with_context(|| format!("open epub output: {}", out_path.display()))?;

    let mut zip = zip::ZipWriter::new(out_file);

    // `mimetype` must be the first entry, stored uncompressed.
    let mimetype_options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    zip.start_file("mimetype", mimetype_options)
        .context("epub start_file mimetype")?;
    zip.write_all(b"application/epub+zip")
        .context("epub write mimetype")?;

    let deflated_options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let fixed_entries = [
        ("META-INF/container.xml", container_xml.as_str()),
        ("OEBPS/content.opf", content_opf.as_str()),
        ("OEBPS/nav.xhtml", nav_xhtml.as_str()),
        ("OEBPS/toc.ncx", toc_ncx.as_str()),
    ];
    for (name, body) in fixed_entries {
        zip.start_file(name, deflated_options)
            .with_context(|| format!("epub start_file {name}"))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("epub write {name}"))?;
    }

    let css_entry = format!("OEBPS/{STYLESHEET_HREF}");
    zip.start_file(css_entry.as_str(), deflated_options)
        .context("epub start_file stylesheet")?;
    zip.write_all(stylesheet.as_bytes())
        .context("epub write stylesheet")?;

    for chapter in &chapters {
        let file_name = chapter_file_name(chapter.index);
        let xhtml = wrap_xhtml_document(&chapter.title, lang, &chapter.content);
        zip.start_file(format!("OEBPS/{file_name}"), deflated_options)
            .with_context(|| format!("epub start_file chapter: {file_name}"))?;
        zip.write_all(xhtml.as_bytes())
            .with_context(|| format!("epub write chapter: {file_name}"))?;
    }

    for resource in &resources {
        let source = workspace.asset_path(&resource.path)?;
        let mut f = fs::File::open(&source)
            .with_context(|| format!("open asset: {}", source.display()))?;
        zip.start_file(format!("OEBPS/{}", resource.path), deflated_options)
            .with_context(|| format!("epub start_file asset: {}", resource.path))?;
        std::io::copy(&mut f, &mut zip)
            .with_context(|| format!("epub write asset: {}", resource.path))?;
    }

    zip.finish().context("epub finish zip")?;
    tracing::debug!(
        chapters = chapters.len(),
        toc_entries = toc.len(),
        resources = resources.len(),
        "packaged epub"
    );
    Ok(())
}

/// Chapter boundaries only; every chapter when the run found none, so the
/// navigation document is never empty.
fn toc_chapters(chapters: &[ChapterSnapshot]) -> Vec<&ChapterSnapshot> {
    let boundaries = chapters
        .iter()
        .filter(|c| c.chapter_boundary)
        .collect::<Vec<_>>();
    if boundaries.is_empty() {
        return chapters.iter().collect();
    }
    boundaries
}

fn render_container_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    .to_string()
}

fn render_nav_xhtml(title: &str, lang: &str, toc: &[&ChapterSnapshot]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" lang=\"{}\" xml:lang=\"{}\">\n",
        xml_escape(lang),
        xml_escape(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(title)));
    out.push_str(&format!(
        "  <link rel=\"stylesheet\" type=\"text/css\" href=\"{STYLESHEET_HREF}\" />\n"
    ));
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n");
    out.push_str(&format!("    <h1>{}</h1>\n", xml_escape(title)));
    out.push_str("    <ol>\n");
    for ch in toc {
        out.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            chapter_file_name(ch.index),
            xml_escape(&ch.title)
        ));
    }
    out.push_str("    </ol>\n");
    out.push_str("  </nav>\n");
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn render_toc_ncx(title: &str, uuid: uuid::Uuid, toc: &[&ChapterSnapshot]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n");
    out.push_str("  <head>\n");
    out.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"urn:uuid:{uuid}\" />\n"
    ));
    out.push_str("    <meta name=\"dtb:depth\" content=\"1\" />\n");
    out.push_str("  </head>\n");
    out.push_str(&format!(
        "  <docTitle><text>{}</text></docTitle>\n",
        xml_escape(title)
    ));
    out.push_str("  <navMap>\n");
    for (idx, ch) in toc.iter().enumerate() {
        let play = idx + 1;
        out.push_str(&format!(
            "    <navPoint id=\"navPoint-{play}\" playOrder=\"{play}\">\n"
        ));
        out.push_str(&format!(
            "      <navLabel><text>{}</text></navLabel>\n",
            xml_escape(&ch.title)
        ));
        out.push_str(&format!(
            "      <content src=\"{}\" />\n",
            chapter_file_name(ch.index)
        ));
        out.push_str("    </navPoint>\n");
    }
    out.push_str("  </navMap>\n");
    out.push_str("</ncx>\n");
    out
}

fn render_content_opf(
    metadata: &BookMetadata,
    lang: &str,
    uuid: uuid::Uuid,
    modified: &str,
    chapters: &[ChapterSnapshot],
    resources: &[ResourceSnapshot],
) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&format!(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"bookid\" version=\"3.0\" xml:lang=\"{}\">\n",
        xml_escape(lang)
    ));
    out.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
    out.push_str(&format!(
        "    <dc:identifier id=\"bookid\">urn:uuid:{uuid}</dc:identifier>\n"
    ));
    out.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        xml_escape(&metadata.title)
    ));
    out.push_str(&format!(
        "    <dc:creator>{}</dc:creator>\n",
        xml_escape(&metadata.author)
    ));
    out.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        xml_escape(lang)
    ));
    out.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        xml_escape(modified)
    ));
    out.push_str("  </metadata>\n");
    out.push_str("  <manifest>\n");
    out.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\" />\n",
    );
    out.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\" />\n",
    );
    out.push_str(&format!(
        "    <item id=\"css\" href=\"{STYLESHEET_HREF}\" media-type=\"text/css\" />\n"
    ));

    for ch in chapters {
        out.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\" />\n",
            chapter_id(ch.index),
            chapter_file_name(ch.index)
        ));
    }

    for (idx, resource) in resources.iter().enumerate() {
        out.push_str(&format!(
            "    <item id=\"res-{}\" href=\"{}\" media-type=\"{}\" />\n",
            idx + 1,
            xml_escape(&resource.path),
            xml_escape(&resource.media_type)
        ));
    }

    out.push_str("  </manifest>\n");
    out.push_str("  <spine toc=\"ncx\">\n");
    for ch in chapters {
        out.push_str(&format!(
            "    <itemref idref=\"{}\" />\n",
            chapter_id(ch.index)
        ));
    }
    out.push_str("  </spine>\n");
    out.push_str("</package>\n");
    out
}

fn chapter_id(index: usize) -> String {
    format!("chap_{index:03}")
}

fn wrap_xhtml_document(title: &str, lang: &str, body_xhtml: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"{}\" xml:lang=\"{}\">\n",
        xml_escape(lang),
        xml_escape(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(title)));
    out.push_str(&format!(
        "  <link rel=\"stylesheet\" type=\"text/css\" href=\"{STYLESHEET_HREF}\" />\n"
    ));
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(body_xhtml);
    if !body_xhtml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
