use std::fs;
use std::io::Read as _;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use parabook::formats::ChapterSnapshot;
use predicates::prelude::*;

static RABBIT_PNG: &[u8] = &[
    137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13, 73, 72, 68, 82, 0, 0, 0, 1, 0, 0, 0, 1, 8, 4, 0,
    0, 0, 181, 28, 12, 2, 0, 0, 0, 11, 73, 68, 65, 84, 120, 218, 99, 252, 255, 23, 0, 2, 3, 1, 128,
    110, 220, 25, 0, 0, 0, 0, 73, 69, 78, 68, 174, 66, 96, 130,
];

const SITE_CSS: &str = ".hero { background: url(../static/rabbit.png) no-repeat; }";

fn chapter_page(n: u32, next: Option<&str>) -> String {
    let nav = next
        .map(|href| {
            format!(r#"<div class="row"><div class="text-center"><a href="{href}">»</a></div></div>"#)
        })
        .unwrap_or_default();
    let extra_left = if n == 1 {
        r#" <a href="/book/alice/chapter-2/">La suite</a> <img src="/static/rabbit.png" alt="lapin">"#
    } else {
        ""
    };
    format!(
        r#"<!doctype html>
<html>
  <head>
    <title>Alice {n}</title>
    <link rel="stylesheet" href="/static/site.css">
  </head>
  <body>
    <nav class="navbar">Bilingual books</nav>
    <div class="row"><ol class="breadcrumb"><li>Home</li><li>Alice</li></ol></div>
    <div class="row">
      <div class="col-xs-6" lang="fr">Chapitre {n}, phrase un.{extra_left}</div>
      <div class="col-xs-6" lang="en">Chapter {n}, sentence one.</div>
    </div>
    <div class="row">
      <div class="col-xs-6" lang="fr">Phrase deux.</div>
      <div class="col-xs-6" lang="en">Sentence two.</div>
    </div>
    {nav}
    <div class="text-center">Share</div>
    <div class="text-center">Footer</div>
  </body>
</html>
"#
    )
}

fn route(path: &str) -> Option<(&'static str, Vec<u8>)> {
    let html = "text/html; charset=utf-8";
    match path {
        "/book/alice/chapter-1/" => Some((html, chapter_page(1, Some("../chapter-2/")).into_bytes())),
        "/book/alice/chapter-2/" => Some((html, chapter_page(2, Some("/book/alice/chapter-3/")).into_bytes())),
        "/book/alice/chapter-3/" => Some((html, chapter_page(3, None).into_bytes())),
        "/static/site.css" => Some(("text/css", SITE_CSS.as_bytes().to_vec())),
        "/static/rabbit.png" => Some(("image/png", RABBIT_PNG.to_vec())),
        _ => None,
    }
}

fn spawn_book_server() -> (String, mpsc::Sender<()>, thread::JoinHandle<()>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let base_url = format!("http://{}", server.server_addr());

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };

            let url = request.url().to_string();
            let path = url.split('?').next().unwrap_or(&url);
            let response = match route(path) {
                Some((content_type, body)) => {
                    let header =
                        tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes())
                            .expect("build header");
                    tiny_http::Response::from_data(body).with_header(header)
                }
                None => tiny_http::Response::from_data(b"not found".to_vec()).with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });

    (base_url, shutdown_tx, handle)
}

fn read_entry(archive: &mut zip::ZipArchive<fs::File>, name: &str) -> anyhow::Result<String> {
    let mut entry = archive.by_name(name)?;
    let mut body = String::new();
    entry.read_to_string(&mut body)?;
    Ok(body)
}

fn read_chapters(workspace: &Path) -> anyhow::Result<Vec<ChapterSnapshot>> {
    fs::read_to_string(workspace.join("chapters.jsonl"))?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(anyhow::Error::from))
        .collect()
}

#[test]
fn build_turns_bilingual_chapters_into_epub() -> anyhow::Result<()> {
    let (base_url, shutdown_tx, server_handle) = spawn_book_server();
    let temp = tempfile::TempDir::new()?;
    let workspace = temp.path().join("alice");
    let start_url = format!("{base_url}/book/alice/chapter-1/");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("parabook");
    cmd.args([
        "build",
        "--url",
        &start_url,
        "--title",
        "Alice: Bilingual!",
        "--author",
        "Lewis Carroll",
        "--out",
        workspace.to_str().expect("utf-8 temp path"),
        "--delay-ms",
        "0",
    ])
    .assert()
    .success();

    let _ = shutdown_tx.send(());
    let _ = server_handle.join();

    let chapters = read_chapters(&workspace)?;
    let titles = chapters.iter().map(|c| c.title.as_str()).collect::<Vec<_>>();
    assert_eq!(titles, vec!["Chapter 1", "Chapter 2", "Chapter 3"]);
    assert!(chapters.iter().all(|c| c.chapter_boundary));
    assert!(workspace.join("assets/images/rabbit.png").is_file());

    let epub_path = workspace.join("Alice_Bilingual.epub");
    let mut archive = zip::ZipArchive::new(fs::File::open(&epub_path)?)?;
    assert_eq!(archive.by_index(0)?.name(), "mimetype");

    let first = read_entry(&mut archive, "OEBPS/chap_001.xhtml")?;
    assert!(first.contains(r#"<table class="epub-bilingual-table">"#), "{first}");
    assert_eq!(first.matches("<tr>").count(), 2, "{first}");
    assert!(first.contains(r#"<td lang="fr">"#), "{first}");
    assert!(first.contains(r#"href="chap_002.xhtml""#), "{first}");
    assert!(first.contains(r#"src="images/rabbit.png""#), "{first}");
    assert!(!first.contains("Home"), "{first}");
    assert!(!first.contains("Share"), "{first}");
    assert!(!first.contains("»"), "{first}");

    let css = read_entry(&mut archive, "OEBPS/style/default.css")?;
    assert!(css.contains("url('../images/rabbit.png')"), "{css}");
    let mut png = Vec::new();
    archive.by_name("OEBPS/images/rabbit.png")?.read_to_end(&mut png)?;
    assert_eq!(png, RABBIT_PNG);

    let nav = read_entry(&mut archive, "OEBPS/nav.xhtml")?;
    assert_eq!(nav.matches("<li>").count(), 3, "{nav}");
    let opf = read_entry(&mut archive, "OEBPS/content.opf")?;
    assert!(opf.contains("<dc:creator>Lewis Carroll</dc:creator>"), "{opf}");
    Ok(())
}

#[test]
fn crawl_without_any_chapter_fails() -> anyhow::Result<()> {
    let (base_url, shutdown_tx, server_handle) = spawn_book_server();
    let temp = tempfile::TempDir::new()?;
    let workspace = temp.path().join("ws");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("parabook");
    cmd.args([
        "crawl",
        "--url",
        &format!("{base_url}/book/missing/"),
        "--out",
        workspace.to_str().expect("utf-8 temp path"),
        "--delay-ms",
        "0",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no chapters"));

    let _ = shutdown_tx.send(());
    let _ = server_handle.join();
    Ok(())
}

#[test]
fn non_http_url_is_rejected() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("parabook");
    cmd.args(["crawl", "--url", "ftp://example.com/book/", "--out", "unused-ws"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be http/https"));
}

#[test]
fn rust_log_debug_emits_parsed_cli_line() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("parabook");
    cmd.env("RUST_LOG", "debug")
        .args([
            "package",
            "--workspace",
            "does-not-exist",
            "--title",
            "T",
            "--author",
            "A",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsed cli"))
        .stderr(predicate::str::contains("workspace directory not found"));
}
