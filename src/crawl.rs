use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

use crate::bilingual::restructure;
use crate::chapter::{ChapterRecord, nav_entries};
use crate::classify::classify;
use crate::cli::CrawlArgs;
use crate::dom::Document;
use crate::error::{CrawlError, FetchError};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::links::{LinkRewriter, rewrite_images};
use crate::next_page::find_next;
use crate::profile::SiteProfile;
use crate::resources::{ResourceRef, ResourceStore};
use crate::slice::slice_content;
use crate::stylesheet::{BASE_CSS, collect_stylesheet};
use crate::workspace::Workspace;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Ceiling on fetched pages; `None` follows the chain to its end.
    pub max_pages: Option<usize>,
    pub delay: Duration,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_pages: None,
            delay: DEFAULT_DELAY,
        }
    }
}

/// Why the crawl stopped. None of these is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    NoNextUrl,
    SelfLink(Url),
    Revisit(Url),
    PageLimit(usize),
    FetchFailed { url: Url, error: FetchError },
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::NoNextUrl => write!(f, "no next page was found"),
            Termination::SelfLink(url) => write!(f, "the next link of {url} points to itself"),
            Termination::Revisit(url) => write!(f, "{url} was already visited"),
            Termination::PageLimit(limit) => write!(f, "the limit of {limit} pages was reached"),
            Termination::FetchFailed { error, .. } => write!(f, "{error}"),
        }
    }
}

#[derive(Debug)]
pub struct CrawlOutcome {
    pub chapters: Vec<ChapterRecord>,
    pub resources: Vec<ResourceRef>,
    pub stylesheet: String,
    pub termination: Termination,
}

#[derive(Debug)]
struct CrawlState {
    current: Url,
    visited: HashSet<Url>,
    /// Pages fetched so far, including the current one.
    ordinal: usize,
    records: Vec<ChapterRecord>,
    store: ResourceStore,
    stylesheet: Option<String>,
}

impl CrawlState {
    fn new(start: Url, store: ResourceStore) -> Self {
        let mut visited = HashSet::new();
        visited.insert(start.clone());
        Self {
            current: start,
            visited,
            ordinal: 0,
            records: Vec::new(),
            store,
            stylesheet: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Fetch(Url),
    Stop(Termination),
}

pub async fn crawl(
    fetcher: &dyn Fetcher,
    start: Url,
    profile: &SiteProfile,
    options: &CrawlOptions,
    store: ResourceStore,
) -> Result<CrawlOutcome, CrawlError> {
    let mut state = CrawlState::new(start, store);

    let termination = loop {
        state.ordinal += 1;
        let url = state.current.clone();
        tracing::info!(page = state.ordinal, %url, "fetching page");

        let page = match fetcher.fetch_page(&url).await {
            Ok(page) => page,
            Err(error) => {
                tracing::warn!(%url, %error, "page fetch failed; stopping");
                break Termination::FetchFailed { url, error };
            }
        };

        let next = process_page(fetcher, &page, &url, &mut state, profile).await;
        match advance(&mut state, next, options) {
            Step::Fetch(next) => {
                if !options.delay.is_zero() {
                    tokio::time::sleep(options.delay).await;
                }
                state.current = next;
            }
            Step::Stop(termination) => break termination,
        }
    };

    tracing::info!(
        chapters = state.records.len(),
        resources = state.store.refs().len(),
        reason = %termination,
        "crawl finished"
    );
    if state.records.is_empty() {
        return Err(CrawlError::NoChapters(termination));
    }

    let rewriter = LinkRewriter::new(&state.records);
    for record in &mut state.records {
        rewriter.rewrite(record);
    }

    Ok(CrawlOutcome {
        chapters: state.records,
        resources: state.store.into_refs(),
        stylesheet: state.stylesheet.unwrap_or_else(|| BASE_CSS.to_owned()),
        termination,
    })
}

async fn process_page(
    fetcher: &dyn Fetcher,
    page: &Document,
    url: &Url,
    state: &mut CrawlState,
    profile: &SiteProfile,
) -> Option<Url> {
    let next = find_next(page, url, profile);
    tracing::debug!(next = ?next.as_ref().map(Url::as_str), "next page");

    if state.stylesheet.is_none() {
        let css = collect_stylesheet(page, url, fetcher, &mut state.store).await;
        state.stylesheet = Some(css);
    }

    let mut fragment = match slice_content(page, profile) {
        Ok(fragment) => fragment,
        Err(err) => {
            tracing::warn!(%url, error = %err, "skipping page");
            return next;
        }
    };
    restructure(&mut fragment, profile);
    rewrite_images(&mut fragment, url, fetcher, &mut state.store).await;

    let classification = classify(&fragment, url, state.ordinal, profile);
    let index = state.records.len() + 1;
    tracing::info!(
        index,
        title = %classification.title,
        boundary = classification.is_chapter_boundary,
        "recorded chapter"
    );
    state.records.push(ChapterRecord {
        index,
        title: classification.title,
        content: fragment,
        url: url.clone(),
        is_chapter_boundary: classification.is_chapter_boundary,
    });

    next
}

fn advance(state: &mut CrawlState, next: Option<Url>, options: &CrawlOptions) -> Step {
    let Some(next) = next else {
        return Step::Stop(Termination::NoNextUrl);
    };
    if next == state.current {
        return Step::Stop(Termination::SelfLink(next));
    }
    if state.visited.contains(&next) {
        return Step::Stop(Termination::Revisit(next));
    }
    if let Some(limit) = options.max_pages
        && state.ordinal >= limit
    {
        return Step::Stop(Termination::PageLimit(limit));
    }
    state.visited.insert(next.clone());
    Step::Fetch(next)
}

pub fn parse_start_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw).context("parse --url")?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("--url must be http/https: {url}");
    }
    Ok(url)
}

pub async fn run(args: CrawlArgs) -> anyhow::Result<()> {
    let start = parse_start_url(&args.url)?;
    let profile = SiteProfile::load_or_default(args.tuning.profile.as_deref())?;
    let options = args.tuning.crawl_options();

    let workspace = Workspace::create(Path::new(&args.out)).context("create workspace")?;
    let fetcher = HttpFetcher::new()?;
    let store = ResourceStore::new(workspace.assets_dir());

    let outcome = crawl(&fetcher, start, &profile, &options, store).await?;
    workspace
        .write_snapshot(&outcome.chapters, &outcome.resources, &outcome.stylesheet)
        .context("write workspace snapshot")?;

    tracing::info!(
        workspace = %workspace.root().display(),
        chapters = outcome.chapters.len(),
        toc_entries = nav_entries(&outcome.chapters).count(),
        "crawl written"
    );
    Ok(())
}
