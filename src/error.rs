use thiserror::Error;

use crate::crawl::Termination;

/// Failure to retrieve a page or an asset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    /// The origin says the resource does not exist (404/410).
    #[error("{url} does not exist")]
    Missing { url: String },
}

/// Recoverable, page-local failure. The page is skipped and the crawl continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("no meaningful content")]
    EmptyContent,
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("crawl produced no chapters (stopped because {0})")]
    NoChapters(Termination),
}
