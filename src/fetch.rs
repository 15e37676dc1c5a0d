use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use url::Url;

use crate::dom::Document;
use crate::error::FetchError;

const PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const ASSET_TIMEOUT: Duration = Duration::from_secs(10);
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) parabook/0.1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBytes {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Network access needed by the crawl: HTML pages and binary assets.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_page(&self, url: &Url) -> Result<Document, FetchError>;

    async fn fetch_bytes(&self, url: &Url) -> Result<FetchedBytes, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build page http client")?;
        Ok(Self { client })
    }

    async fn get(
        &self,
        url: &Url,
        accept: &str,
        timeout: Duration,
    ) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, accept)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| transport(url, &err))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(FetchError::Missing {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_page(&self, url: &Url) -> Result<Document, FetchError> {
        let response = self
            .get(
                url,
                "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
                PAGE_TIMEOUT,
            )
            .await?;
        let body = response.text().await.map_err(|err| transport(url, &err))?;
        Ok(Document::parse(&body))
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<FetchedBytes, FetchError> {
        let response = self.get(url, "*/*", ASSET_TIMEOUT).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response
            .bytes()
            .await
            .map_err(|err| transport(url, &err))?;
        Ok(FetchedBytes {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

fn transport(url: &Url, err: &reqwest::Error) -> FetchError {
    FetchError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}
