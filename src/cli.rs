use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::crawl::CrawlOptions;

/// Page ceiling applied by `--debug` when `--max-pages` is not given.
pub const DEBUG_MAX_PAGES: usize = 3;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn debug(&self) -> bool {
        match &self.command {
            Command::Crawl(args) => args.tuning.debug,
            Command::Build(args) => args.tuning.debug,
            Command::Package(_) => false,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl a paginated bilingual book into a workspace directory.
    Crawl(CrawlArgs),
    /// Package a crawled workspace as an EPUB file.
    Package(PackageArgs),
    /// Crawl, then package.
    Build(BuildArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CrawlTuning {
    /// Maximum pages to retrieve (default: follow the chain to its end).
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Delay between page requests (politeness).
    #[arg(long, default_value_t = 3000)]
    pub delay_ms: u64,

    /// YAML file overriding the site's markup class names.
    #[arg(long)]
    pub profile: Option<String>,

    /// Verbose logging; also stops after a few pages unless `--max-pages` is set.
    #[arg(long)]
    pub debug: bool,
}

impl CrawlTuning {
    pub fn crawl_options(&self) -> CrawlOptions {
        let max_pages = self
            .max_pages
            .or_else(|| self.debug.then_some(DEBUG_MAX_PAGES));
        CrawlOptions {
            max_pages,
            delay: Duration::from_millis(self.delay_ms),
        }
    }
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Start URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Output workspace directory (must not exist).
    #[arg(long)]
    pub out: String,

    #[command(flatten)]
    pub tuning: CrawlTuning,
}

#[derive(Debug, Args)]
pub struct PackageArgs {
    /// Workspace directory (created by `crawl`).
    #[arg(long)]
    pub workspace: String,

    /// Book title.
    #[arg(long)]
    pub title: String,

    /// Book author.
    #[arg(long)]
    pub author: String,

    /// BCP-47 language tag for the package metadata.
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// Output EPUB path (default: derived from the title, inside the workspace).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite an existing EPUB.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Start URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Book title.
    #[arg(long)]
    pub title: String,

    /// Book author.
    #[arg(long)]
    pub author: String,

    /// Output workspace directory (must not exist).
    #[arg(long)]
    pub out: String,

    /// Output EPUB path (default: derived from the title, inside the workspace).
    #[arg(long)]
    pub epub: Option<String>,

    /// BCP-47 language tag for the package metadata.
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// Overwrite an existing EPUB.
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub tuning: CrawlTuning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_caps_pages_unless_explicit() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "parabook", "crawl", "--url", "https://example.com/", "--out", "ws", "--debug",
        ])?;
        assert!(cli.debug());
        let Command::Crawl(args) = &cli.command else {
            anyhow::bail!("expected crawl command");
        };
        assert_eq!(args.tuning.crawl_options().max_pages, Some(DEBUG_MAX_PAGES));
        assert_eq!(args.tuning.crawl_options().delay, Duration::from_secs(3));

        let cli = Cli::try_parse_from([
            "parabook",
            "crawl",
            "--url",
            "https://example.com/",
            "--out",
            "ws",
            "--debug",
            "--max-pages",
            "10",
            "--delay-ms",
            "0",
        ])?;
        let Command::Crawl(args) = &cli.command else {
            anyhow::bail!("expected crawl command");
        };
        assert_eq!(args.tuning.crawl_options().max_pages, Some(10));
        assert!(args.tuning.crawl_options().delay.is_zero());
        Ok(())
    }

    #[test]
    fn package_defaults() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "parabook", "package", "--workspace", "ws", "--title", "T", "--author", "A",
        ])?;
        assert!(!cli.debug());
        let Command::Package(args) = cli.command else {
            anyhow::bail!("expected package command");
        };
        assert_eq!(args.lang, "en");
        assert_eq!(args.out, None);
        assert!(!args.force);
        Ok(())
    }
}
