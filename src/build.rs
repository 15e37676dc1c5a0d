use anyhow::Context as _;

use crate::cli::{BuildArgs, CrawlArgs, PackageArgs};

pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
    tracing::info!(url = %args.url, out = %args.out, "build: crawl");
    crate::crawl::run(CrawlArgs {
        url: args.url.clone(),
        out: args.out.clone(),
        tuning: args.tuning.clone(),
    })
    .await
    .context("crawl")?;

    tracing::info!("build: package");
    let epub_path = crate::epub::run(PackageArgs {
        workspace: args.out.clone(),
        title: args.title,
        author: args.author,
        lang: args.lang,
        out: args.epub,
        force: args.force,
    })
    .context("package")?;

    tracing::info!(epub = %epub_path.display(), "build: done");
    Ok(())
}
