use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = parabook::cli::Cli::parse();
    parabook::logging::init(cli.debug()).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        parabook::cli::Command::Crawl(args) => {
            parabook::crawl::run(args).await.context("crawl")?;
        }
        parabook::cli::Command::Package(args) => {
            parabook::epub::run(args).context("package")?;
        }
        parabook::cli::Command::Build(args) => {
            parabook::build::run(args).await.context("build")?;
        }
    }

    Ok(())
}
