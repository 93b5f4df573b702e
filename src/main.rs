use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use easyctutor::cli::{Cli, Command, ProgressCommand};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    easyctutor::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");
    let config = cli.config().context("load config")?;
    tracing::debug!(?config, "resolved config");

    match cli.command {
        Command::Chapters => {
            easyctutor::commands::chapters(&config).context("chapters")?;
        }
        Command::Toc(args) => {
            easyctutor::commands::toc(&config, args).context("toc")?;
        }
        Command::Sections(args) => {
            easyctutor::commands::sections(&config, args).context("sections")?;
        }
        Command::Render(args) => {
            easyctutor::commands::render(&config, args).context("render")?;
        }
        Command::Read(args) => {
            easyctutor::read::run(&config, args).await.context("read")?;
        }
        Command::Progress {
            command: ProgressCommand::Show,
        } => {
            easyctutor::commands::progress_show(&config).context("progress show")?;
        }
        Command::Progress {
            command: ProgressCommand::Reset,
        } => {
            easyctutor::commands::progress_reset(&config).context("progress reset")?;
        }
    }

    Ok(())
}
