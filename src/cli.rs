use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{CompletionPolicy, Config};
use crate::reader::navigation::EntryDirective;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Tutorial markdown file (overrides CTUTOR_CONTENT_PATH).
    #[arg(long, global = true)]
    pub content: Option<PathBuf>,

    /// Directory holding reading progress (overrides CTUTOR_DATA_DIR).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// How chapters get completed (overrides CTUTOR_COMPLETION_POLICY).
    #[arg(long, global = true, value_enum)]
    pub completion_policy: Option<CompletionPolicy>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Environment configuration with command-line overrides applied.
    pub fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::from_env()?;
        if let Some(content) = &self.content {
            config.content_path = content.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(policy) = self.completion_policy {
            config.completion_policy = policy;
        }
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List chapters with reading status.
    Chapters,
    /// Print the level-2 headings of a chapter as `slug<TAB>title`.
    Toc(ChapterArgs),
    /// Print how a chapter splits into sections.
    Sections(ChapterArgs),
    /// Render one section to HTML.
    Render(RenderArgs),
    /// Open a chapter the way the reader would.
    Read(ReadArgs),
    Progress {
        #[command(subcommand)]
        command: ProgressCommand,
    },
}

#[derive(Debug, Args)]
pub struct ChapterArgs {
    /// Chapter id: the zero-based chapter position in the document.
    #[arg(long)]
    pub chapter: String,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    #[arg(long)]
    pub chapter: String,

    /// Section number, starting at 1.
    #[arg(long, default_value_t = 1)]
    pub section: usize,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    #[arg(long, required_unless_present = "link", conflicts_with = "link")]
    pub chapter: Option<String>,

    /// Enter at the first or last section.
    #[arg(long, value_enum, conflicts_with = "link")]
    pub position: Option<EntryDirective>,

    /// Heading to jump to, with or without the leading `#`.
    #[arg(long, conflicts_with = "link")]
    pub hash: Option<String>,

    /// Chapter link such as `/chapters/3/?position=end#3-2-...`.
    #[arg(long)]
    pub link: Option<String>,

    /// Keep reading commands from stdin.
    #[arg(long)]
    pub interactive: bool,

    /// Print sections as HTML instead of markdown.
    #[arg(long)]
    pub html: bool,
}

#[derive(Debug, Subcommand)]
pub enum ProgressCommand {
    /// Print the stored progress record as JSON.
    Show,
    /// Forget all reading progress.
    Reset,
}
