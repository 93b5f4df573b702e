use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;

use crate::content::ChapterCache;
use crate::progress::ProgressStore;

/// How chapters become complete besides reaching their last section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum CompletionPolicy {
    /// Only section position and scroll depth complete a chapter.
    #[default]
    #[value(name = "section")]
    SectionDriven,
    /// Opening a chapter also completes every chapter before it.
    #[value(name = "auto-prior")]
    AutoCompletePrior,
}

impl std::str::FromStr for CompletionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "section" => Ok(Self::SectionDriven),
            "auto-prior" => Ok(Self::AutoCompletePrior),
            other => anyhow::bail!("unknown completion policy: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub content_path: PathBuf,
    pub data_dir: PathBuf,
    pub max_chapter: Option<usize>,
    pub completion_policy: CompletionPolicy,
    pub scroll_sample_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content_path: PathBuf::from("content").join("tutoring.md"),
            data_dir: PathBuf::from(".ctutor"),
            max_chapter: None,
            completion_policy: CompletionPolicy::default(),
            scroll_sample_interval: Duration::from_millis(500),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(path) = env_value("CTUTOR_CONTENT_PATH") {
            config.content_path = PathBuf::from(path);
        }
        if let Some(dir) = env_value("CTUTOR_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(max) = env_value("CTUTOR_MAX_CHAPTER") {
            config.max_chapter = Some(max.parse().context("parse CTUTOR_MAX_CHAPTER")?);
        }
        if let Some(policy) = env_value("CTUTOR_COMPLETION_POLICY") {
            config.completion_policy = policy.parse().context("parse CTUTOR_COMPLETION_POLICY")?;
        }
        if let Some(ms) = env_value("CTUTOR_SCROLL_SAMPLE_MS") {
            let ms: u64 = ms.parse().context("parse CTUTOR_SCROLL_SAMPLE_MS")?;
            config.scroll_sample_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }

    pub fn chapter_cache(&self) -> ChapterCache {
        ChapterCache::new(&self.content_path)
    }

    pub fn progress_store(&self) -> ProgressStore {
        ProgressStore::local(&self.data_dir)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_policy_parses_known_names() -> anyhow::Result<()> {
        assert_eq!(
            "section".parse::<CompletionPolicy>()?,
            CompletionPolicy::SectionDriven
        );
        assert_eq!(
            "auto-prior".parse::<CompletionPolicy>()?,
            CompletionPolicy::AutoCompletePrior
        );
        assert!("sometimes".parse::<CompletionPolicy>().is_err());
        Ok(())
    }
}
