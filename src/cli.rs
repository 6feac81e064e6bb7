//! Command-line arguments and their mapping onto [`Config`].

use std::path::PathBuf;

use clap::Parser;
use photo_grab::{Config, FileCollisionAction, FullQueuePolicy, Result, Variant};

#[derive(Parser, Debug)]
#[command(name = "photo-grab")]
#[command(about = "Search for photos and download every match concurrently")]
#[command(version)]
pub struct Cli {
    /// Search terms, joined with spaces into one query
    pub terms: Vec<String>,

    /// Output directory for saved images (default: system temp dir)
    #[arg(short, long, env = "PHOTO_GRAB_OUTDIR")]
    pub outdir: Option<PathBuf>,

    /// Size of the picture to grab (o, sq, q, t, s, m or the long names)
    #[arg(short, long, value_enum)]
    pub size: Option<Variant>,

    /// Maximum number of result pages to walk (default: 3)
    #[arg(short = 'p', long, alias = "max_pages")]
    pub max_pages: Option<u32>,

    /// Number of parallel fetches (default: 4)
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Search URL template with {query} and {page} placeholders
    #[arg(long)]
    pub search_url: Option<String>,

    /// What the crawler does when the queue is full
    #[arg(long, value_enum)]
    pub when_full: Option<FullQueuePolicy>,

    /// What to do when the destination file already exists
    #[arg(long, value_enum)]
    pub on_collision: Option<FileCollisionAction>,

    /// TOML or JSON configuration file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Build the run configuration: file values first, then flags
    pub fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if !self.terms.is_empty() {
            config.search.terms = self.terms;
        }
        if let Some(outdir) = self.outdir {
            config.download.output_dir = outdir;
        }
        if let Some(size) = self.size {
            config.search.variant = size;
        }
        if let Some(max_pages) = self.max_pages {
            config.search.max_pages = max_pages;
        }
        if let Some(concurrency) = self.concurrency {
            config.download.concurrency = concurrency;
        }
        if let Some(search_url) = self.search_url {
            config.search.url_template = search_url;
        }
        if let Some(policy) = self.when_full {
            config.download.full_queue = policy;
        }
        if let Some(action) = self.on_collision {
            config.download.file_collision = action;
        }

        config.validate()?;
        Ok(config)
    }
}
