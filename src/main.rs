use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser};
use glyphmatch::{decode_book, CancelToken, GlyphmatchConfig, MatchMode};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    about = "Map obfuscated glyph ids of a book to characters of its reference font",
    group(ArgGroup::new("mode").args(["standard", "fast", "full", "progressive"]))
)]
struct Args {
    /// Book directory, or the name of one under the configured downloads dir.
    #[arg(value_name = "BOOK")]
    book: PathBuf,

    /// YAML configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Single tier, full ranking.
    #[arg(long)]
    standard: bool,

    /// Single tier, stop at the first good-enough candidate.
    #[arg(long)]
    fast: bool,

    /// Match against every character the font maps.
    #[arg(long)]
    full: bool,

    /// Escalate ambiguous glyphs through the tier ladder (default).
    #[arg(long)]
    progressive: bool,

    /// Directory holding the reference font files.
    #[arg(long, value_name = "DIR")]
    fonts: Option<PathBuf>,

    /// Mapping file to write.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Worker pool size.
    #[arg(long)]
    workers: Option<usize>,

    /// Comma-separated tier sides, e.g. `128,256,512`.
    #[arg(long, value_delimiter = ',')]
    tiers: Option<Vec<u32>>,

    /// Cache built catalog tiers here.
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Skip PNG dumps of unresolved glyphs.
    #[arg(long)]
    no_images: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn mode(&self) -> Option<MatchMode> {
        if self.standard {
            Some(MatchMode::Standard)
        } else if self.fast {
            Some(MatchMode::Fast)
        } else if self.full {
            Some(MatchMode::Full)
        } else if self.progressive {
            Some(MatchMode::Progressive)
        } else {
            None
        }
    }

    fn apply(&self, cfg: &mut GlyphmatchConfig) {
        if let Some(mode) = self.mode() {
            cfg.set_mode(mode);
        }
        if let Some(fonts) = &self.fonts {
            cfg.catalog.fonts_dir = fonts.clone();
        }
        if let Some(output) = &self.output {
            cfg.output.mapping_file = output.clone();
        }
        if let Some(workers) = self.workers {
            cfg.dispatch.workers = Some(workers);
        }
        if let Some(tiers) = &self.tiers {
            cfg.catalog.tiers = tiers.clone();
        }
        if let Some(cache_dir) = &self.cache_dir {
            cfg.catalog.cache_dir = Some(cache_dir.clone());
        }
        if self.no_images {
            cfg.output.save_images = false;
        }
        if self.json_logs {
            cfg.logging.json = true;
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => GlyphmatchConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GlyphmatchConfig::default(),
    };
    args.apply(&mut cfg);
    cfg.validate().context("invalid configuration")?;
    init_tracing(&cfg.logging.level, cfg.logging.json);

    let book_dir = if args.book.is_dir() {
        args.book.clone()
    } else {
        cfg.input.downloads_dir.join(&args.book)
    };
    if !book_dir.is_dir() {
        bail!("book directory {} does not exist", book_dir.display());
    }

    let report = decode_book(&cfg, &book_dir, &CancelToken::new())
        .with_context(|| format!("decoding {}", book_dir.display()))?;

    println!(
        "{}: {} glyphs, {} accepted, {} unresolved in {:.1}s",
        report.family,
        report.mapping.len(),
        report.summary.accepted,
        report.summary.unresolved,
        report.elapsed.as_secs_f64()
    );
    if let Some(path) = &report.mapping_path {
        println!("mapping written to {}", path.display());
    }
    Ok(())
}
