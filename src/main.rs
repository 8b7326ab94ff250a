//! dirmap: disk usage scanner with cache files and cushion treemaps.
//!
//! Thin binary entry point. Scanning lives in `dirmap-core`, layout and
//! rendering in `dirmap-treemap`.

mod config;
mod report;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dirmap_core::events::TreeEvent;
use dirmap_core::exclude::ExcludeRuleConfig;
use dirmap_core::scanner::Scanner;
use dirmap_treemap::{Rect, TreemapView};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info, Level};

#[derive(Parser, Debug)]
#[command(name = "dirmap", version, about)]
struct Cli {
    /// Config file (default: $DIRMAP_CONFIG, ./.dirmap.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a directory and print a summary
    Scan {
        /// Directory path or URL to scan
        path: String,
        #[command(flatten)]
        scan: ScanArgs,
        /// Write the scanned tree to this cache file
        #[arg(long, value_name = "FILE")]
        write_cache: Option<PathBuf>,
        /// Number of largest files to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Load a cache file and print a summary
    Load {
        cache: PathBuf,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Lay out a treemap and render it
    Treemap {
        /// Directory to scan
        #[arg(required_unless_present = "cache", conflicts_with = "cache")]
        path: Option<String>,
        /// Read the tree from a cache file instead of scanning
        #[arg(long, value_name = "FILE")]
        cache: Option<PathBuf>,
        #[command(flatten)]
        scan: ScanArgs,
        #[arg(long, default_value_t = 800)]
        width: i32,
        #[arg(long, default_value_t = 600)]
        height: i32,
        /// Image output (binary PPM)
        #[arg(long, value_name = "FILE.ppm", default_value = "treemap.ppm")]
        out: PathBuf,
        /// Also write the tile rectangles as JSON
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,
        /// Use slice-and-dice instead of squarified rows
        #[arg(long)]
        no_squarify: bool,
        /// Minimum tile size in pixels
        #[arg(long, value_name = "N")]
        min_tile: Option<i32>,
    },
}

#[derive(Args, Debug, Default)]
struct ScanArgs {
    /// Descend into other filesystems
    #[arg(long)]
    cross_fs: bool,
    /// Skip directories whose full path matches this regex (repeatable)
    #[arg(long, value_name = "REGEX")]
    exclude: Vec<String>,
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        Level::WARN
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Build a scanner from the config plus command-line overrides, with
/// progress text routed to the debug log.
fn scanner(config: &config::Config, args: &ScanArgs) -> Result<Scanner> {
    let mut settings = config.scan.clone();
    settings.cross_filesystems |= args.cross_fs;
    settings
        .exclude
        .extend(args.exclude.iter().map(|p| ExcludeRuleConfig::new(p.as_str())));

    let mut scanner = Scanner::new(settings).context("invalid exclude rule")?;
    scanner.tree_mut().subscribe(Box::new(|event| {
        if let TreeEvent::Progress(text) = event {
            debug!("{text}");
        }
    }));
    Ok(scanner)
}

fn scan(scanner: &mut Scanner, path: &str) -> Result<()> {
    scanner
        .start_reading(path)
        .with_context(|| format!("cannot scan {path}"))?;
    scanner.run_to_completion();
    Ok(())
}

fn load(scanner: &mut Scanner, cache: &std::path::Path) -> Result<()> {
    scanner
        .read_cache(cache)
        .with_context(|| format!("cannot load cache file {}", cache.display()))?;
    scanner.run_to_completion();
    Ok(())
}

fn print_report(scanner: &Scanner, top: usize) -> Result<()> {
    let tree = scanner.tree();
    let Some(root) = tree.root() else {
        bail!("nothing was read");
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report::write_summary(&mut out, tree, root)?;
    report::write_top_files(&mut out, tree, root, top)?;
    report::write_file_types(&mut out, tree)?;
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let (config, source) = config::load(cli.config.as_deref())?;
    if let Some(source) = &source {
        info!("Loaded config from {}", source.display());
    }

    match cli.command {
        Command::Scan {
            path,
            scan: args,
            write_cache,
            top,
        } => {
            let mut scanner = scanner(&config, &args)?;
            scan(&mut scanner, &path)?;
            print_report(&scanner, top)?;
            if let Some(cache) = write_cache {
                scanner
                    .write_cache(&cache)
                    .with_context(|| format!("cannot write cache file {}", cache.display()))?;
            }
        }
        Command::Load { cache, top } => {
            let mut scanner = scanner(&config, &ScanArgs::default())?;
            load(&mut scanner, &cache)?;
            print_report(&scanner, top)?;
        }
        Command::Treemap {
            path,
            cache,
            scan: args,
            width,
            height,
            out,
            json,
            no_squarify,
            min_tile,
        } => {
            if width <= 0 || height <= 0 {
                bail!("treemap size must be positive, got {width}x{height}");
            }
            let mut scanner = scanner(&config, &args)?;
            match (&cache, &path) {
                (Some(cache), _) => load(&mut scanner, cache)?,
                (None, Some(path)) => scan(&mut scanner, path)?,
                (None, None) => bail!("need a path or --cache"),
            }

            let mut settings = config.treemap.clone();
            settings.squarify &= !no_squarify;
            if let Some(min) = min_tile {
                settings.min_tile_size = min;
            }

            let mut view = TreemapView::new(settings, Rect::new(0, 0, width, height));
            view.rebuild_if_stale(scanner.tree());
            let Some(map) = view.treemap() else {
                bail!("nothing to draw");
            };
            map.render()
                .write_ppm(&out)
                .with_context(|| format!("cannot write {}", out.display()))?;
            if let Some(json) = json {
                report::write_tiles_json(&json, scanner.tree(), map)?;
                info!("Wrote {} tiles to {}", map.tiles().len(), json.display());
            }
        }
    }
    Ok(())
}
