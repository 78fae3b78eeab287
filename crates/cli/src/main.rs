use annotator_core::config;
use annotator_core::config::AppConfig;
use annotator_core::local::LocalScanSource;
use annotator_core::remote::RemoteScanSource;
use annotator_core::source::{with_scan_source, ScanSource, Source};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use cli::session;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::List { json } => run_list(&cfg, json),
        Commands::Status { json } => run_status(&cfg, json),
        Commands::Pull { label, out } => run_pull(&cfg, &label, &out),
        Commands::Push { label, file } => run_push(&cfg, &label, &file),
        Commands::Fetch { label, dest } => run_fetch(&cfg, &label, &dest),
    }
}

#[derive(Parser)]
#[command(name = "vertebra-annotator")]
#[command(about = "Iterate a cohort of CT scans and manage vertebra annotations", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the scan catalog without touching any scan
    List {
        /// Output JSON instead of one line per scan
        #[arg(long)]
        json: bool,
    },
    /// Walk the catalog and report each scan's annotation state
    Status {
        /// Output JSON instead of one line per scan
        #[arg(long)]
        json: bool,
    },
    /// Download one scan's image files into a directory
    Pull {
        /// Session label of the scan
        #[arg(long)]
        label: String,
        /// Directory receiving the image files
        #[arg(long)]
        out: PathBuf,
    },
    /// Upload an annotation artifact for one scan
    Push {
        /// Session label of the scan
        #[arg(long)]
        label: String,
        /// Annotation artifact (JSON) to store
        file: PathBuf,
    },
    /// Download one scan's stored annotation artifact
    Fetch {
        /// Session label of the scan
        #[arg(long)]
        label: String,
        /// Destination file for the artifact
        #[arg(long)]
        dest: PathBuf,
    },
}

fn build_source(cfg: &AppConfig) -> Result<Source> {
    if let Some(archive_cfg) = &cfg.archive {
        return Ok(Source::Remote(RemoteScanSource::connect(archive_cfg)?));
    }
    if let Some(local_cfg) = &cfg.local {
        if let Some(dir) = &local_cfg.directory {
            return Ok(Source::Local(LocalScanSource::from_directory(Path::new(
                dir,
            ))?));
        }
        if let Some(manifest) = &local_cfg.manifest {
            return Ok(Source::Local(LocalScanSource::from_manifest(Path::new(
                manifest,
            ))?));
        }
    }
    bail!("no scan source configured: set [archive] or [local] in the config")
}

fn run_list(cfg: &AppConfig, json: bool) -> Result<()> {
    let source = build_source(cfg)?;
    with_scan_source(source, |source| -> Result<()> {
        match source {
            Source::Remote(remote) => {
                let records = remote.catalog().records();
                if json {
                    println!("{}", serde_json::to_string_pretty(records)?);
                } else {
                    for record in records {
                        println!(
                            "{}\t{}\t{}",
                            record.session_label,
                            record.scan_id,
                            record.series_description.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
            Source::Local(local) => {
                if json {
                    println!("{}", serde_json::to_string_pretty(local.scans())?);
                } else {
                    for scan in local.scans() {
                        println!("{}", scan.display());
                    }
                }
            }
        }
        Ok(())
    })
}

fn run_status(cfg: &AppConfig, json: bool) -> Result<()> {
    let skip = cfg.iteration.skip_annotated;
    let source = build_source(cfg)?;
    with_scan_source(source, |source| -> Result<()> {
        source.set_skip_already_annotated(skip);
        let rows = session::collect_status(source)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else {
            for row in &rows {
                let state = if row.has_annotation {
                    "annotated"
                } else {
                    "pending"
                };
                println!("{}\t{}", row.label, state);
            }
        }
        Ok(())
    })
}

fn run_pull(cfg: &AppConfig, label: &str, out: &Path) -> Result<()> {
    if cfg.archive.is_none() {
        bail!("pull needs an [archive] source; local scans already reside on disk");
    }
    let source = build_source(cfg)?;
    let files = with_scan_source(source, |source| session::pull(source, label, out))?;
    println!("pulled {files} files into {}", out.display());
    Ok(())
}

fn run_push(cfg: &AppConfig, label: &str, file: &Path) -> Result<()> {
    let source = build_source(cfg)?;
    with_scan_source(source, |source| session::push(source, label, file))?;
    println!("stored annotation for {label}");
    Ok(())
}

fn run_fetch(cfg: &AppConfig, label: &str, dest: &Path) -> Result<()> {
    let source = build_source(cfg)?;
    let path = with_scan_source(source, |source| session::fetch(source, label, dest))?;
    println!("fetched annotation to {}", path.display());
    Ok(())
}
