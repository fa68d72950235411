use anyhow::{Context, Result};
use cas_analysis::{
    config::{load_config, AnalysisConfig},
    data::{PopulationIndex, RecordStore},
    logging::{init_subscriber, LogContext},
    report,
};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::{fs, path::PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Temporal and spatial analysis of the CAS crash dataset",
    after_help = "example:\n  cas-analysis temporal --data-src /tmp/cas.csv --config-file /tmp/temporal_exp1.yaml"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Per-year totals by region, region ranking and a fitted trend per field
    Temporal(CommonArgs),
    /// Per-region values by year, per capita when the config names a population dataset
    Spatial(CommonArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Crash dataset (.csv or .parquet)
    #[arg(long)]
    data_src: PathBuf,
    /// Analysis configuration (YAML)
    #[arg(long)]
    config_file: PathBuf,
    /// Where reports are written [default: $WORKDIR or /tmp/cas_analysis/<timestamp>]
    #[arg(long)]
    workdir: Option<PathBuf>,
    /// Override `num_workers` from the config
    #[arg(long)]
    workers: Option<usize>,
}

impl CommonArgs {
    fn workdir(&self) -> PathBuf {
        self.workdir
            .clone()
            .or_else(|| std::env::var_os("WORKDIR").map(PathBuf::from))
            .unwrap_or_else(|| {
                PathBuf::from("/tmp/cas_analysis")
                    .join(Utc::now().format("%Y%m%dT%H%M%S").to_string())
            })
    }

    fn load(&self) -> Result<(RecordStore, AnalysisConfig)> {
        info!("read raw dataset {}", self.data_src.display());
        let store = RecordStore::load(&self.data_src)
            .with_context(|| format!("loading crash dataset {}", self.data_src.display()))?;

        info!("read config {}", self.config_file.display());
        let mut cfg = load_config(&self.config_file)
            .with_context(|| format!("loading config {}", self.config_file.display()))?;
        if let Some(w) = self.workers {
            cfg.num_workers = Some(w);
            cfg.validate().context("validating --workers")?;
        }
        Ok((store, cfg))
    }
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    init_subscriber("info");
    let cli = Cli::parse();

    match cli.command {
        Command::Temporal(args) => temporal(&args),
        Command::Spatial(args) => spatial(&args),
    }
}

fn temporal(args: &CommonArgs) -> Result<()> {
    let ctx = LogContext::new("temporal");
    let _enter = ctx.span().enter();

    // ─── 2) load inputs ──────────────────────────────────────────────
    let (store, cfg) = args.load()?;

    // ─── 3) aggregate, rank, fit ─────────────────────────────────────
    info!("temporal analysis ...");
    let report = report::temporal_report(&store, &cfg, &ctx).context("temporal analysis")?;

    // ─── 4) write reports ────────────────────────────────────────────
    let workdir = args.workdir();
    fs::create_dir_all(&workdir)
        .with_context(|| format!("creating workdir {}", workdir.display()))?;
    let written = report::write_temporal(&report, &workdir)?;
    info!(
        "job done ({} reports are created at {})",
        written.len(),
        workdir.display()
    );
    Ok(())
}

fn spatial(args: &CommonArgs) -> Result<()> {
    let ctx = LogContext::new("spatial");
    let _enter = ctx.span().enter();

    // ─── 2) load inputs ──────────────────────────────────────────────
    let (store, cfg) = args.load()?;
    let population = match &cfg.use_population_data {
        Some(path) => {
            info!("using population data {}", path.display());
            Some(
                PopulationIndex::load(path)
                    .with_context(|| format!("loading population dataset {}", path.display()))?,
            )
        }
        None => None,
    };

    // ─── 3) aggregate ────────────────────────────────────────────────
    info!("spatial analysis ...");
    let report = report::spatial_report(&store, population.as_ref(), &cfg, &ctx)
        .context("spatial analysis")?;

    // ─── 4) write reports ────────────────────────────────────────────
    let workdir = args.workdir();
    fs::create_dir_all(&workdir)
        .with_context(|| format!("creating workdir {}", workdir.display()))?;
    let written = report::write_spatial(&report, &workdir)?;
    info!(
        "job done ({} reports are created at {})",
        written.len(),
        workdir.display()
    );
    Ok(())
}
