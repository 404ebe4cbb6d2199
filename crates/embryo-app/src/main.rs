use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use embryo_core::{CellType, Embryo, RecycleMode, TickSummary, TissueConfig};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "embryo-app",
    version,
    about = "Grow an embryo tissue from its seed disk without a viewer"
)]
struct Cli {
    /// Number of ticks to simulate.
    #[arg(long, env = "EMBRYO_TICKS", default_value_t = 300)]
    ticks: u64,
    /// RNG seed; omit to draw one from entropy.
    #[arg(long, env = "EMBRYO_SEED")]
    seed: Option<u64>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Log a summary every N ticks (0 logs only the final tick).
    #[arg(long, default_value_t = 25)]
    report_every: u64,
    /// JSON file with a full or partial `TissueConfig`.
    #[arg(long)]
    config: Option<PathBuf>,
    /// When dying cells hand their energy to neighbours.
    #[arg(long, value_enum)]
    recycle: Option<RecycleArg>,
    /// Print the final tick summary to stdout as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RecycleArg {
    InPass,
    Deferred,
}

impl From<RecycleArg> for RecycleMode {
    fn from(value: RecycleArg) -> Self {
        match value {
            RecycleArg::InPass => RecycleMode::InPass,
            RecycleArg::Deferred => RecycleMode::Deferred,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let budget = config.total_energy;

    let mut embryo = Embryo::new(config).context("failed to seed the tissue")?;
    info!(
        width = embryo.state().width(),
        height = embryo.state().height(),
        population = embryo.state().stats().population,
        ticks = cli.ticks,
        "Starting embryo simulation"
    );

    let mut last = None;
    for _ in 0..cli.ticks {
        let summary = embryo.step();
        if cli.report_every > 0 && summary.tick.0.is_multiple_of(cli.report_every) {
            report(&summary, budget);
        }
        if summary.population == 0 {
            warn!(tick = summary.tick.0, "tissue died out");
            last = Some(summary);
            break;
        }
        last = Some(summary);
    }

    let Some(summary) = last else {
        info!("No ticks requested");
        return Ok(());
    };
    if cli.report_every == 0 || !summary.tick.0.is_multiple_of(cli.report_every) {
        report(&summary, budget);
    }
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn build_config(cli: &Cli) -> Result<TissueConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<TissueConfig>(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => TissueConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.rng_seed = Some(seed);
    }
    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(height) = cli.height {
        config.height = height;
    }
    if let Some(mode) = cli.recycle {
        config.recycle_mode = mode.into();
    }
    if let Err(err) = config.validate() {
        bail!("rejected configuration: {err}");
    }
    Ok(config)
}

fn report(summary: &TickSummary, budget: f64) {
    let drift = if budget > 0.0 {
        (summary.total_energy - budget) / budget
    } else {
        0.0
    };
    info!(
        tick = summary.tick.0,
        population = summary.population,
        births = summary.births,
        deaths = summary.deaths,
        stem = summary.count(CellType::Stem),
        ectoderm = summary.count(CellType::Ectoderm),
        mesoderm = summary.count(CellType::Mesoderm),
        endoderm = summary.count(CellType::Endoderm),
        neural = summary.count(CellType::Neural),
        muscle = summary.count(CellType::Muscle),
        vessel = summary.count(CellType::Vessel),
        energy = summary.total_energy,
        energy_lost = summary.energy_lost,
        drift,
        "Tissue summary"
    );
}
