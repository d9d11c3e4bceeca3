use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use safezone::config::PipelineConfig;
use safezone::pipeline::{Outcome, regenerate_full_encoder, train_all};
use safezone::reshape::{numeric_rows, reshape_raw, write_csv};
use safezone::serve::{Catalog, Origin, Prediction};
use safezone::store::FsStore;

#[derive(Parser)]
#[command(name = "safezone", about = "Area/Zone/Time safety prediction per city.")]
struct Cli {
    /// JSON config file; omitted sections keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the city CSVs
    #[arg(long, global = true, default_value = ".")]
    data_dir: PathBuf,

    /// Directory for encoder and model artifacts
    #[arg(long, global = true, default_value = ".")]
    artifacts: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train every configured dataset (or only the given cities)
    Train {
        #[arg(long = "city")]
        cities: Vec<String>,

        /// Skip datasets whose model is newer than their CSV
        #[arg(long)]
        skip_fresh: bool,
    },

    /// Interactive prediction for one city
    Predict {
        #[arg(long)]
        city: String,
    },

    /// One-shot prediction
    Query {
        #[arg(long)]
        city: String,
        #[arg(long)]
        area: String,
        #[arg(long)]
        zone: String,
        #[arg(long)]
        time: String,
    },

    /// Convert a raw crime log into the common dataset schema
    Reshape {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        numeric_output: Option<PathBuf>,
    },

    /// Fit and save an encoder over all categorical columns of a city
    FitEncoder {
        #[arg(long)]
        city: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let cfg = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Train { cities, skip_fresh } => {
            cmd_train(&cfg, &cli.data_dir, &cli.artifacts, &cities, skip_fresh)
        }
        Commands::Predict { city } => {
            let mut catalog = catalog(&cfg, &cli.data_dir, &cli.artifacts);
            cmd_predict(&mut catalog, &city)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Query {
            city,
            area,
            zone,
            time,
        } => {
            let mut catalog = catalog(&cfg, &cli.data_dir, &cli.artifacts);
            let predictor = catalog.predictor(&city).map_err(anyhow::Error::msg)?;
            let prediction = predictor.predict(&area, &zone, &time)?;
            print_prediction(&city, &area, &zone, &time, &prediction);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reshape {
            input,
            output,
            numeric_output,
        } => {
            let rows = reshape_raw(&input, &cfg.reshape)?;
            write_csv(&output, &rows)?;
            println!("✅ Saved transformed dataset: {}", output.display());
            if let Some(path) = numeric_output {
                write_csv(&path, &numeric_rows(&rows, &cfg.reshape))?;
                println!("✅ Saved numeric dataset: {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::FitEncoder { city } => {
            let source = cfg
                .dataset(&city)
                .with_context(|| format!("unknown city {city:?}"))?;
            let mut store = FsStore::new(&cli.artifacts);
            regenerate_full_encoder(source, &cli.data_dir, &cfg, &mut store)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn catalog(cfg: &PipelineConfig, data_dir: &Path, artifacts: &Path) -> Catalog<FsStore> {
    Catalog::new(
        cfg.datasets.clone(),
        data_dir,
        FsStore::new(artifacts),
        cfg.cleaning.clone(),
    )
}

fn cmd_train(
    cfg: &PipelineConfig,
    data_dir: &Path,
    artifacts: &Path,
    cities: &[String],
    skip_fresh: bool,
) -> Result<ExitCode> {
    let mut selected = Vec::new();
    for city in cities {
        match cfg.dataset(city) {
            Some(source) => selected.push(source),
            None => bail!("unknown city {city:?}"),
        }
    }
    if selected.is_empty() {
        selected.extend(cfg.datasets.iter());
    }

    let mut store = FsStore::new(artifacts);
    println!("🧠 Training {} dataset(s)...", selected.len());
    let results = train_all(selected, data_dir, cfg, &mut store, skip_fresh);

    let mut failed = 0;
    println!();
    for (city, result) in &results {
        match result {
            Ok(Outcome::Trained(s)) => println!(
                "✅ {city}: {} ({:.4}) on {} rows",
                s.best, s.best_accuracy, s.rows
            ),
            Ok(Outcome::Skipped) => println!("📦 {city}: model up to date"),
            Err(e) => {
                failed += 1;
                println!("❌ {city}: {e:#}");
            }
        }
    }
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_predict(catalog: &mut Catalog<FsStore>, city: &str) -> Result<()> {
    let predictor = match catalog.predictor(city) {
        Ok(p) => p,
        Err(msg) => {
            println!("⚠️ {msg}");
            println!("Prediction is disabled for {city}.");
            return Ok(());
        }
    };

    println!("📍 Areas: {}", predictor.areas().join(", "));
    println!("Commands: 'zones <area>', 'times <area>, <zone>', '<area>, <zone>, <time>', 'exit'");

    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        if line.eq_ignore_ascii_case("exit") {
            break;
        }
        if let Some(area) = line.strip_prefix("zones ") {
            println!("🗺 {}", predictor.zones(area).join(", "));
            continue;
        }
        if let Some(rest) = line.strip_prefix("times ") {
            match rest.split_once(',') {
                Some((area, zone)) => println!("⏰ {}", predictor.times(area, zone).join(", ")),
                None => println!("usage: times <area>, <zone>"),
            }
            continue;
        }

        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        let [area, zone, time] = parts.as_slice() else {
            println!("Enter '<area>, <zone>, <time>' or 'exit'");
            continue;
        };
        match predictor.predict(area, zone, time) {
            Ok(p) => print_prediction(city, area, zone, time, &p),
            Err(e) => println!("❌ {e:#}"),
        }
    }
    Ok(())
}

fn print_prediction(city: &str, area: &str, zone: &str, time: &str, p: &Prediction) {
    let badge = match p.label {
        safezone::Safety::Safe => "🟢 SAFE",
        safezone::Safety::Unsafe => "🔴 UNSAFE",
    };
    let source = match p.origin {
        Origin::Lookup => "historical record",
        Origin::Model => "model inference",
    };
    println!("\n{badge} ({source})");
    println!("City: {city}");
    println!("Area: {area}");
    println!("Zone: {zone}");
    println!("Time: {time}");
    println!("People Frequency: {}", p.details.people_frequency);
    println!("Police Station Nearby: {}", p.details.is_police_station);
    println!("Bar Nearby: {}", p.details.is_bar);
    println!("Tier: {}", p.details.tier);
    println!("Residence Level: {}", p.details.residence_level);
}
