//! impact-runner: headless front end for the factoring filter evaluator.
//!
//! Usage:
//!   impact-runner --db datasets.db [--config thresholds.json] [--json]
//!   impact-runner --synthetic --seed 42 --min-payer-txns 20
//!   impact-runner --db datasets.db --derive-profiles
//!   impact-runner --synthetic --ipc-mode

use anyhow::Result;
use chrono::{DateTime, Utc};
use factoring_core::{
    config::{FilterThresholds, ThresholdOverrides},
    error::EvalError,
    evaluator::FilterImpactEvaluator,
    profiles::derive_profiles,
    store::DatasetStore,
    synthetic::{self, SyntheticParams},
    types::Timestamp,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetDefaults,
    Evaluate {
        #[serde(default)]
        thresholds: ThresholdOverrides,
    },
    Quit,
}

#[derive(Debug, PartialEq)]
enum DataSource<'a> {
    Db(&'a str),
    Synthetic,
}

#[derive(serde::Serialize)]
struct DefaultsResponse {
    thresholds: FilterThresholds,
    parameters: Vec<factoring_core::config::ParameterSpec>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let ipc_mode = has_flag(&args, "--ipc-mode");
    let json = has_flag(&args, "--json");
    let use_synthetic = has_flag(&args, "--synthetic");
    let derive = has_flag(&args, "--derive-profiles");
    let db = string_arg(&args, "--db");
    let config_path = string_arg(&args, "--config");
    let as_of = match string_arg(&args, "--as-of") {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map_err(|e| anyhow::anyhow!("Invalid --as-of {s}: {e}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let base = match config_path {
        Some(path) => FilterThresholds::load(path)?,
        None => FilterThresholds::default(),
    };
    let thresholds = base.with_overrides(&cli_overrides(&args)?);
    let source = data_source(db, use_synthetic)?;

    if !ipc_mode && !json {
        println!("Factoring filter impact: impact-runner");
        println!("  source:  {}", source_label(&source, seed));
        println!("  as_of:   {}", as_of.to_rfc3339());
        println!();
    }

    let data = match source {
        DataSource::Synthetic => {
            if derive {
                log::warn!("--derive-profiles has no effect with --synthetic");
            }
            synthetic::generate(seed, &SyntheticParams::default(), as_of)
        }
        DataSource::Db(path) if derive => {
            let store = DatasetStore::open(path)?;
            refresh_profiles(&store, as_of)?;
            store.load_datasets()?
        }
        DataSource::Db(path) => DatasetStore::open_read_only(path)?.load_datasets()?,
    };

    // The join does not depend on thresholds: build it once.
    let evaluator = FilterImpactEvaluator::new(&data)?;

    if ipc_mode {
        run_ipc_loop(&evaluator, &thresholds, as_of)?;
        return Ok(());
    }

    let report = evaluator.evaluate(&thresholds, as_of)?;
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_table());
    }
    Ok(())
}

fn run_ipc_loop(
    evaluator: &FilterImpactEvaluator,
    base: &FilterThresholds,
    as_of: Timestamp,
) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetDefaults => {
                let defaults = DefaultsResponse {
                    thresholds: base.clone(),
                    parameters: FilterThresholds::parameter_specs(),
                };
                writeln!(stdout, "{}", serde_json::to_string(&defaults)?)?;
            }
            IpcCommand::Evaluate { thresholds } => {
                let effective = base.with_overrides(&thresholds);
                match evaluator.evaluate(&effective, as_of) {
                    Ok(report) => writeln!(stdout, "{}", report.to_json()?)?,
                    Err(e @ EvalError::InsufficientData { .. }) => {
                        let err_json = serde_json::json!({
                            "error": e.to_string(),
                            "kind": "insufficient_data",
                        });
                        writeln!(stdout, "{}", err_json)?;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn data_source(db: Option<&str>, use_synthetic: bool) -> Result<DataSource<'_>> {
    match (db, use_synthetic) {
        (Some(_), true) => anyhow::bail!("--db and --synthetic are mutually exclusive"),
        (Some(path), false) => Ok(DataSource::Db(path)),
        (None, true) => Ok(DataSource::Synthetic),
        (None, false) => anyhow::bail!("either --db <path> or --synthetic is required"),
    }
}

/// Recompute the three profile tables from the stored transactions.
/// This is the only path that writes to the dataset database.
fn refresh_profiles(store: &DatasetStore, as_of: Timestamp) -> Result<()> {
    store.migrate()?;
    let transactions = store.load_transactions()?;
    store.replace_profiles(&derive_profiles(&transactions, as_of))?;
    Ok(())
}

/// `--min-payer-txns 20` style flag for a threshold field name.
fn threshold_flag(name: &str) -> String {
    format!("--{}", name.replace('_', "-"))
}

/// `--<threshold-name> <value>` for every threshold named in the parameter
/// specs; `--missing-values fail|pass` for the missing-value policy.
fn cli_overrides(args: &[String]) -> Result<ThresholdOverrides> {
    let mut map = serde_json::Map::new();
    for spec in FilterThresholds::parameter_specs() {
        let flag = threshold_flag(spec.name);
        let Some(raw) = string_arg(args, &flag) else {
            continue;
        };
        let value = if spec.name == "tokens" {
            serde_json::Value::from(
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>(),
            )
        } else if let Ok(i) = raw.parse::<i64>() {
            serde_json::Value::from(i)
        } else {
            let f: f64 = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid {flag} {raw}: {e}"))?;
            serde_json::Value::from(f)
        };
        map.insert(spec.name.to_string(), value);
    }
    if let Some(policy) = string_arg(args, &threshold_flag("missing_values")) {
        map.insert("missing_values".into(), serde_json::Value::from(policy));
    }
    Ok(serde_json::from_value(serde_json::Value::Object(map))?)
}

fn source_label(source: &DataSource<'_>, seed: u64) -> String {
    match source {
        DataSource::Synthetic => format!("synthetic (seed {seed})"),
        DataSource::Db(path) => path.to_string(),
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
