//! ppd - Profile Pattern Diagnostics command line
//!
//! **Subcommands:**
//! - `candidate`: analyze one candidate JSON payload into a within-candidate report
//! - `materialise-db`: materialize a cohort SQLite database (candidate + cohort outputs)
//! - `show-config`: print the resolved configuration as TOML
//!
//! Diagnostic and descriptive only; nothing here ranks or predicts.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ppd_candidate::{candidate_report_from_payload, AnalyzeOptions, CandidateReportOptions};
use ppd_cohort::{cohort_report, materialise_db, MaterialiseOptions};
use ppd_common::config::{load_config, CONFIG_ENV_VAR};
use ppd_common::{BreachThresholds, DimensionKey, PpdConfig};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

/// Command-line arguments for ppd
#[derive(Parser, Debug)]
#[command(name = "ppd")]
#[command(about = "Profile Pattern Diagnostics: diagnostic, non-predictive profile structure analysis")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Version string embedded in report metadata
    #[arg(long, global = true, default_value = env!("CARGO_PKG_VERSION"))]
    report_version: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a single candidate JSON (nested categories -> metrics)
    Candidate {
        /// Candidate JSON file
        #[arg(long)]
        input: PathBuf,

        /// Where to write the report JSON
        #[arg(long)]
        output: PathBuf,

        /// Leave the candidate identity block out of the report
        #[arg(long)]
        no_identity: bool,

        /// Skip the adjacency descriptor (D)
        #[arg(long)]
        no_adjacency: bool,

        /// Skip pattern classification
        #[arg(long)]
        no_patterns: bool,

        /// Dimension order for adjacency, e.g. `group::a,group::b`
        #[arg(long, value_delimiter = ',')]
        order: Option<Vec<String>>,
    },

    /// Materialise an input cohort SQLite DB into an output DB
    MaterialiseDb {
        /// Input SQLite DB (must contain candidates/dimensions/scores)
        #[arg(long)]
        in_db: PathBuf,

        /// Output SQLite DB to create
        #[arg(long)]
        out_db: PathBuf,

        /// Store full JSON candidate reports in candidate_reports
        #[arg(long)]
        store_json_reports: bool,

        /// Breach thresholds as a JSON object, e.g. '{"tau_low":0.40}'
        #[arg(long)]
        taus_json: Option<String>,

        /// Also write the across-candidate cohort report JSON here
        #[arg(long)]
        cohort_report: Option<PathBuf>,
    },

    /// Print the resolved configuration as TOML
    ShowConfig,
}

fn main() -> Result<()> {
    // Logs go to stderr so report and config output stay clean on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "ppd v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    match args.command {
        Command::Candidate {
            input,
            output,
            no_identity,
            no_adjacency,
            no_patterns,
            order,
        } => {
            let options = CandidateReportOptions {
                analyze: AnalyzeOptions {
                    ordered_dimensions: order.map(|keys| parse_order(&keys)),
                    include_adjacency: !no_adjacency,
                    include_patterns: !no_patterns,
                },
                include_identity: !no_identity,
                version: args.report_version,
            };
            run_candidate(&config, &input, &output, &options)
        }

        Command::MaterialiseDb {
            in_db,
            out_db,
            store_json_reports,
            taus_json,
            cohort_report,
        } => {
            let mut options = MaterialiseOptions::new(in_db, out_db);
            options.store_json_reports = store_json_reports;
            options.breach_thresholds = taus_json.as_deref().map(parse_taus).transpose()?;

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;
            runtime.block_on(run_materialise(
                &config,
                &options,
                cohort_report.as_deref(),
                &args.report_version,
            ))
        }

        Command::ShowConfig => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn run_candidate(
    config: &PpdConfig,
    input: &Path,
    output: &Path,
    options: &CandidateReportOptions,
) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read candidate file {}", input.display()))?;
    let payload: Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", input.display()))?;

    let report = candidate_report_from_payload(&payload, config, options)?;
    write_json(output, &report)?;

    info!("Wrote candidate report to {}", output.display());
    Ok(())
}

async fn run_materialise(
    config: &PpdConfig,
    options: &MaterialiseOptions,
    cohort_report_path: Option<&Path>,
    version: &str,
) -> Result<()> {
    let summary = materialise_db(config, options)
        .await
        .with_context(|| format!("Failed to materialise {}", options.in_db.display()))?;

    if let Some(path) = cohort_report_path {
        let report = cohort_report(&summary, version)?;
        write_json(path, &report)?;
        info!("Wrote cohort report to {}", path.display());
    }

    Ok(())
}

fn parse_order(keys: &[String]) -> Vec<DimensionKey> {
    keys.iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(DimensionKey::parse)
        .collect()
}

/// Parse `--taus-json`; must be an object of numbers, kept in document order
fn parse_taus(json: &str) -> Result<BreachThresholds> {
    let value: Value = serde_json::from_str(json).context("--taus-json is not valid JSON")?;
    let Value::Object(entries) = value else {
        bail!("--taus-json must decode to a JSON object");
    };

    let mut taus = BreachThresholds::new();
    for (name, value) in entries {
        match value.as_f64() {
            Some(tau) => {
                taus.insert(name, tau);
            }
            None => bail!("--taus-json value for '{}' must be a number, got {}", name, value),
        }
    }
    Ok(taus)
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_candidate_flags() {
        let args = Args::try_parse_from([
            "ppd",
            "candidate",
            "--input",
            "in.json",
            "--output",
            "out.json",
            "--no-patterns",
            "--order",
            "g::a,g::b",
        ])
        .unwrap();

        match args.command {
            Command::Candidate {
                no_patterns,
                no_adjacency,
                order,
                ..
            } => {
                assert!(no_patterns);
                assert!(!no_adjacency);
                assert_eq!(order, Some(vec!["g::a".to_string(), "g::b".to_string()]));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_report_version_defaults_to_package_version() {
        let args = Args::try_parse_from(["ppd", "show-config"]).unwrap();
        assert_eq!(args.report_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_parse_order_skips_blanks() {
        let order = parse_order(&[" comm::clarity ".to_string(), "".to_string()]);
        assert_eq!(order, vec![DimensionKey::new("comm", "clarity")]);
    }

    #[test]
    fn test_parse_taus() {
        let taus = parse_taus(r#"{"tau_low": 0.4, "tau_high": 0.8}"#).unwrap();
        let names: Vec<&str> = taus.keys().collect();
        assert_eq!(names, vec!["tau_low", "tau_high"]);
        assert_eq!(taus.get("tau_low"), Some(&0.4));

        assert!(parse_taus("[0.4]").is_err());
        assert!(parse_taus(r#"{"tau_low": "low"}"#).is_err());
        assert!(parse_taus("not json").is_err());
    }
}
