//! reverie CLI - binary entry point.
//!
//! ```text
//! plan      journey.json --words N        -> contract + reasoning
//! analyze   script.txt                    -> pattern + grammar analysis
//! check     script.txt --words N          -> quality report, no network
//! generate  request.json [--single-pass]  -> contract + reasoning + quality report
//! ```
//!
//! Results go to stdout as JSON; logs go to stderr.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use reverie_analysis::text::word_count;
use reverie_analysis::{NaturalnessAnalyzer, PatternAnalyzer};
use reverie_config::{ReverieConfig, RuleSet};
use reverie_engine::{
    BudgetPlanner, GenerationMode, Pipeline, QualityGuard, RunOptions, ScriptRequest,
};
use reverie_providers::{ApiConfig, HttpGenerator, RetryConfig};
use reverie_types::{EmergenceType, Journey, Provider};

#[derive(Debug, Parser)]
#[command(name = "reverie", version, about = "Plan, generate and quality-check guided relaxation scripts")]
struct Cli {
    /// Config file [default: ~/.reverie/config.toml]
    #[arg(long, global = true, env = "REVERIE_CONFIG")]
    config: Option<PathBuf>,

    /// Rule set TOML, overriding the configured one
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Split a word target across a journey's stages
    Plan {
        /// JSON array of stages: [{"arcId": "...", "weight": 40}, ...]
        journey: PathBuf,
        #[arg(long)]
        words: u32,
    },
    /// Phrase repetition and grammar naturalness for a script
    Analyze { script: PathBuf },
    /// Run every quality check on a script, without repair
    Check {
        script: PathBuf,
        #[arg(long)]
        words: u32,
        #[arg(long, default_value = "regular")]
        emergence: EmergenceType,
    },
    /// Run the full generation pipeline
    Generate {
        /// JSON object: {"journey": [...], "targetWords": N, "context": {...}}
        request: PathBuf,
        /// One collaborator call instead of outline, draft and polish
        #[arg(long)]
        single_pass: bool,
        /// Report failures instead of attempting the single repair
        #[arg(long)]
        no_repair: bool,
        /// Abort the whole run after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        #[arg(long)]
        provider: Option<Provider>,
        #[arg(long)]
        model: Option<String>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    // stdout carries results; keep logs off it.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ReverieConfig> {
    match path {
        Some(path) => ReverieConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ReverieConfig::load()
            .context("loading ~/.reverie/config.toml")?
            .unwrap_or_default()),
    }
}

fn load_rules(config: &ReverieConfig, path: Option<&Path>) -> Result<RuleSet> {
    match path {
        Some(path) => {
            RuleSet::load(path).with_context(|| format!("loading rule set {}", path.display()))
        }
        None => config.rules().context("loading configured rule set"),
    }
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_input(path)?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn plan(rules: &RuleSet, journey: &Path, words: u32) -> Result<ExitCode> {
    let journey: Journey = read_json(journey)?;
    let plan = BudgetPlanner::new(rules).plan(&journey, words);
    print_json(&json!({
        "contract": plan.contract,
        "reasoning": plan.reasoning,
    }))?;
    Ok(ExitCode::SUCCESS)
}

fn analyze(rules: &RuleSet, script: &Path) -> Result<ExitCode> {
    let text = read_input(script)?;
    print_json(&json!({
        "words": word_count(&text),
        "patterns": PatternAnalyzer::new(&rules.diversity).analyze(&text),
        "grammar": NaturalnessAnalyzer::new(&rules.naturalness).analyze(&text),
    }))?;
    Ok(ExitCode::SUCCESS)
}

fn check(rules: &RuleSet, script: &Path, words: u32, emergence: EmergenceType) -> Result<ExitCode> {
    let text = read_input(script)?;
    let report = QualityGuard::new(rules, 0).score(&text, words, emergence);
    print_json(&report)?;
    Ok(if report.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

struct GenerateArgs {
    request: PathBuf,
    options: RunOptions,
    timeout: Option<u64>,
    provider: Option<Provider>,
    model: Option<String>,
}

async fn generate(config: &ReverieConfig, rules: &RuleSet, args: GenerateArgs) -> Result<ExitCode> {
    let request: ScriptRequest = read_json(&args.request)?;

    let provider = match args.provider {
        Some(provider) => provider,
        None => config.provider()?,
    };
    let model = args.model.unwrap_or_else(|| config.model(provider));
    let api_key = config.api_key(provider)?;
    let limits = config.generation();

    tracing::info!(provider = provider.as_str(), model = %model, "Using generation collaborator");
    let generator = HttpGenerator::new(
        ApiConfig::new(api_key, model),
        Duration::from_secs(limits.request_timeout_secs),
        RetryConfig::default().with_max_retries(limits.max_retries),
    )?;
    let pipeline = Pipeline::new(rules, &generator).with_max_output_tokens(limits.max_output_tokens);

    let run = pipeline.run(&request, args.options);
    let outcome = match args.timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), run)
            .await
            .map_err(|_| anyhow!("generation timed out after {secs}s"))??,
        None => run.await?,
    };

    print_json(&outcome)?;
    Ok(if outcome.report.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let rules = load_rules(&config, cli.rules.as_deref())?;
    tracing::debug!(version = %rules.version, "Loaded rule set");

    match cli.command {
        Command::Plan { journey, words } => plan(&rules, &journey, words),
        Command::Analyze { script } => analyze(&rules, &script),
        Command::Check {
            script,
            words,
            emergence,
        } => check(&rules, &script, words, emergence),
        Command::Generate {
            request,
            single_pass,
            no_repair,
            timeout,
            provider,
            model,
        } => {
            let options = RunOptions {
                mode: if single_pass {
                    GenerationMode::SinglePass
                } else {
                    GenerationMode::Staged
                },
                allow_retry: !no_repair,
            };
            let args = GenerateArgs {
                request,
                options,
                timeout,
                provider,
                model,
            };
            generate(&config, &rules, args).await
        }
    }
}
