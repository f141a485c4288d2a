//! agevec: deterministic age v1 test vector generator
//!
//! Commands:
//!   generate [--out DIR] [--only SUBSTR] [--no-manifest]
//!                       - build vectors and write one file each plus index.json
//!   list [--only SUBSTR] - list vector names and their expected outcome
//!   show <name>         - print a vector's metadata (without the container)
//!   config show         - display the active configuration

mod generate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use agevec_core::config::AgevecConfig;
use agevec_kit::{EmitOptions, Fixtures};

use crate::generate::GenerateOptions;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "agevec",
    version,
    about = "Deterministic age-encryption.org/v1 test vector generator"
)]
struct Cli {
    /// Path to agevec.toml configuration file
    #[arg(long, short = 'c', env = "AGEVEC_CONFIG", default_value = "agevec.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "AGEVEC_LOG")]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "AGEVEC_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build vectors and write them to the output directory
    Generate {
        /// Output directory (overrides generator.out_dir)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Only vectors whose name contains this substring
        #[arg(long)]
        only: Option<String>,
        /// Skip writing index.json
        #[arg(long)]
        no_manifest: bool,
    },

    /// List vector names
    List {
        /// Only vectors whose name contains this substring
        #[arg(long)]
        only: Option<String>,
    },

    /// Print one vector's metadata
    Show {
        name: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AgevecConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = match &cli.log_format {
        Some(f) => f.clone(),
        None if config.log.format == "json" => LogFormat::Json,
        None => LogFormat::Text,
    };
    init_logging(&level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        config_found = cli.config.exists(),
        "agevec starting"
    );

    let fixtures = Fixtures::from_config(&config.fixtures).context("resolving fixtures")?;

    match cli.command {
        Commands::Generate {
            out,
            only,
            no_manifest,
        } => cmd_generate(&config, &fixtures, out.as_deref(), only.as_deref(), no_manifest),
        Commands::List { only } => cmd_list(&fixtures, only.as_deref()),
        Commands::Show { name } => cmd_show(&fixtures, &name),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn make_progress_bar(total: u64, prefix: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("progress template")?
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

// ── `agevec generate` ─────────────────────────────────────────────────────────

fn cmd_generate(
    config: &AgevecConfig,
    fixtures: &Fixtures,
    out: Option<&Path>,
    only: Option<&str>,
    no_manifest: bool,
) -> Result<()> {
    let out_dir = out.unwrap_or(config.generator.out_dir.as_path());
    let definitions = agevec_vectors::matching(only);
    if definitions.is_empty() {
        anyhow::bail!("no vector matches {:?}", only.unwrap_or_default());
    }

    let options = GenerateOptions {
        emit: EmitOptions::from(&config.generator),
        manifest: config.generator.manifest && !no_manifest,
        workers: config.generator.workers,
    };
    info!(
        vectors = definitions.len(),
        out = %out_dir.display(),
        workers = options.workers,
        "generating"
    );

    let pb = make_progress_bar(definitions.len() as u64, "generate")?;
    let report = generate::generate(&definitions, fixtures, out_dir, &options, Some(&pb));
    pb.finish_and_clear();
    let report = report?;

    let compressed = report.written.iter().filter(|e| e.compressed).count();
    println!("Generated {} vectors in {}", report.written.len(), out_dir.display());
    println!("  compressed: {compressed}");
    if report.removed > 0 {
        println!("  removed:    {} stale files", report.removed);
    }
    if options.manifest {
        println!("  manifest:   {}", out_dir.join(generate::MANIFEST_FILE).display());
    }
    Ok(())
}

// ── `agevec list` / `agevec show` ─────────────────────────────────────────────

fn cmd_list(fixtures: &Fixtures, only: Option<&str>) -> Result<()> {
    for def in agevec_vectors::matching(only) {
        let vector = def.build(fixtures)?;
        println!("{:<40} {}", def.name, vector.expect);
    }
    Ok(())
}

fn cmd_show(fixtures: &Fixtures, name: &str) -> Result<()> {
    let def = agevec_vectors::find(name).with_context(|| format!("no vector named {name:?}"))?;
    let vector = def.build(fixtures)?;

    println!("name:       {}", vector.name);
    println!("expect:     {}", vector.expect);
    if let Some(digest) = vector.payload_digest {
        println!("payload:    {}", hex::encode(digest));
    }
    println!("file key:   {}", hex::encode(&vector.file_key));
    for id in &vector.identities {
        println!("identity:   {id}");
    }
    for p in &vector.passphrases {
        println!("passphrase: {p}");
    }
    println!("armored:    {}", if vector.armored { "yes" } else { "no" });
    if let Some(comment) = &vector.comment {
        println!("comment:    {comment}");
    }
    println!("size:       {} bytes", vector.body.len());
    Ok(())
}

// ── `agevec config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &AgevecConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
