//! kunitgen - compiler-guided KUnit test generation
//!
//! ## Commands
//!
//! - `extract`: Split a C/C++ source into one file per function
//! - `reduce`: Reduce a raw build log to unique error blocks
//! - `register`: Add generated tests to Makefile, Kconfig and the kunitconfig
//! - `generate`: Extract, generate, register and verify until the log is clean

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};

use kunitgen_core::reporting::render_summary;
use kunitgen_core::{
    extract, save_units, write_batch_report, BatchReport, BuildRegistrar, ControllerSettings,
    DiagnosticReducer, ExtractedUnit, GenerationController, Grammar, KunitgenConfig,
    KunitgenError, ReferenceLibrary, RegistrationReport, SourceText,
};
use kunitgen_llm::{ClientConfig, OpenAiCompatibleClient};
use kunitgen_verify::CommandVerifier;

#[derive(Parser)]
#[command(name = "kunitgen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate KUnit tests and regenerate them until they compile", long_about = None)]
struct Cli {
    /// Config file (default: ./kunitgen.toml when present)
    #[arg(short, long, global = true, env = "KUNITGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and results
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract function definitions into one file each
    Extract {
        /// Source file to split
        #[arg(short, long)]
        input: PathBuf,

        /// Header grammar (default: guessed from the extension, else c)
        #[arg(short, long)]
        grammar: Option<Grammar>,

        /// Output directory (default: paths.units_dir)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Reduce a raw build log to unique error blocks
    Reduce {
        /// Raw compiler or kunit.py log
        #[arg(short, long)]
        log: PathBuf,

        /// Also write the rendered summary here
        #[arg(short, long)]
        summary: Option<PathBuf>,
    },

    /// Register generated tests with the kernel build
    Register {
        /// Artifact names (file stems of generated tests)
        #[arg(required_unless_present = "from_dir", conflicts_with = "from_dir")]
        names: Vec<String>,

        /// Register every generated test found directly in this directory
        #[arg(long)]
        from_dir: Option<PathBuf>,
    },

    /// Run the full generate-verify loop
    Generate {
        /// Source files or directories to extract functions from
        #[arg(short, long, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Fetch additional sources over HTTP
        #[arg(long, num_args = 1..)]
        url: Vec<String>,

        /// Generator calls per function, first attempt included
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Model name
        #[arg(short, long)]
        model: Option<String>,

        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    kunitgen_core::init_tracing(cli.json, level);

    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    let config = KunitgenConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Extract {
            input,
            grammar,
            out_dir,
        } => cmd_extract(&config, &input, grammar, out_dir.as_deref()),
        Commands::Reduce { log, summary } => cmd_reduce(&log, summary, cli.json),
        Commands::Register { names, from_dir } => {
            cmd_register(&config, names, from_dir.as_deref(), cli.json)
        }
        Commands::Generate {
            input,
            url,
            max_attempts,
            model,
            temperature,
        } => {
            let config = apply_overrides(config, max_attempts, model, temperature);
            cmd_generate(config, &input, &url, cli.json).await
        }
    }
}

/// Extract function definitions into one file each
fn cmd_extract(
    config: &KunitgenConfig,
    input: &Path,
    grammar: Option<Grammar>,
    out_dir: Option<&Path>,
) -> Result<()> {
    let grammar = grammar
        .or_else(|| Grammar::from_path(input))
        .unwrap_or(Grammar::C);
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {:?}", input))?;
    let source = SourceText::new(text, grammar).with_origin(input.display().to_string());

    let units = extract(&source);
    let out_dir = out_dir.unwrap_or(&config.paths.units_dir);
    let written = save_units(&units, out_dir, grammar.extension())?;

    for unit in &units {
        println!("  {} ({} bytes)", unit.name, unit.body.len());
    }
    println!();
    println!(
        "Extracted {} function(s), wrote {} file(s) to {:?}",
        units.len(),
        written,
        out_dir
    );
    Ok(())
}

/// Reduce a raw build log to unique error blocks
fn cmd_reduce(log: &Path, summary: Option<PathBuf>, json: bool) -> Result<()> {
    let raw = std::fs::read(log).with_context(|| format!("Failed to read {:?}", log))?;
    let raw = String::from_utf8_lossy(&raw);

    let reducer = match summary {
        Some(path) => DiagnosticReducer::with_summary_path(path),
        None => DiagnosticReducer::new(),
    };
    let report = reducer.reduce(&raw);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render());
    }
    Ok(())
}

/// Register generated tests with the kernel build
fn cmd_register(
    config: &KunitgenConfig,
    mut names: Vec<String>,
    from_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    if let Some(dir) = from_dir {
        names = artifact_names_in(dir, &config.generation.extension)?;
        if names.is_empty() {
            warn!(dir = %dir.display(), "No generated tests found");
            return Ok(());
        }
    }

    let registrar = BuildRegistrar::on_disk(config.descriptors.clone());
    for name in &names {
        let report = registrar
            .register(name)
            .with_context(|| format!("Failed to register {}", name))?;
        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            print_registration(&report);
        }
    }
    Ok(())
}

fn print_registration(report: &RegistrationReport) {
    println!("{} ({})", report.artifact, report.toggle.config_symbol());
    println!("  module list:  {}", report.module_list);
    println!("  declarations: {}", report.declarations);
    println!("  enablement:   {}", report.enablement);
}

/// Run the full generate-verify loop
async fn cmd_generate(
    config: KunitgenConfig,
    inputs: &[PathBuf],
    urls: &[String],
    json: bool,
) -> Result<()> {
    config.validate()?;

    let mut sources = Vec::new();
    for input in inputs {
        sources.extend(read_sources(input)?);
    }
    if !urls.is_empty() {
        let client = reqwest::Client::new();
        for url in urls {
            match fetch_source(&client, url).await {
                Ok(source) => sources.push(source),
                Err(e) => warn!(url = %url, error = %e, "Skipping source"),
            }
        }
    }
    if sources.iter().all(SourceText::is_empty) {
        return Err(KunitgenError::NoSourceText.into());
    }

    let units: Vec<ExtractedUnit> = sources.iter().flat_map(extract).collect();
    if units.is_empty() {
        warn!("No functions found in the given sources");
        return Ok(());
    }

    let generator = OpenAiCompatibleClient::new(
        ClientConfig::from_generation(&config.generation).context("Failed to configure model client")?,
    )?;
    let verifier = CommandVerifier::new(config.verifier.clone());
    let reducer = DiagnosticReducer::beside_log(&verifier.log_path());
    let registrar = BuildRegistrar::on_disk(config.descriptors.clone());

    let mut controller = GenerationController::new(
        Arc::new(generator),
        Arc::new(verifier),
        registrar,
        ControllerSettings::from_config(&config),
    )
    .with_reducer(reducer);

    if let Some(dir) = config.paths.reference_dir.as_deref().filter(|d| d.is_dir()) {
        let library = ReferenceLibrary::load_dir(dir)?;
        if !library.is_empty() {
            controller = controller.with_context(Arc::new(library));
        }
    }

    info!(units = units.len(), "Starting generation");
    let report = controller.run_batch(&units).await;
    let report_path = write_batch_report(&config.paths.work_dir, &report)?;
    info!(path = %report_path.display(), "Wrote batch report");
    print!("{}", render_batch(&report, &report_path, json)?);

    if report.all_succeeded() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} function(s) exhausted their retry budget",
            report.exhausted_count()
        )
    }
}

fn render_batch(report: &BatchReport, report_path: &Path, json: bool) -> Result<String> {
    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(report)?));
    }
    Ok(format!(
        "Run ID: {}\n\n{}Report: {:?}\n",
        report.run_id,
        render_summary(report),
        report_path
    ))
}

fn apply_overrides(
    mut config: KunitgenConfig,
    max_attempts: Option<u32>,
    model: Option<String>,
    temperature: Option<f32>,
) -> KunitgenConfig {
    if let Some(n) = max_attempts {
        config.generation.max_attempts = n;
    }
    if let Some(m) = model {
        config.generation.model = m;
    }
    if let Some(t) = temperature {
        config.generation.temperature = t;
    }
    config
}

/// A file, or every C/C++ source directly inside a directory.
fn read_sources(input: &Path) -> Result<Vec<SourceText>> {
    let paths = if input.is_dir() {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(input)
            .with_context(|| format!("Failed to list {:?}", input))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_source_file(p))
            .collect();
        paths.sort();
        paths
    } else {
        vec![input.to_path_buf()]
    };

    paths
        .into_iter()
        .map(|path| {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            let grammar = Grammar::from_path(&path).unwrap_or(Grammar::C);
            Ok(SourceText::new(text, grammar).with_origin(path.display().to_string()))
        })
        .collect()
}

fn is_source_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("c" | "cpp" | "cc" | "cxx")
    )
}

async fn fetch_source(client: &reqwest::Client, url: &str) -> Result<SourceText> {
    let text = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let grammar = grammar_for_url(url);
    info!(url = %url, bytes = text.len(), "Fetched source");
    Ok(SourceText::new(text, grammar).with_origin(url))
}

fn grammar_for_url(url: &str) -> Grammar {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    Grammar::from_path(Path::new(path)).unwrap_or(Grammar::C)
}

/// Sorted file stems of `*.<extension>` files directly in `dir`.
fn artifact_names_in(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some(extension))
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect();
    names.sort();
    Ok(names)
}
