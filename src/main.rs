//! vcf-ingest CLI: load variant files into a document sink and check the loss.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Map, Value};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vcf_ingest::io::resolve_inputs;
use vcf_ingest::metrics::MetricsCollector;
use vcf_ingest::{
    DocumentSink, IngestOptions, IngestionReport, JsonlSink, MemorySink, Runner,
};

#[derive(Parser, Debug)]
#[command(version, about)]
struct CliArgs {
    /// Variant files or glob patterns (e.g. `cohort/chr*.vcf`)
    #[arg(required = true)]
    inputs: Vec<String>,

    /// TOML file with ingestion options; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker pool size (defaults to the number of CPUs)
    #[arg(short, long)]
    processors: Option<usize>,

    /// Records per bulk write
    #[arg(long)]
    batch_size: Option<usize>,

    /// Per-chunk timeout in milliseconds
    #[arg(long)]
    chunk_timeout_ms: Option<u64>,

    /// Lost records tolerated before a file fails validation
    #[arg(long)]
    max_loss: Option<u64>,

    /// Append documents to this JSON Lines file instead of keeping them in memory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the ingestion reports (a JSON array) to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write run metrics (a JSON object keyed by input file) to this file
    #[arg(long)]
    metrics: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl CliArgs {
    fn options(&self) -> Result<IngestOptions> {
        let mut options = match &self.config {
            Some(path) => IngestOptions::from_toml_file(path)
                .with_context(|| format!("load options from {}", path.display()))?,
            None => IngestOptions::default(),
        };
        if let Some(p) = self.processors {
            options.processor_count = Some(p);
        }
        if let Some(b) = self.batch_size {
            options.batch_size = b;
        }
        if let Some(t) = self.chunk_timeout_ms {
            options.chunk_timeout_ms = t;
        }
        if let Some(m) = self.max_loss {
            options.max_lost_records = m;
        }
        options.validate().context("invalid options")?;
        Ok(options)
    }

    fn sink(&self) -> Result<Arc<dyn DocumentSink>> {
        Ok(match &self.output {
            Some(path) => Arc::new(JsonlSink::append(path)?),
            None => Arc::new(MemorySink::new()),
        })
    }
}

fn init_tracing(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

/// Ingest every input; returns whether all of them passed.
fn run(args: &CliArgs) -> Result<bool> {
    let options = args.options()?;
    let files = resolve_inputs(&args.inputs)?;
    let sink = args.sink()?;
    info!(
        "Ingesting {} file(s) with {} worker(s)",
        files.len(),
        options.processors()
    );

    let mut reports: Vec<IngestionReport> = Vec::with_capacity(files.len());
    let mut metrics = Map::new();
    let mut all_ok = true;
    for file in &files {
        let collector = MetricsCollector::new();
        let runner = Runner::new(options.clone()).with_metrics(collector.clone());
        match runner.run_report(file, Arc::clone(&sink)) {
            Ok(report) => {
                if !report.validation.ok {
                    error!(file = %file.display(), "{}", report.validation);
                    all_ok = false;
                }
                reports.push(report);
            }
            Err(e) => {
                error!(file = %file.display(), "ingestion failed: {e}");
                all_ok = false;
            }
        }
        metrics.insert(file.display().to_string(), collector.to_json());
    }

    if let Some(path) = &args.report {
        let text = serde_json::to_string_pretty(&reports).context("serialize reports")?;
        std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
    }
    if let Some(path) = &args.metrics {
        let text = serde_json::to_string_pretty(&Value::Object(metrics))
            .context("serialize metrics")?;
        std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
    }
    Ok(all_ok)
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(&args.log_level);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
