//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use pdfkb_core::merge::{MergeOptions, merge_to_file};
use pdfkb_core::pipeline::{BuildConfig, BuildFileConfig, FileOutcome, ProgressReporter, build_file};
use pdfkb_core::search::search;
use pdfkb_extract::PdfExtractor;
use pdfkb_shared::{
    AppConfig, ExtractMode, PdfKbError, init_config, load_config, load_config_from,
};

/// Exit status when at least one document produced no knowledge base.
const EXIT_INCOMPLETE: u8 = 2;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// pdfkb: PDF documents to embedding knowledge bases.
#[derive(Parser)]
#[command(
    name = "pdfkb",
    version,
    about = "Turn PDF documents into JSON knowledge bases of text fragments and embeddings.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.pdfkb/pdfkb.toml.
    #[arg(long, global = true, env = "PDFKB_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build a knowledge base from one or more PDFs.
    Build {
        /// PDF files to process.
        #[arg(required = true)]
        pdfs: Vec<PathBuf>,

        /// Output file (single PDF only).
        #[arg(short, long, conflicts_with = "out_dir")]
        out: Option<PathBuf>,

        /// Directory for `<name>_kb.json` outputs (defaults to the current directory).
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Sanitize and segment each page separately.
        #[arg(long)]
        pages: bool,

        /// Round vector components to save space.
        #[arg(long)]
        lite: bool,

        /// Decimal digits kept in lite mode.
        #[arg(long, requires = "lite")]
        precision: Option<u32>,

        /// Embedding model name.
        #[arg(short, long)]
        model: Option<String>,

        /// Minimum fragment length in characters.
        #[arg(long)]
        min_chars: Option<usize>,

        /// Minimum real words per fragment.
        #[arg(long)]
        min_words: Option<usize>,
    },

    /// Merge knowledge-base files into one.
    Merge {
        /// Knowledge-base JSON files, in output order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Merged output file.
        #[arg(short, long, default_value = "combo_kb.json")]
        out: PathBuf,

        /// Write an empty array if every input is empty.
        #[arg(long)]
        allow_empty: bool,

        /// Fail if vector lengths differ across records.
        #[arg(long)]
        strict_dims: bool,
    },

    /// Query a knowledge base.
    Search {
        /// Knowledge-base JSON file.
        #[arg(long)]
        kb: PathBuf,

        /// Number of results.
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Embedding model name (must match the one used to build the KB).
        #[arg(short, long)]
        model: Option<String>,

        /// Query text.
        query: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pdfkb=info",
        1 => "pdfkb=debug",
        _ => "pdfkb=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so search results on stdout stay pipeable.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Build {
            pdfs,
            out,
            out_dir,
            pages,
            lite,
            precision,
            model,
            min_chars,
            min_words,
        } => {
            let mut config = resolve_config(config_path)?;
            if pages {
                config.extract.mode = ExtractMode::Pages;
            }
            if lite {
                config.embedding.lite = true;
            }
            if let Some(digits) = precision {
                config.embedding.lite_precision = digits;
            }
            if let Some(model) = model {
                config.embedding.model = model;
            }
            if let Some(n) = min_chars {
                config.segment.min_chars = n;
            }
            if let Some(n) = min_words {
                config.segment.min_words = n;
            }
            config.validate()?;
            cmd_build(&config, &pdfs, out.as_deref(), out_dir.as_deref())
        }
        Command::Merge {
            inputs,
            out,
            allow_empty,
            strict_dims,
        } => {
            let config = resolve_config(config_path)?;
            let mut options = MergeOptions::from(&config.merge);
            options.allow_empty |= allow_empty;
            options.require_consistent_dimensions |= strict_dims;
            cmd_merge(&inputs, &out, &options)
        }
        Command::Search {
            kb,
            top_k,
            model,
            query,
        } => {
            let mut config = resolve_config(config_path)?;
            if let Some(model) = model {
                config.embedding.model = model;
            }
            if let Some(k) = top_k {
                config.search.top_k = k;
            }
            config.validate()?;
            cmd_search(&config, &kb, &query)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

fn cmd_build(
    config: &AppConfig,
    pdfs: &[PathBuf],
    out: Option<&Path>,
    out_dir: Option<&Path>,
) -> Result<ExitCode> {
    if out.is_some() && pdfs.len() > 1 {
        return Err(eyre!("--out takes a single PDF; use --out-dir for several"));
    }

    // Load the model before touching any document.
    let embedder = pdfkb_embed::load_model(&config.embedding)?;

    let out_dir = out_dir.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let build = BuildConfig::from(config);
    let extractor = PdfExtractor;
    let mut skipped = 0;

    for pdf in pdfs {
        let output_path = out
            .map(Path::to_path_buf)
            .unwrap_or_else(|| out_dir.join(default_output_name(pdf)));

        let file_config = BuildFileConfig {
            pdf_path: pdf.clone(),
            output_path,
            mode: config.extract.mode,
            build: build.clone(),
        };

        info!(pdf = %pdf.display(), mode = %config.extract.mode, "building knowledge base");

        let reporter = CliProgress::new();
        let outcome = build_file(&file_config, &extractor, &embedder, &reporter);
        drop(reporter);

        match outcome {
            Ok(FileOutcome::Written {
                path,
                records,
                elapsed,
            }) => {
                println!();
                println!("  Knowledge base created!");
                println!("  Source:    {}", pdf.display());
                println!("  Output:    {}", path.display());
                println!("  Fragments: {records}");
                println!("  Time:      {:.1}s", elapsed.as_secs_f64());
                println!();
            }
            Ok(FileOutcome::NoUsableContent(reason)) => {
                skipped += 1;
                eprintln!("  No usable content in {} ({reason}); nothing written.", pdf.display());
            }
            Err(e @ PdfKbError::Extraction { .. }) => {
                skipped += 1;
                error!(error = %e, "skipping document");
                eprintln!("  Could not read {}: {e}", pdf.display());
            }
            Err(e) => return Err(e.into()),
        }
    }

    if skipped > 0 {
        return Ok(ExitCode::from(EXIT_INCOMPLETE));
    }
    Ok(ExitCode::SUCCESS)
}

/// `<stem>_kb.json` for a PDF path.
fn default_output_name(pdf: &Path) -> String {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pdf".to_string());
    format!("{stem}_kb.json")
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter: a spinner for phases, a bar while embedding.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn fragments_embedded(&self, done: usize, total: usize) {
        let total = total as u64;
        if self.bar.length() != Some(total) {
            self.bar.set_length(total);
            self.bar.set_style(
                ProgressStyle::with_template("Encoding {bar:20.cyan/blue} {pos}/{len} chunks [{elapsed}<{eta}]")
                    .expect("valid template"),
            );
        }
        self.bar.set_position(done as u64);
    }

    fn done(&self, _records: usize) {
        self.bar.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

fn cmd_merge(inputs: &[PathBuf], out: &Path, options: &MergeOptions) -> Result<ExitCode> {
    info!(inputs = inputs.len(), out = %out.display(), "merging knowledge bases");

    let summary = merge_to_file(inputs, out, options)?;

    println!();
    println!(
        "  Combined {} files -> {}",
        summary.inputs,
        summary.output.display()
    );
    println!("  Total entries: {}", summary.records);
    println!();

    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

fn cmd_search(config: &AppConfig, kb_path: &Path, query: &str) -> Result<ExitCode> {
    let kb = pdfkb_storage::read_kb(kb_path)?;

    // Queries are compared at full precision even against lite knowledge bases.
    let mut embedding = config.embedding.clone();
    embedding.lite = false;
    let embedder = pdfkb_embed::load_model(&embedding)?;

    let query_vector = embedder.embed(query)?;
    let hits = search(&kb, &query_vector, config.search.top_k);

    if hits.is_empty() {
        println!("No results.");
        return Ok(ExitCode::SUCCESS);
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!("{:>3}. [{:.4}] {}", rank + 1, hit.score, hit.id);
        println!("     {}", hit.text);
    }

    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<ExitCode> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_show(path: Option<&Path>) -> Result<ExitCode> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn default_output_name_uses_stem() {
        assert_eq!(default_output_name(Path::new("/a/Deep Work.pdf")), "Deep Work_kb.json");
        assert_eq!(default_output_name(Path::new("notes")), "notes_kb.json");
    }

    #[test]
    fn build_flags_parse() {
        let cli = Cli::try_parse_from([
            "pdfkb", "build", "a.pdf", "b.pdf", "--out-dir", "kbs", "--pages", "--lite",
            "--precision", "3",
        ])
        .unwrap();
        match cli.command {
            Command::Build {
                pdfs,
                out_dir,
                pages,
                lite,
                precision,
                ..
            } => {
                assert_eq!(pdfs.len(), 2);
                assert_eq!(out_dir, Some(PathBuf::from("kbs")));
                assert!(pages);
                assert!(lite);
                assert_eq!(precision, Some(3));
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn precision_requires_lite() {
        assert!(Cli::try_parse_from(["pdfkb", "build", "a.pdf", "--precision", "3"]).is_err());
    }

    #[test]
    fn merge_defaults_output_name() {
        let cli = Cli::try_parse_from(["pdfkb", "merge", "a.json", "b.json"]).unwrap();
        match cli.command {
            Command::Merge { inputs, out, .. } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(out, PathBuf::from("combo_kb.json"));
            }
            _ => panic!("expected merge"),
        }
    }

    #[test]
    fn merge_requires_inputs() {
        assert!(Cli::try_parse_from(["pdfkb", "merge"]).is_err());
    }
}
