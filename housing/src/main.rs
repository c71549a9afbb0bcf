//! Housing CLI - normalize and geocode real-price registration exports
//!
//! # Main Commands
//!
//! ```bash
//! housing parse --dir 2017Q3 --cache-file geocode.jsonl > transactions.jsonl
//! housing addresses --dir 2017Q3               # Addresses that would be geocoded
//! housing validate transactions.jsonl          # Check output against the schema
//! ```
//!
//! # Message Store Commands
//!
//! ```bash
//! housing publish --input transactions.jsonl [--offset N] [--seed S]
//! housing export > messages.jsonl
//! housing reindex --input messages.jsonl [--seed S]
//! ```
//!
//! Records go to stdout, logs to stderr. `RUST_LOG` overrides the log filter.

use clap::{Args, Parser, Subcommand};
use housing::publish::{publish_lines, reindex_lines, DEFAULT_HOST};
use housing::{
    addresses_in_files, source_files, validate_lines, GeocodeCache, Geocoder, GoogleGeocoder,
    MessageStoreClient, Pipeline, PipelineError, RowErrorPolicy, ScanOptions, DEFAULT_PRECISION_METERS,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "housing")]
#[command(about = "Normalize and geocode real-price registration records", long_about = None)]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where registry files come from.
#[derive(Args)]
struct SourceArgs {
    /// Release directory; every region/category file is scanned in table order
    #[arg(long, conflicts_with = "files", required_unless_present = "files")]
    dir: Option<PathBuf>,

    /// Explicit registry files, scanned in the order given
    #[arg(long = "file", num_args = 1..)]
    files: Vec<PathBuf>,

    /// Log and skip missing files instead of failing
    #[arg(long)]
    skip_missing: bool,
}

impl SourceArgs {
    fn paths(&self) -> Vec<PathBuf> {
        match &self.dir {
            Some(dir) => source_files(dir).into_iter().map(|f| f.path).collect(),
            None => self.files.clone(),
        }
    }
}

#[derive(Args)]
struct StoreArgs {
    /// Message store user token
    #[arg(long, env = "MESSAGE_STORE_TOKEN", hide_env_values = true)]
    token: String,

    /// Message store base URL
    #[arg(long, env = "MESSAGE_STORE_HOST", default_value = DEFAULT_HOST)]
    host: String,
}

impl StoreArgs {
    fn client(&self) -> MessageStoreClient {
        MessageStoreClient::new(&self.token).with_host(&self.host)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, filter and geocode registry files; one JSON transaction per line
    Parse {
        #[command(flatten)]
        source: SourceArgs,

        /// Geocode cache to seed from (JSON lines of Addr/Lat/Lng/Precision)
        #[arg(long)]
        cache_file: Option<PathBuf>,

        /// Append addresses resolved by this run to the cache file
        #[arg(long, requires = "cache_file")]
        append_cache: bool,

        /// Geocoding API key
        #[arg(long, env = "GEOCODING_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Cached entries are used only when their precision is below this (meters)
        #[arg(long, default_value_t = DEFAULT_PRECISION_METERS)]
        precision_meters: f64,

        /// Rows of a file geocoded concurrently
        #[arg(long, default_value = "1")]
        concurrency: usize,

        /// Log and count failing rows instead of aborting
        #[arg(long)]
        keep_going: bool,
    },

    /// Print the address of every row that passes the row filter
    Addresses {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Validate a JSON-lines transaction file against the embedded schema
    Validate {
        /// Input JSON-lines file
        input: PathBuf,
    },

    /// Publish transactions to the message store
    Publish {
        #[command(flatten)]
        store: StoreArgs,

        /// JSON-lines transaction file
        #[arg(long)]
        input: PathBuf,

        /// Skip this many lines (resume an interrupted run)
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Seed for sort key jitter
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// List every message of the token's app as JSON lines
    Export {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Recompute sort keys of exported messages
    Reindex {
        #[command(flatten)]
        store: StoreArgs,

        /// JSON-lines message file produced by `export`
        #[arg(long)]
        input: PathBuf,

        /// Seed for sort key jitter
        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match cli.command {
        Commands::Parse {
            source,
            cache_file,
            append_cache,
            api_key,
            precision_meters,
            concurrency,
            keep_going,
        } => {
            let options = ScanOptions {
                concurrency,
                on_row_error: if keep_going { RowErrorPolicy::Skip } else { RowErrorPolicy::Abort },
                skip_missing_files: source.skip_missing,
            };
            cmd_parse(
                &source,
                cache_file.as_deref(),
                append_cache,
                api_key,
                precision_meters,
                options,
            )
            .await
        }

        Commands::Addresses { source } => cmd_addresses(&source).await,

        Commands::Validate { input } => cmd_validate(&input),

        Commands::Publish {
            store,
            input,
            offset,
            seed,
        } => cmd_publish(&store, &input, offset, seed).await,

        Commands::Export { store } => cmd_export(&store).await,

        Commands::Reindex { store, input, seed } => cmd_reindex(&store, &input, seed).await,
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("housing={}", level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

async fn cmd_parse(
    source: &SourceArgs,
    cache_file: Option<&Path>,
    append_cache: bool,
    api_key: Option<String>,
    precision_meters: f64,
    options: ScanOptions,
) -> CliResult {
    let cache = match cache_file {
        Some(path) => GeocodeCache::load(path)?,
        None => GeocodeCache::new(),
    };

    let api_key = api_key.unwrap_or_else(|| {
        warn!("no geocoding API key; only cached addresses will resolve");
        String::new()
    });
    let geocoder = Geocoder::new(GoogleGeocoder::new(api_key), precision_meters);
    let pipeline = Pipeline::new(geocoder, cache).with_options(options);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = pipeline
        .scan_files(&source.paths(), &mut |ts| {
            serde_json::to_writer(&mut out, &ts)?;
            out.write_all(b"\n").map_err(PipelineError::Output)
        })
        .await;
    out.flush()?;

    // Resolutions are worth keeping even when the scan stopped early.
    if let (true, Some(path)) = (append_cache, cache_file) {
        pipeline.cache().append_resolved(path)?;
    }

    let stats = result?;
    stats.log();
    Ok(())
}

async fn cmd_addresses(source: &SourceArgs) -> CliResult {
    let addresses = addresses_in_files(&source.paths(), source.skip_missing).await?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for address in &addresses {
        writeln!(out, "{}", address)?;
    }
    out.flush()?;

    info!(count = addresses.len(), "listed addresses");
    Ok(())
}

fn cmd_validate(input: &Path) -> CliResult {
    info!(path = %input.display(), "validating");

    let report = validate_lines(BufReader::new(File::open(input)?))?;
    for (line, errors) in report.invalid.iter().take(5) {
        error!(line, "invalid record");
        for err in errors.iter().take(3) {
            error!("  - {}", err);
        }
    }

    info!(
        valid = report.lines - report.invalid.len(),
        invalid = report.invalid.len(),
        "validation finished"
    );

    if !report.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_publish(store: &StoreArgs, input: &Path, offset: usize, seed: u64) -> CliResult {
    let client = store.client();
    let mut rng = StdRng::seed_from_u64(seed);

    let reader = BufReader::new(File::open(input)?);
    let summary = publish_lines(&client, reader, offset, &mut rng).await?;
    info!(published = summary.processed, skipped = summary.skipped, "publish finished");
    Ok(())
}

async fn cmd_export(store: &StoreArgs) -> CliResult {
    let client = store.client();
    let me = client.me().await?;
    info!(app = %me.app.id, user = %me.user.id, "exporting messages");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let total = client
        .scan_all_partitions(&me.app.id, &mut |msg| {
            serde_json::to_writer(&mut out, &msg)?;
            out.write_all(b"\n")?;
            Ok(())
        })
        .await?;
    out.flush()?;

    info!(total, "export finished");
    Ok(())
}

async fn cmd_reindex(store: &StoreArgs, input: &Path, seed: u64) -> CliResult {
    let client = store.client();
    let mut rng = StdRng::seed_from_u64(seed);

    let reader = BufReader::new(File::open(input)?);
    let summary = reindex_lines(&client, reader, &mut rng).await?;
    info!(updated = summary.processed, "reindex finished");
    Ok(())
}
