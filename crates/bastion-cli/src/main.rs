mod files;
mod report;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use url::Url;

use bastion_client::{ReqwestRedirectFollower, ServiceExtractor};
use bastion_core::backoff::BackoffPolicy;
use bastion_core::batch::{BatchJob, BatchOrchestrator};
use bastion_core::blocklist::DomainBlocklist;
use bastion_core::models::FetchRequest;
use bastion_core::redirect::{RedirectResolver, decode_google_redirect};
use bastion_core::report::TracingReporter;
use bastion_core::retry::RetryOrchestrator;
use bastion_core::util::parse_http_url;

#[derive(Parser)]
#[command(name = "bastion", version, about = "Resilient fetch orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FetchArgs {
    /// Extraction service endpoint
    #[arg(short, long, env = "PARSER_API_URL")]
    extractor_url: String,

    /// Total attempts per URL
    #[arg(short, long, env = "MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-attempt timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Upper bound on a single backoff wait, in seconds
    #[arg(long, default_value_t = 60)]
    max_backoff_secs: u64,

    /// Start with certificate verification disabled
    #[arg(long, default_value_t = false)]
    skip_ssl: bool,

    /// Domains never sent to the extraction service (comma-separated)
    #[arg(long, env = "BLOCKED_DOMAINS", value_delimiter = ',')]
    blocked_domains: Vec<String>,
}

impl FetchArgs {
    fn orchestrator(&self) -> Result<RetryOrchestrator<ServiceExtractor>> {
        if self.timeout_secs == 0 {
            bail!("--timeout-secs must be at least 1");
        }
        if self.max_backoff_secs == 0 {
            bail!("--max-backoff-secs must be at least 1");
        }
        let endpoint = parse_http_url(&self.extractor_url)
            .with_context(|| format!("Invalid extractor URL: {}", self.extractor_url))?;
        let extractor = ServiceExtractor::new(endpoint)?;
        let policy =
            BackoffPolicy::default().with_max_delay(Duration::from_secs(self.max_backoff_secs));

        Ok(RetryOrchestrator::new(extractor)
            .with_policy(policy)
            .with_blocklist(DomainBlocklist::new(&self.blocked_domains)))
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every URL of a JSON input file, one at a time
    Batch {
        /// JSON array of `{"url": ..., "id": ...}` records
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the results array
        #[arg(short, long, default_value = "results.json")]
        output: PathBuf,

        /// Pause between consecutive items, in milliseconds
        #[arg(short, long, env = "DELAY_MS", default_value_t = 2000)]
        delay_ms: u64,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Fetch a single URL and print the outcome
    Parse {
        /// Target URL
        #[arg(short, long)]
        url: String,

        /// Extra request header, `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Follow redirects and print the final URL
    Resolve {
        /// URL to resolve
        #[arg(short, long)]
        url: String,

        /// Send a plain client User-Agent instead of a browser identity
        #[arg(long, default_value_t = false)]
        plain: bool,

        /// Total attempts
        #[arg(long, default_value_t = 1)]
        max_attempts: u32,

        /// Timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Start with certificate verification disabled
        #[arg(long, default_value_t = false)]
        skip_ssl: bool,

        /// Permit redirects into private or loopback addresses
        #[arg(long, default_value_t = false)]
        allow_private_urls: bool,
    },

    /// Unwrap a Google redirect link without any network call
    Decode {
        /// Google (or any) URL
        #[arg(short, long)]
        url: String,
    },

    /// Turn a batch results file into a CSV summary
    Report {
        /// Results file written by `bastion batch`
        #[arg(short, long)]
        input: PathBuf,

        /// CSV output path
        #[arg(short, long, default_value = "report.csv")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bastion=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Batch {
            input,
            output,
            delay_ms,
            fetch,
        } => cmd_batch(&input, &output, Duration::from_millis(delay_ms), &fetch).await?,
        Commands::Parse {
            url,
            headers,
            fetch,
        } => cmd_parse(&url, &headers, &fetch).await?,
        Commands::Resolve {
            url,
            plain,
            max_attempts,
            timeout_secs,
            skip_ssl,
            allow_private_urls,
        } => {
            let mut follower =
                ReqwestRedirectFollower::with_timeout(Duration::from_secs(timeout_secs))?;
            if allow_private_urls {
                follower = follower.allow_private_urls();
            }
            let resolver = RedirectResolver::new(follower)
                .with_max_attempts(max_attempts)
                .with_timeout(Duration::from_secs(timeout_secs));
            cmd_resolve(&url, &resolver, !plain, skip_ssl).await?;
        }
        Commands::Decode { url } => cmd_decode(&url)?,
        Commands::Report { input, output } => cmd_report(&input, &output)?,
    }

    Ok(())
}

async fn cmd_batch(input: &Path, output: &Path, delay: Duration, fetch: &FetchArgs) -> Result<()> {
    let items = files::read_batch_items(input)?;
    tracing::info!(items = items.len(), input = %input.display(), "Loaded batch");

    let job = BatchJob::new(items)
        .with_delay(delay)
        .with_max_retries(fetch.max_retries)
        .with_timeout(fetch.timeout())
        .with_insecure_tls(fetch.skip_ssl);

    let report = BatchOrchestrator::new(fetch.orchestrator()?)
        .run(job, &TracingReporter)
        .await;

    let failed_path = files::write_batch_outputs(output, &report)?;

    tracing::info!(
        total = report.stats.total,
        succeeded = report.stats.succeeded,
        failed = report.stats.failed,
        success_rate = %format!("{:.1}%", report.stats.success_rate),
        output = %output.display(),
        "Batch complete"
    );
    if let Some(path) = failed_path {
        tracing::warn!(path = %path.display(), "Failed items written");
    }

    Ok(())
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("Header must look like `Name: value`, got {raw:?}");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Header name is empty in {raw:?}");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

async fn cmd_parse(url: &str, headers: &[String], fetch: &FetchArgs) -> Result<()> {
    let mut request = FetchRequest::new(url)?
        .with_max_retries(fetch.max_retries)
        .with_timeout(fetch.timeout())
        .with_insecure_tls(fetch.skip_ssl);
    for raw in headers {
        let (name, value) = parse_header(raw)?;
        request = request.with_header(name, value);
    }

    let outcome = fetch.orchestrator()?.execute(request, &TracingReporter).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.success {
        bail!(
            "Giving up on {url} after {} attempt(s)",
            outcome.attempts_made
        );
    }
    Ok(())
}

async fn cmd_resolve(
    raw: &str,
    resolver: &RedirectResolver<ReqwestRedirectFollower>,
    enhanced_identity: bool,
    skip_ssl: bool,
) -> Result<()> {
    let url = parse_http_url(raw)?;
    let resolved = resolver.resolve(&url, enhanced_identity, skip_ssl).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "original_url": resolved.original_url.as_str(),
            "final_url": resolved.final_url.as_str(),
            "status_code": resolved.status_code,
            "changed": resolved.changed(),
        }))?
    );
    Ok(())
}

fn decode_json(raw: &str) -> Result<serde_json::Value> {
    let url: Url = parse_http_url(raw)?;
    let decoded = decode_google_redirect(&url);

    Ok(json!({
        "original_url": url.as_str(),
        "decoded_url": decoded.as_str(),
        "changed": decoded != url,
    }))
}

fn cmd_decode(raw: &str) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&decode_json(raw)?)?);
    Ok(())
}

fn cmd_report(input: &Path, output: &Path) -> Result<()> {
    let records: Vec<report::ResultRecord> = files::read_json_array(input)?;
    let rows = report::write_report(records, output)?;
    tracing::info!(rows, output = %output.display(), "Report written");
    Ok(())
}
