//! CLI binary for edition-ingest.
//!
//! A thin shim over the library crate that maps subcommands to
//! `Ingestor` / `HttpEditionsApi` calls and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edition_ingest::{
    split_to_dir, ApiConfig, ArchiveUpload, EditionForm, EditionsApi, HttpEditionsApi,
    IngestConfig, IngestProgressCallback, IngestReport, IngestState, Ingestor, ProgressCallback,
    DEFAULT_API_URL,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders the run's status line and percentage as a live bar, with one log
/// line per uploaded page.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_state_change(&self, state: &IngestState) {
        let prefix = match state {
            IngestState::CreatingEdition => "Creating".to_string(),
            IngestState::ReadingArchive => "Reading".to_string(),
            IngestState::Processing { spread, total } => {
                format!("Spread {}/{}", spread + 1, total)
            }
            IngestState::Finalizing => "Finishing".to_string(),
            IngestState::Done => "Done".to_string(),
            IngestState::Error => "Failed".to_string(),
            IngestState::Idle => "Preparing".to_string(),
        };
        self.bar.set_prefix(prefix);
        if *state == IngestState::Error {
            self.bar.abandon();
        }
    }

    fn on_status(&self, message: &str, percent: u8) {
        self.bar.set_position(percent as u64);
        self.bar.set_message(message.to_string());
    }

    fn on_page_uploaded(&self, page_number: u32, is_cover: bool) {
        self.bar.println(format!(
            "  {} Page {:>3}{}",
            green("✓"),
            page_number,
            if is_cover { dim("  cover") } else { String::new() }
        ));
    }

    fn on_ingest_complete(&self, report: &IngestReport) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages uploaded from {} spreads",
            green("✔"),
            bold(&report.pages_uploaded.to_string()),
            report.spreads
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Request a login link, then verify the token from the email
  edition-ingest login --email editor@example.com
  edition-ingest verify 3f9c…
  export EDITIONS_API_TOKEN=<token printed by verify>

  # Create an edition from a ZIP of spreads (01.png, 02.png, …)
  edition-ingest create --title "Spring 2024" --date 2024-03-01 spring.zip

  # Split locally without uploading, to check the crops
  edition-ingest split spring.zip -o pages/

  # List editions, inspect one, delete it
  edition-ingest list
  edition-ingest pages <EDITION_ID>
  edition-ingest delete <EDITION_ID> --yes

ARCHIVE LAYOUT:
  Images (.png, .jpg, .jpeg) are taken in filename order; zero-pad the
  numbers so 10.png sorts after 09.png. The first image is the cover and
  only its left half is kept. Every later image is a double spread and is
  cut into a left and a right page. N images give 2N − 1 pages.

ENVIRONMENT VARIABLES:
  EDITIONS_API_URL        Publishing API base URL (default http://localhost:8787)
  EDITIONS_API_TOKEN      Bearer token from `verify`
  EDITION_INGEST_QUALITY  JPEG quality for output pages (default 85)
  RUST_LOG                Override log filtering (e.g. edition_ingest=debug)
"#;

/// Split zipped magazine spreads into pages and publish them as an edition.
#[derive(Parser, Debug)]
#[command(
    name = "edition-ingest",
    version,
    about = "Split zipped magazine spreads into pages and publish them as an edition",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Publishing API base URL.
    #[arg(long, global = true, env = "EDITIONS_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Bearer token for the admin endpoints.
    #[arg(long, global = true, env = "EDITIONS_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Per-request timeout in seconds (default: none).
    #[arg(long, global = true, env = "EDITION_INGEST_TIMEOUT")]
    timeout: Option<u64>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "EDITION_INGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "EDITION_INGEST_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an edition and upload the pages cut from ARCHIVE.
    Create(CreateArgs),

    /// Cut ARCHIVE into page files locally, without contacting the API.
    Split {
        /// ZIP archive of spreads.
        archive: PathBuf,

        /// Directory to write page_N.jpg files into.
        #[arg(short, long)]
        output: PathBuf,

        /// JPEG quality (1–100).
        #[arg(long, env = "EDITION_INGEST_QUALITY", default_value_t = 85,
              value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: u8,

        /// Print the written pages as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List editions.
    List {
        #[arg(long)]
        json: bool,
    },

    /// List the pages stored for an edition.
    Pages {
        edition_id: String,

        #[arg(long)]
        json: bool,
    },

    /// Delete an edition and its pages.
    Delete {
        edition_id: String,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Email a one-time login link.
    Login {
        #[arg(long)]
        email: String,
    },

    /// Exchange a login-link token for a bearer token.
    Verify {
        /// The `token` query parameter from the login link.
        #[arg(value_name = "LINK_TOKEN")]
        link_token: String,
    },
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// ZIP archive of spreads.
    archive: PathBuf,

    /// Edition title.
    #[arg(long)]
    title: String,

    /// Publication date, YYYY-MM-DD.
    #[arg(long)]
    date: String,

    /// Optional description.
    #[arg(long, default_value = "")]
    description: String,

    /// JPEG quality (1–100).
    #[arg(long, env = "EDITION_INGEST_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Validate the archive before creating the edition record.
    #[arg(long, env = "EDITION_INGEST_PREFLIGHT")]
    preflight: bool,

    /// Pause after completion, in milliseconds.
    #[arg(long, env = "EDITION_INGEST_FINALIZE_DELAY_MS", default_value_t = 1000)]
    finalize_delay_ms: u64,

    /// Disable progress bar.
    #[arg(long, env = "EDITION_INGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Print the ingest report as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar is the feedback during `create`; keep INFO logs out
    // of its way unless asked for.
    let show_progress = matches!(
        &cli.command,
        Command::Create(args) if !cli.quiet && !args.no_progress && !args.json
    );
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Create(args) => run_create(&cli, args, show_progress).await,
        Command::Split {
            archive,
            output,
            quality,
            json,
        } => run_split(&cli, archive, output, *quality, *json).await,
        Command::List { json } => run_list(&cli, *json).await,
        Command::Pages { edition_id, json } => run_pages(&cli, edition_id, *json).await,
        Command::Delete { edition_id, yes } => run_delete(&cli, edition_id, *yes).await,
        Command::Login { email } => {
            let api = build_api(&cli)?;
            let message = api
                .request_magic_link(email)
                .await
                .context("Login request failed")?;
            if !cli.quiet {
                eprintln!("{} {}", green("✔"), message);
            }
            Ok(())
        }
        Command::Verify { link_token } => {
            let api = build_api(&cli)?;
            let session = api
                .verify_magic_link(link_token)
                .await
                .context("Login verification failed")?;
            if !cli.quiet {
                eprintln!(
                    "{} Logged in as {}",
                    green("✔"),
                    bold(&session.user.email)
                );
                eprintln!("   {}", dim("export EDITIONS_API_TOKEN=<token below>"));
            }
            println!("{}", session.token);
            Ok(())
        }
    }
}

fn build_api(cli: &Cli) -> Result<HttpEditionsApi> {
    let mut config = ApiConfig::new(&cli.api_url);
    if let Some(ref token) = cli.token {
        config = config.with_token(token);
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout_secs(secs);
    }
    HttpEditionsApi::new(&config).context("Invalid API configuration")
}

async fn run_create(cli: &Cli, args: &CreateArgs, show_progress: bool) -> Result<()> {
    let api = build_api(cli)?;

    let mut builder = IngestConfig::builder()
        .quality(args.quality)
        .finalize_delay_ms(args.finalize_delay_ms)
        .preflight_archive(args.preflight);
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let archive = ArchiveUpload::from_path(&args.archive).await?;
    let form = EditionForm {
        title: args.title.clone(),
        description: args.description.clone(),
        date: args.date.clone(),
        archive: Some(archive),
    };

    let ingestor = Ingestor::new(Arc::new(api), config);
    if !cli.quiet {
        eprintln!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Publishing '{}' from {}", form.title.trim(), args.archive.display()))
        );
    }

    let report = ingestor.ingest(&form).await.map_err(|e| {
        if !cli.quiet && !show_progress {
            eprintln!("{} {}", red("✘"), red(&format!("Error: {e}")));
        }
        e
    })?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else {
        println!("{}", report.edition_id);
        if !cli.quiet && !show_progress {
            eprintln!(
                "Uploaded {} pages from {} spreads in {}ms",
                report.pages_uploaded, report.spreads, report.duration_ms
            );
        }
    }
    Ok(())
}

async fn run_split(
    cli: &Cli,
    archive: &Path,
    output: &Path,
    quality: u8,
    json: bool,
) -> Result<()> {
    let config = IngestConfig::builder()
        .quality(quality)
        .build()
        .context("Invalid configuration")?;
    let upload = ArchiveUpload::from_path(archive).await?;
    let pages = split_to_dir(&upload, output, &config)
        .await
        .context("Split failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&pages).context("Failed to serialise pages")?
        );
        return Ok(());
    }

    if !cli.quiet {
        for page in &pages {
            eprintln!(
                "  {} {:<14} {:>5}x{:<5} {}  {}",
                green("✓"),
                page.path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                page.width,
                page.height,
                dim(&format!("{:>8} bytes", page.bytes)),
                dim(&page.source),
            );
        }
        eprintln!(
            "{} {} pages  →  {}",
            green("✔"),
            bold(&pages.len().to_string()),
            bold(&output.display().to_string())
        );
    }
    Ok(())
}

async fn run_list(cli: &Cli, json: bool) -> Result<()> {
    let api = build_api(cli)?;
    let editions = api
        .list_editions()
        .await
        .context("Failed to list editions")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&editions).context("Failed to serialise editions")?
        );
        return Ok(());
    }

    if editions.is_empty() {
        eprintln!("{}", dim("No editions yet."));
        return Ok(());
    }
    for e in &editions {
        println!(
            "{:<38} {:<10} {} {}",
            e.id,
            e.date.as_deref().unwrap_or("-"),
            if e.published { green("published") } else { dim("draft    ") },
            e.title
        );
    }
    Ok(())
}

async fn run_pages(cli: &Cli, edition_id: &str, json: bool) -> Result<()> {
    let api = build_api(cli)?;
    let pages = api
        .list_pages(edition_id)
        .await
        .with_context(|| format!("Failed to list pages of edition {edition_id}"))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&pages).context("Failed to serialise pages")?
        );
        return Ok(());
    }
    for p in &pages {
        println!("{:>4}  {}", p.number, p.image_url);
    }
    if !cli.quiet {
        eprintln!("{}", dim(&format!("{} pages", pages.len())));
    }
    Ok(())
}

async fn run_delete(cli: &Cli, edition_id: &str, yes: bool) -> Result<()> {
    if !yes && !confirm(&format!("Delete edition {edition_id} and all its pages?"))? {
        eprintln!("{}", dim("Aborted."));
        return Ok(());
    }
    let api = build_api(cli)?;
    api.delete_edition(edition_id)
        .await
        .with_context(|| format!("Failed to delete edition {edition_id}"))?;
    if !cli.quiet {
        eprintln!("{} Deleted {}", green("✔"), edition_id);
    }
    Ok(())
}

/// Ask a yes/no question on stderr; anything but `y`/`yes` is a no.
fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush().ok();
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
