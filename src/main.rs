use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use job_lens::core::ConfigManager;
use job_lens::credit_cli::{handle_credit_command, CreditArgs};
use job_lens::events::{EventSink, PipelineEvent};
use job_lens::scraping::{export_csv, ScrapeOrchestrator, ScrapeOutcome};
use job_lens::web::start_web_server;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const DEFAULT_PORT: u16 = 8000;

#[derive(Parser)]
#[command(name = "joblens")]
#[command(about = "Job search scraping and resume tailoring assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Scrape job listings once and print a summary
    Scrape {
        #[arg(long)]
        title: String,
        #[arg(long)]
        location: String,
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// Write the job table to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Inspect and edit the credit ledger
    Credits(CreditArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigManager::load()?;
    init_tracing(config.environment.log_file.as_deref())?;
    config.log_summary();

    match cli.command {
        Command::Serve => {
            let port = match std::env::var("ROCKET_PORT") {
                Ok(raw) => raw
                    .parse::<u16>()
                    .map_err(|_| anyhow::anyhow!("ROCKET_PORT must be a valid port number"))?,
                Err(_) => DEFAULT_PORT,
            };
            start_web_server(config, port).await
        }
        Command::Scrape {
            title,
            location,
            pages,
            csv,
        } => run_scrape(&config, &title, &location, pages, csv.as_deref()).await,
        Command::Credits(args) => {
            handle_credit_command(
                args,
                &config.environment.database_path,
                &config.environment.credits,
            )
            .await
        }
    }
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("job_lens=info,joblens=info,rocket::server=off"));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true) // Clear file on startup
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(Mutex::new(file))
                    .with_current_span(false)
                    .with_span_list(false)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    Ok(())
}

async fn run_scrape(
    config: &ConfigManager,
    title: &str,
    location: &str,
    pages: u32,
    csv_path: Option<&Path>,
) -> Result<()> {
    let scrape = &config.environment.scrape;
    anyhow::ensure!(
        (1..=scrape.max_pages).contains(&pages),
        "--pages must be between 1 and {}",
        scrape.max_pages
    );

    let orchestrator = ScrapeOrchestrator::new(scrape)?;
    let (sink, mut rx) = EventSink::channel();

    let reporter = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::Progress { fraction, message } => {
                    info!(progress = format!("{:.0}%", fraction * 100.0), "{}", message)
                }
                PipelineEvent::Warning { message } => warn!("{}", message),
                PipelineEvent::JobResult(_) => {}
            }
        }
    });

    let outcome = orchestrator.run(title, location, pages, &sink).await;
    drop(sink);
    let _ = reporter.await;

    let ScrapeOutcome::Jobs { jobs, expected, .. } = outcome else {
        println!("Scraping did not return any data. Please try different keywords.");
        return Ok(());
    };

    println!("Found {} of {} jobs", jobs.len(), expected);
    println!(
        "{:<12} {:<40} {:<30} {:>8} {:>10}",
        "Job ID", "Title", "Company", "Hours", "Applicants"
    );
    println!("{}", "-".repeat(104));
    for job in &jobs {
        println!(
            "{:<12} {:<40.40} {:<30.30} {:>8} {:>10}",
            job.job_id,
            job.job_title,
            job.company_name,
            job.hours_posted
                .map_or_else(|| "-".to_string(), |h| h.to_string()),
            job.applicants_count
                .map_or_else(|| "-".to_string(), |n| n.to_string()),
        );
    }

    if let Some(path) = csv_path {
        let bytes = export_csv(&jobs)?;
        tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("✅ Wrote {} rows to {}", jobs.len(), path.display());
    }

    Ok(())
}
