mod browserless;
mod delay;
mod error;
mod filter;
mod normalize;
mod paginate;
mod pipeline;
mod quotes;
mod record;
mod reveal;
mod settings;
mod sink;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use browserless::BrowserlessSession;
use delay::{FixedDelay, JitterDelay};
use paginate::Paginator;
use pipeline::RunReport;
use quotes::QuotesApi;
use reveal::{Collector, RevealMode};
use settings::Settings;

#[derive(Parser)]
#[command(name = "harvest", about = "Paginated-API and lazy-DOM scrapers writing CSV")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Page through the quotes JSON API
    Quotes {
        /// Output CSV (default: <output_dir>/quotes_hidden_api.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Stop after this many pages (0 = no cap)
        #[arg(long)]
        max_pages: Option<u32>,
    },
    /// Scroll a listing page through Browserless and collect product tiles
    Tiles {
        /// Listing page to open
        #[arg(long)]
        url: Option<String>,
        /// Output CSV (default: <output_dir>/lazada_jfy.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of scroll steps before the final extraction
        #[arg(short = 'n', long)]
        scrolls: Option<u32>,
        /// Extract after every scroll, not only the last one
        #[arg(long)]
        every_pass: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;

    let report = match cli.command {
        Commands::Quotes { output, max_pages } => {
            if let Some(n) = max_pages {
                settings.max_pages = n;
            }
            let out = output.unwrap_or_else(|| settings.output_dir.join("quotes_hidden_api.csv"));
            let source = QuotesApi::new(
                &settings.quotes_url,
                &settings.user_agent,
                settings.request_timeout(),
            )?;
            let paginator = Paginator::new(Box::new(FixedDelay), settings.page_delay())
                .max_pages(settings.page_cap());

            let pb = spinner(format!("paging {}", settings.quotes_url));
            let result = pipeline::quotes_to_csv(&paginator, &source, &out).await;
            pb.finish_and_clear();
            result?
        }
        Commands::Tiles {
            url,
            output,
            scrolls,
            every_pass,
        } => {
            let url = url.unwrap_or_else(|| settings.tiles_url.clone());
            let out = output.unwrap_or_else(|| settings.output_dir.join("lazada_jfy.csv"));

            let mut collector = Collector::new(
                Box::new(JitterDelay::new(settings.reveal_jitter())),
                scrolls.unwrap_or(settings.max_scrolls),
            );
            collector.nav_timeout = settings.nav_timeout();
            collector.selector_timeout = settings.selector_timeout();
            collector.reveal_pause = settings.reveal_pause();
            if every_pass {
                collector.mode = RevealMode::EveryPass;
            }

            let session = BrowserlessSession::new(
                &settings.browserless_url,
                settings.browserless_token.as_deref(),
            )?
            .scroll_step(settings.scroll_step_px)
            .settle(settings.settle());

            let pb = spinner(format!("rendering {url}"));
            let result = pipeline::tiles_to_csv(&collector, session, &url, &out).await;
            pb.finish_and_clear();
            result?
        }
    };

    print_report(&report, t0.elapsed());
    Ok(())
}

fn spinner(msg: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn print_report(report: &RunReport, elapsed: Duration) {
    if report.no_content_found {
        println!("No items were found on the page. Try a longer selector timeout or another URL.");
        return;
    }

    println!(
        "Collected {} records -> {} rows ({} dropped, {} duplicates)",
        report.raw, report.rows, report.dropped, report.duplicates
    );
    if report.pages > 0 {
        println!("Pages:   {}", report.pages);
    }
    if report.reveals > 0 {
        println!("Reveals: {}", report.reveals);
    }
    if let Some(ref path) = report.output {
        println!("Saved to {}", path.display());
    }
    println!(
        "Started {} | done in {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        format_duration(elapsed)
    );
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
