use std::io::{self, Write};
use std::path::Path;
use std::process;

use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use pagepress::capture::run_capture;
use pagepress::progress::LogProgress;
use pagepress::remote::ReaderSession;
use pagepress::settings::Settings;
use pagepress::store::{self, FrameStore};
use pagepress::{assembly, PipelineError};

const SETTINGS_FILE: &str = "pagepress.json";

const USAGE: &str = "\
Usage: pagepress <command> [args]

Commands:
  capture [book]    capture the open book page by page, then build its PDF
  assemble [book]   build the PDF for an already captured book
  list              show captured books
  clean             delete all captured screenshots
";

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = run(&args).await {
        error!("{err:#}");
        process::exit(1);
    }
}

async fn run(args: &[String]) -> Result<()> {
    let settings = Settings::load(Path::new(SETTINGS_FILE))?;
    match args.first().map(String::as_str) {
        Some("capture") => capture_cmd(&settings, args.get(1).cloned()).await,
        Some("assemble") => assemble_cmd(&settings, args.get(1).cloned()),
        Some("list") => list_cmd(&settings),
        Some("clean") => clean_cmd(&settings),
        _ => {
            eprint!("{USAGE}");
            process::exit(2)
        }
    }
}

async fn capture_cmd(settings: &Settings, book: Option<String>) -> Result<()> {
    let book = match book {
        Some(book) => book,
        None => prompt("Enter the book name: ")?,
    };
    if !store::valid_book_name(&book) {
        bail!("'{book}' is not a usable book name (must be a single, non-empty path segment)");
    }

    let session = ReaderSession::launch(settings).await?;
    prompt("Log in if needed, open the book, then press Enter to start capturing...")?;

    let frame_store = FrameStore::create(&settings.screenshots_dir, &book)?;
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received; finishing the current page");
                cancel.cancel();
            }
        });
    }

    let options = settings.capture_options();
    let outcome = run_capture(&session, &frame_store, &options, &LogProgress, &cancel).await;
    // Close the browser before acting on the capture result.
    if let Err(err) = session.close().await {
        warn!("browser shutdown: {err:#}");
    }
    let frames = outcome?;
    info!("Captured {frames} page(s) for '{book}'");

    let output = assembly::assemble_book(&settings.screenshots_dir, &settings.ebooks_dir, &book)?;
    info!("PDF saved as {}", output.display());
    Ok(())
}

fn assemble_cmd(settings: &Settings, book: Option<String>) -> Result<()> {
    let book = match book {
        Some(book) => book,
        None => {
            let books = store::list_books(&settings.screenshots_dir)?;
            if books.is_empty() {
                return Err(PipelineError::NoBooks {
                    dir: settings.screenshots_dir.clone(),
                }
                .into());
            }
            println!("Captured books:");
            for name in &books {
                println!("  {name}");
            }
            prompt("Enter the book name: ")?
        }
    };
    if !store::valid_book_name(&book) {
        bail!("'{book}' is not a usable book name (must be a single, non-empty path segment)");
    }

    let output = assembly::assemble_book(&settings.screenshots_dir, &settings.ebooks_dir, &book)?;
    info!("PDF saved as {}", output.display());
    Ok(())
}

fn list_cmd(settings: &Settings) -> Result<()> {
    let books = store::list_books(&settings.screenshots_dir)?;
    if books.is_empty() {
        println!(
            "No captured books under {}",
            settings.screenshots_dir.display()
        );
        return Ok(());
    }
    for name in books {
        println!("{name}");
    }
    Ok(())
}

fn clean_cmd(settings: &Settings) -> Result<()> {
    store::clean(&settings.screenshots_dir)?;
    info!("Screenshots directory has been cleaned");
    Ok(())
}

fn prompt(question: &str) -> Result<String> {
    print!("{question}");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("failed to read from stdin")?;
    Ok(answer.trim().to_string())
}
