mod config;
mod input;
mod scanner;
mod view;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use checkin_core::{
    AttendanceBackend, Download, HttpAttendanceClient, UiEvent, WorkflowController,
};
use clap::{Parser, Subcommand};
use shared::domain::TeamId;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    config::Settings,
    input::Input,
    scanner::LineScanner,
    view::TerminalView,
};

#[derive(Parser, Debug)]
#[command(name = "checkin", about = "Attendance check-in desk")]
struct Cli {
    /// Backend base URL; overrides the config file and environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan, review and submit teams until stdin closes.
    Run,
    /// Print attendance totals.
    Stats,
    /// Print one team's roster without starting the scanner.
    Lookup { team_id: String },
    /// Save one team's printable QR code.
    Qr {
        team_id: String,
        /// Defaults to the name the server suggests.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Save every team's QR code as a zip archive.
    ExportQrs {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Save the PDF event report.
    Report {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }
    config::validate_server_url(&settings.server_url)?;

    let client = HttpAttendanceClient::new(&settings.server_url, settings.request_timeout)
        .context("failed to build backend client")?;
    info!(server_url = %client.base_url(), "backend configured");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_desk(client, &settings).await,
        Command::Stats => {
            let stats = client.fetch_stats().await?;
            println!("check-in:  {}", stats.check_in);
            println!("snacks:    {}", stats.snacks);
            println!("dinner:    {}", stats.dinner);
            println!("check-out: {}", stats.check_out);
            Ok(())
        }
        Command::Lookup { team_id } => {
            let details = client.fetch_team(&TeamId::new(team_id)).await?;
            for line in view::render_details(&details) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Qr { team_id, out } => {
            let fallback = format!("{team_id}.png");
            let download = client.download_team_qr(&TeamId::new(team_id)).await?;
            save_download(download, out, &fallback).await
        }
        Command::ExportQrs { out } => {
            let download = client.export_qrs().await?;
            save_download(download, out, "All_QRs.zip").await
        }
        Command::Report { out } => {
            let download = client.event_report().await?;
            save_download(download, out, "event_report.pdf").await
        }
    }
}

async fn save_download(download: Download, out: Option<PathBuf>, fallback: &str) -> Result<()> {
    let path = out
        .unwrap_or_else(|| PathBuf::from(download.file_name.as_deref().unwrap_or(fallback)));
    tokio::fs::write(&path, &download.bytes)
        .await
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    println!("saved {} ({} bytes)", path.display(), download.bytes.len());
    Ok(())
}

async fn run_desk(client: HttpAttendanceClient, settings: &Settings) -> Result<()> {
    let scanner = LineScanner::default();
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (controller, handle) = WorkflowController::new(
        Arc::new(client),
        Arc::new(scanner.clone()),
        settings.workflow(),
        ui_tx,
    );
    let controller_task = tokio::spawn(controller.run());

    let mut view = TerminalView::default();
    let mut stdin = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = ui_rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                for line in view.apply(event) {
                    println!("{line}");
                }
            }
            line = stdin.next(), if stdin_open => {
                let line = match line {
                    Some(Ok(line)) => line,
                    Some(Err(err)) => {
                        warn!(error = %err, "stdin read failed");
                        stdin_open = false;
                        handle.shutdown();
                        continue;
                    }
                    None => {
                        stdin_open = false;
                        handle.shutdown();
                        continue;
                    }
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                if scanner.is_active() && !input::is_global(line) {
                    if !scanner.deliver(line) {
                        warn!("scanner is busy; scan dropped");
                    }
                    continue;
                }

                match input::parse(line) {
                    Ok(Input::Quit) => {
                        stdin_open = false;
                        handle.shutdown();
                    }
                    Ok(Input::Help) => println!("{}", input::HELP),
                    Ok(Input::Show) => {
                        for line in view.render_table() {
                            println!("{line}");
                        }
                    }
                    Ok(Input::Workflow(cmd)) => {
                        if !handle.dispatch(cmd) {
                            break;
                        }
                    }
                    Err(message) => println!("{message}"),
                }
            }
        }
    }

    controller_task
        .await
        .context("workflow controller task failed")?;
    Ok(())
}
