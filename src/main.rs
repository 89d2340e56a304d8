//! query-pane - run the SQL statement under a caret and report the outcome.

mod cli;

use cli::{Cli, OutputFormat};
use query_pane::config::{Config, ConnectionConfig};
use query_pane::editor::{BufferEditor, Position};
use query_pane::engine::{self, MockQueryEngine, QueryEngine, QueryResult};
use query_pane::error::{PaneError, Result};
use query_pane::feed::NotificationFeedState;
use query_pane::logging;
use query_pane::query::{ErrorLocation, ExtractedRequest};
use query_pane::session::{QuerySession, SessionEvent, SessionState};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Everything one run produced.
#[derive(Debug, Default, Serialize)]
struct RunReport {
    request: Option<ExtractedRequest>,
    result: Option<QueryResult>,
    error: Option<RunError>,
    feed: NotificationFeedState,
}

#[derive(Debug, Serialize)]
struct RunError {
    message: String,
    location: ErrorLocation,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = logging::init(&cli.log_target()) {
        eprintln!("{}: {}", e.category(), e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    cli.validate()?;

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    if let Some(max_height) = cli.max_height {
        config.feed.max_height = max_height;
    }

    let editor = build_editor(&cli)?;
    let engine = build_engine(&cli, &config).await?;

    let (events_tx, mut events_rx) = mpsc::channel(64);
    let (handle, session) = QuerySession::spawn(editor, engine, &config, events_tx);
    let task = tokio::spawn(session.run());

    handle.toggle_run().await?;
    let report = collect_report(&mut events_rx).await;
    handle.close().await?;
    task.await
        .map_err(|e| PaneError::internal(format!("Session task failed: {e}")))?;

    match cli.parse_output_format().map_err(PaneError::config)? {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| PaneError::internal(format!("Failed to encode report: {e}")))?;
            println!("{json}");
        }
        OutputFormat::Text => print_text(&report),
    }

    Ok(())
}

fn build_editor(cli: &Cli) -> Result<BufferEditor> {
    let text = cli.read_input()?;
    let editor = match cli.parse_selection().map_err(PaneError::config)? {
        Some(range) => BufferEditor::new(text).with_selection(range),
        None => BufferEditor::new(text).with_cursor(cli.parse_cursor().map_err(PaneError::config)?),
    };
    Ok(editor)
}

async fn build_engine(cli: &Cli, config: &Config) -> Result<Arc<dyn QueryEngine>> {
    if cli.mock_engine {
        info!("Using mock engine");
        return Ok(Arc::new(MockQueryEngine::new()));
    }

    let connection = resolve_connection(cli, config)?.ok_or_else(|| {
        PaneError::config("No database connection configured. Use --mock-engine or pass a connection string")
    })?;
    info!("Connection: {}", connection.display_string());
    engine::connect(&connection, &config.execution).await
}

/// Resolves the final connection configuration from CLI args, config file, and environment.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<Option<ConnectionConfig>> {
    let mut connection = cli.to_connection_config()?;

    if connection.is_none() {
        if let Some(name) = cli.connection_name() {
            connection = config.get_connection(Some(name)).cloned();
            if connection.is_none() {
                return Err(PaneError::config(format!(
                    "Connection '{name}' not found in config file"
                )));
            }
        }
    }

    if connection.is_none() {
        connection = config.get_connection(None).cloned();
    }

    if let Some(ref mut conn) = connection {
        conn.apply_env_defaults();
    }

    Ok(connection)
}

/// Drains session events until the run settles back to idle.
async fn collect_report(events: &mut mpsc::Receiver<SessionEvent>) -> RunReport {
    let mut report = RunReport::default();

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::RunStarted { request, .. } => report.request = Some(request),
            SessionEvent::ResultReady { result, .. } => report.result = Some(result),
            SessionEvent::ErrorLocated {
                location, message, ..
            } => report.error = Some(RunError { message, location }),
            SessionEvent::FeedChanged(feed) => report.feed = feed,
            SessionEvent::StateChanged(SessionState::Idle) => break,
            _ => {}
        }
    }

    report
}

fn print_text(report: &RunReport) {
    let Some(request) = &report.request else {
        println!("Nothing to run at the caret.");
        return;
    };
    println!("-- {}", request.origin());
    println!("{}", request.query);

    if let Some(result) = &report.result {
        if !result.columns.is_empty() {
            let header: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
            println!("{}", header.join("\t"));
        }
        for row in &result.rows {
            let cells: Vec<String> = row.iter().map(|v| v.to_display_string()).collect();
            println!("{}", cells.join("\t"));
        }
        if result.was_truncated {
            println!("({} of {} rows shown)", result.rows.len(), result.row_count);
        }
    }

    if let Some(error) = &report.error {
        let Position { row, column } = error.location.position;
        println!("error at {row}:{column}: {}", error.message);
    }

    for notification in &report.feed.notifications {
        match &notification.content.detail {
            Some(detail) => println!(
                "[{:?}] {}: {}",
                notification.kind, notification.content.title, detail
            ),
            None => println!("[{:?}] {}", notification.kind, notification.content.title),
        }
    }
}
