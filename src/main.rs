mod app;
mod event;
mod tui;
mod ui;

use std::panic;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use diffnav::action::Action;
use diffnav::auth;
use diffnav::config::Config;
use diffnav::error::NavError;
use diffnav::reviewboard::{ReviewBoard, ReviewUrl};
use diffnav::route::{DiffRouter, MemoryHistory, UrlSynchronizer};
use diffnav::viewer::DiffViewer;

use crate::app::App;
use crate::event::Event;
use crate::tui::EventHandler;

/// Keyboard-driven viewer for Review Board diffs
#[derive(Parser)]
#[command(name = "diffnav", version, about)]
struct Cli {
    /// Diff viewer URL (https://server/r/<id>/diff/[rev/][#anchor]), or a
    /// review request id on the configured server
    url: String,

    /// Fragment loads allowed in flight at once
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Rows kept above a selected anchor
    #[arg(long)]
    lead_in: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load();
    let target = resolve_target(&cli.url, &config)?;

    let mut settings = config.navigation.settings();
    if let Some(window) = cli.max_in_flight {
        settings.max_in_flight = window.max(1);
    }
    if let Some(lead_in) = cli.lead_in {
        settings.lead_in = lead_in;
    }

    let token = auth::load_token(&config.server, target.host());
    let source = ReviewBoard::new(&target.server, target.review_request, token);

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = tui::restore();
        original_hook(panic_info);
    }));

    // Run the application
    let result = run(source, target.route, settings).await;

    // Restore terminal
    tui::restore()?;

    result
}

fn resolve_target(arg: &str, config: &Config) -> Result<ReviewUrl, NavError> {
    if let Ok(review_request) = arg.parse::<u64>() {
        let server = config.server.url.clone().ok_or_else(|| {
            NavError::Config("a bare review request id needs [server] url in the config".into())
        })?;
        return Ok(ReviewUrl {
            server: server.trim_end_matches('/').to_string(),
            review_request,
            route: String::new(),
        });
    }
    ReviewUrl::parse(arg)
}

async fn run(
    source: ReviewBoard,
    route: String,
    settings: diffnav::viewer::ViewerSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize terminal
    let mut terminal = tui::init()?;

    // Create action channel
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();

    let sync = UrlSynchronizer::new(
        Box::new(DiffRouter),
        Box::new(MemoryHistory::starting_at(route.clone())),
    );
    let viewer = DiffViewer::new(Arc::new(source), sync, action_tx.clone(), settings);
    let mut app = App::new(viewer);
    app.viewer.open(&route);

    // Create event handler
    let tick_rate = Duration::from_millis(250);
    let render_rate = Duration::from_millis(16); // ~60fps
    let mut events = EventHandler::new(tick_rate, render_rate);

    // Main loop
    loop {
        tokio::select! {
            Some(event) = events.next() => {
                if event.is_quit() {
                    break;
                }

                match event {
                    Event::Render => {
                        terminal.draw(|frame| ui::render(frame, &app))?;
                    }
                    _ => {
                        let action = app.handle_event(event);
                        if !matches!(action, Action::None) {
                            action_tx.send(action)?;
                        }
                    }
                }
            }
            Some(action) = action_rx.recv() => {
                app.update(action);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
