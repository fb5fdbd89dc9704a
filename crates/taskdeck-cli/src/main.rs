mod app;
mod config;
mod logging;
mod ui;

use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use crossterm::event::{Event, EventStream, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures_util::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use taskdeck_core::orchestration::{MAX_CONCURRENCY, RefreshTrigger, spawn_refresh};
use taskdeck_core::{ResultCache, TaskOrchestrator};
use time::UtcOffset;
use tokio::sync::mpsc;

use crate::app::{Action, App};
use crate::config::{DashboardConfig, config_path, load_config};

#[derive(Debug, Parser)]
#[command(name = "taskdeck", about = "Terminal dashboard for per-project task providers")]
struct Args {
    /// Config file (defaults to $TASKDECK_CONFIG_PATH or $XDG_CONFIG_HOME/taskdeck/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Refresh every project once, print the snapshot as JSON, and exit
    #[arg(long)]
    once: bool,

    /// Upper bound on providers running at the same time
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_concurrency: Option<u64>,
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let args = Args::parse();
    logging::init_logging();

    // Must be read before the runtime starts any threads.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let path = config_path(args.config);
    let mut config = load_config(&path)?;
    if let Some(limit) = args.max_concurrency {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX).min(MAX_CONCURRENCY);
        config.policy.max_concurrency = Some(limit);
    }
    tracing::info!(
        config = %config.path.display(),
        projects = config.projects.len(),
        max_concurrency = ?config.policy.max_concurrency,
        "loaded dashboard config"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    if args.once {
        return runtime.block_on(print_once(config));
    }
    runtime.block_on(run_dashboard(config, offset))?;
    Ok(ExitCode::SUCCESS)
}

async fn print_once(config: DashboardConfig) -> Result<ExitCode, Box<dyn Error>> {
    let orchestrator = TaskOrchestrator::with_tokio_processes();
    let cache = ResultCache::new();
    let options = config.policy.options_for(RefreshTrigger::Manual);
    let snapshot = orchestrator
        .refresh(&cache, &config.projects, &config.global, &options)
        .await;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    if snapshot.errors.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn run_dashboard(config: DashboardConfig, offset: UtcOffset) -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, App::new(config), offset).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    offset: UtcOffset,
) -> Result<(), Box<dyn Error>> {
    let orchestrator = Arc::new(TaskOrchestrator::with_tokio_processes());
    let cache = Arc::new(ResultCache::new());
    let (sender, mut receiver) = mpsc::unbounded_channel();
    let mut events = EventStream::new();
    let mut poll_ticker = tokio::time::interval(app.config.poll_interval);
    poll_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        terminal.draw(|frame| ui::render(frame, &app, offset))?;

        let trigger = tokio::select! {
            _ = poll_ticker.tick() => {
                if app.poll_due() { Some(RefreshTrigger::Poll) } else { None }
            }
            Some(message) = receiver.recv() => {
                app.finish_refresh(&message);
                None
            }
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    match app.handle_key(key) {
                        Action::Quit => break,
                        Action::Refresh(trigger) => Some(trigger),
                        Action::Redraw | Action::None => None,
                    }
                }
                Some(Ok(_)) => None,
                Some(Err(err)) => return Err(err.into()),
                None => break,
            },
        };

        if let Some(trigger) = trigger {
            let request = app.begin_refresh(trigger);
            tracing::debug!(generation = request.generation, ?trigger, "starting refresh");
            spawn_refresh(orchestrator.clone(), cache.clone(), request, sender.clone());
        }
    }

    Ok(())
}
