mod app;
mod demo;
mod detail;

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use directories::ProjectDirs;
use ratatui::{Terminal, backend::CrosstermBackend};

use strata_providers::{JsonFileProvider, MemoryProvider};

use app::App;

fn main() -> Result<()> {
    init_logging()?;

    let mut app = App::new();

    // Each file argument becomes a document; with none, show the demo.
    let files: Vec<String> = std::env::args().skip(1).collect();
    if files.is_empty() {
        app.open_document(MemoryProvider::handle(demo::demo_document()));
    } else {
        for file in files {
            app.open_document(JsonFileProvider::handle(file));
        }
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main event loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

/// Log to a file under the platform data directory; stderr belongs to the
/// terminal UI.
fn init_logging() -> Result<()> {
    let dirs = ProjectDirs::from("", "", "strata")
        .context("could not determine a data directory for logs")?;
    std::fs::create_dir_all(dirs.data_dir())?;
    let log_file = std::fs::File::create(dirs.data_dir().join("strata.log"))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    const TICK_RATE: Duration = Duration::from_millis(50);

    loop {
        terminal.draw(|frame| {
            app.render(frame);
        })?;

        if app.should_quit {
            return Ok(());
        }

        // Poll with timeout so fetch outcomes are absorbed between keys
        if event::poll(TICK_RATE)? {
            let ev = event::read()?;
            app.handle_event(ev);
        }

        app.tick();
    }
}
