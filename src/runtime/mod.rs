use std::env;
use std::sync::mpsc;

use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::info;

use crate::app::App;
use crate::audio::RodioEngine;
use crate::config::Settings;
use crate::host::{HostSettings, SessionHost};
use crate::interruption::{InterruptionListener, spawn_logind_source};
use crate::library::DirectoryStore;
use crate::mpris::ControlCmd;

mod event_loop;
mod mpris_sync;
mod settings;

pub use settings::load_settings;

pub fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let dir = env::args().nth(1).unwrap_or_else(|| {
        env::current_dir()
            .ok()
            .and_then(|p| p.to_str().map(|s| s.to_string()))
            .unwrap_or_else(|| ".".to_string())
    });
    info!(%dir, "starting");

    let store = DirectoryStore::new(&dir, settings.library.clone());
    let host = SessionHost::new(
        Box::new(store),
        RodioEngine::open,
        HostSettings::new(&settings.session, &settings.playback),
    );

    // Fails here, before the terminal is taken over, when there is no audio
    // output.
    let handle = host.connect()?;

    let (interrupt_tx, interrupt_rx) = mpsc::channel();
    spawn_logind_source(interrupt_tx);
    let _listener = InterruptionListener::spawn(host.clone(), interrupt_rx);

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let mpris = crate::mpris::spawn_mpris(control_tx);

    let mut app = App::new(settings.ui.follow_playback);
    app.set_current_dir(dir);
    app.attached = true;
    app.apply_snapshot(handle.snapshot()?);

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = {
        let mut state = event_loop::EventLoopState::new(host.clone(), handle);
        event_loop::run(
            &mut terminal,
            &settings,
            &mut app,
            &mpris,
            &control_rx,
            &mut state,
        )
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    host.teardown();
    run_result
}
