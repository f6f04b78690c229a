use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{debug, info};

use crate::app::{App, PromptAnswer};
use crate::config;
use crate::error::SessionError;
use crate::host::{SessionHandle, SessionHost};
use crate::mpris::{ControlCmd, MprisHandle};
use crate::runtime::mpris_sync::MprisMirror;
use crate::session::{PlaybackStatus, SessionSnapshot};
use crate::ui;

/// State tracked by the runtime event loop across iterations.
pub struct EventLoopState {
    host: SessionHost,
    /// The observer binding; `None` while detached.
    handle: Option<SessionHandle>,
    /// Non-observing binding for MPRIS, which keeps working while detached.
    remote: Option<SessionHandle>,
    /// Internal two-key prefix state used for `gg` handling.
    pending_gg: bool,
    pending_zz: bool,
    mirror: MprisMirror,
}

impl EventLoopState {
    pub fn new(host: SessionHost, handle: SessionHandle) -> Self {
        Self {
            host,
            handle: Some(handle),
            remote: None,
            pending_gg: false,
            pending_zz: false,
            mirror: MprisMirror::default(),
        }
    }

    fn remote(&mut self) -> Option<&SessionHandle> {
        if self.remote.is_none() {
            self.remote = self.host.session();
        }
        self.remote.as_ref()
    }

    fn clear_prefixes(&mut self) {
        self.pending_gg = false;
        self.pending_zz = false;
    }
}

/// Main terminal event loop: reads the session snapshot, draws, and routes
/// keys and MPRIS commands. Returns `Ok(())` when shutdown is requested.
pub fn run(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    mpris: &MprisHandle,
    control_rx: &mpsc::Receiver<ControlCmd>,
    state: &mut EventLoopState,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        refresh(app, mpris, state)?;

        terminal.draw(|f| ui::draw(f, app, &settings.ui, &settings.controls))?;

        while let Ok(cmd) = control_rx.try_recv() {
            if handle_control_cmd(cmd, app, state) {
                return Ok(());
            }
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key_event(key, settings, app, state)? {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Re-read the snapshot every frame so the elapsed time keeps moving. While
/// detached only MPRIS follows the session; the app keeps its last view.
fn refresh(
    app: &mut App,
    mpris: &MprisHandle,
    state: &mut EventLoopState,
) -> Result<(), SessionError> {
    if let Some(handle) = &state.handle {
        let notes = handle.notifications();
        if !notes.is_empty() {
            debug!(?notes, "session changed");
        }
        app.apply_snapshot(handle.snapshot()?);
        state.mirror.sync(mpris, &app.snapshot);
    } else if let Some(remote) = state.remote() {
        let snap = remote.snapshot()?;
        state.mirror.sync(mpris, &snap);
    }
    Ok(())
}

/// Show a failed session call on the notice line.
fn report<T>(app: &mut App, result: Result<T, SessionError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            app.set_notice(e.to_string());
            None
        }
    }
}

/// Play/pause from the keyboard, starting the selection when nothing is
/// loaded.
fn play_pause(app: &mut App, session: &SessionHandle) {
    let result = match app.snapshot.status {
        PlaybackStatus::Idle | PlaybackStatus::Error if app.has_tracks() => {
            session.select_and_play(app.selected)
        }
        _ => session.toggle_pause(),
    };
    report(app, result);
}

/// Start the session's own track (or the first) when nothing is loaded.
fn start_remote(app: &mut App, session: &SessionHandle, snap: &SessionSnapshot) {
    if snap.playlist.is_empty() {
        return;
    }
    let index = snap.cursor.filter(|&c| c < snap.playlist.len()).unwrap_or(0);
    report(app, session.select_and_play(index));
}

/// MPRIS commands work whether or not this observer is attached, so they
/// branch on the session's current state rather than the app's view.
fn handle_control_cmd(cmd: ControlCmd, app: &mut App, state: &mut EventLoopState) -> bool {
    if cmd == ControlCmd::Quit {
        return true;
    }
    let Some(session) = state.remote() else {
        return false;
    };
    let Some(snap) = report(app, session.snapshot()) else {
        return false;
    };

    app.follow_playback_on();
    match cmd {
        ControlCmd::Quit => {}
        ControlCmd::Play => match snap.status {
            PlaybackStatus::Paused | PlaybackStatus::Preparing => {
                report(app, session.resume());
            }
            PlaybackStatus::Idle | PlaybackStatus::Error => start_remote(app, session, &snap),
            PlaybackStatus::Playing => {}
        },
        // The session has no stopped state short of teardown; stop pauses.
        ControlCmd::Pause | ControlCmd::Stop => {
            report(app, session.pause());
        }
        ControlCmd::PlayPause => match snap.status {
            PlaybackStatus::Idle | PlaybackStatus::Error => start_remote(app, session, &snap),
            _ => {
                report(app, session.toggle_pause());
            }
        },
        ControlCmd::Next => {
            report(app, session.skip_to_next());
        }
        ControlCmd::Prev => {
            report(app, session.skip_to_previous());
        }
        ControlCmd::SeekBy(delta_ms) => {
            report(app, session.seek_by(delta_ms));
        }
        ControlCmd::SetPosition(position_ms) => {
            report(app, session.seek(position_ms));
        }
    }
    false
}

fn toggle_attachment(app: &mut App, state: &mut EventLoopState) {
    match state.handle.take() {
        Some(handle) => {
            handle.disconnect();
            app.attached = false;
            app.set_notice("Detached; playback continues. Press D to attach again.");
            info!("observer detached by user");
        }
        None => match state.host.connect() {
            Ok(handle) => {
                app.attached = true;
                app.clear_notice();
                state.handle = Some(handle);
            }
            Err(e) => app.set_notice(e.to_string()),
        },
    }
}

fn handle_key_event(
    key: KeyEvent,
    settings: &config::Settings,
    app: &mut App,
    state: &mut EventLoopState,
) -> Result<bool, Box<dyn std::error::Error>> {
    if app.prompt.is_some() {
        let answer = match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Some(true),
            KeyCode::Char('n') | KeyCode::Esc => Some(false),
            _ => None,
        };
        match answer.and_then(|yes| app.answer_prompt(yes)) {
            Some(PromptAnswer::Delete(index)) => delete(app, state, index),
            Some(PromptAnswer::Quit) => return Ok(true),
            None => {}
        }
        return Ok(false);
    }

    // Keys that work while detached.
    match key.code {
        KeyCode::Char('q') => {
            state.clear_prefixes();
            return Ok(app.begin_quit(settings.ui.confirm_quit));
        }
        KeyCode::Char('D') => {
            state.clear_prefixes();
            toggle_attachment(app, state);
            return Ok(false);
        }
        KeyCode::Char('g') => {
            state.pending_zz = false;
            if state.pending_gg {
                state.pending_gg = false;
                app.follow_playback_off();
                app.select_first();
            } else {
                state.pending_gg = true;
            }
            return Ok(false);
        }
        KeyCode::Char('z') => {
            state.pending_gg = false;
            if state.pending_zz {
                state.pending_zz = false;
                if app.jump_to_now_playing() {
                    app.follow_playback_on();
                }
            } else {
                state.pending_zz = true;
            }
            return Ok(false);
        }
        KeyCode::Char('G') => {
            state.clear_prefixes();
            app.follow_playback_off();
            app.select_last();
            return Ok(false);
        }
        KeyCode::Char('j') | KeyCode::Down => {
            state.clear_prefixes();
            app.follow_playback_off();
            app.next();
            return Ok(false);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            state.clear_prefixes();
            app.follow_playback_off();
            app.prev();
            return Ok(false);
        }
        _ => state.clear_prefixes(),
    }

    let Some(session) = state.handle.as_ref() else {
        app.set_notice("Detached. Press D to attach.");
        return Ok(false);
    };

    match key.code {
        KeyCode::Enter => {
            if !app.has_tracks() {
                return Ok(false);
            }
            let is_playing_selected = app.snapshot.status == PlaybackStatus::Playing
                && app.playing_index() == Some(app.selected);
            if !is_playing_selected {
                app.follow_playback_on();
                report(app, session.select_and_play(app.selected));
            }
        }
        KeyCode::Char('p') | KeyCode::Char(' ') => {
            app.follow_playback_on();
            play_pause(app, session);
        }
        KeyCode::Char('l') => {
            app.follow_playback_on();
            report(app, session.skip_to_next());
        }
        KeyCode::Char('h') => {
            app.follow_playback_on();
            report(app, session.skip_to_previous());
        }
        KeyCode::Char('L') => {
            report(app, session.seek_by(scrub_ms(settings)));
        }
        KeyCode::Char('H') => {
            report(app, session.seek_by(-scrub_ms(settings)));
        }
        KeyCode::Char('s') => {
            report(app, session.set_shuffle(!app.snapshot.flags.shuffle));
        }
        KeyCode::Char('r') => {
            report(app, session.set_auto_repeat(!app.snapshot.flags.auto_repeat));
        }
        KeyCode::Char('R') => {
            if report(app, session.rescan()).is_some() {
                app.set_notice("Rescanning library");
            }
        }
        KeyCode::Char('d') => {
            if let Some(index) = app.begin_delete(settings.ui.confirm_delete) {
                delete(app, state, index);
            }
        }
        _ => {}
    }

    Ok(false)
}

fn scrub_ms(settings: &config::Settings) -> i64 {
    i64::try_from(settings.controls.scrub_seconds.saturating_mul(1000)).unwrap_or(i64::MAX)
}

fn delete(app: &mut App, state: &EventLoopState, index: usize) {
    let Some(session) = state.handle.as_ref() else {
        return;
    };
    if let Some(track) = report(app, session.delete_track(index)) {
        app.set_notice(format!("Deleted \"{}\"", track.title));
    }
}
