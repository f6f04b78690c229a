use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::audio::{EngineError, EventSink, PlaybackEngine};
use crate::library::MediaStore;
use crate::session::PlaybackSession;

use super::{HostMsg, HostSettings, Reply, SessionCmd, Shared, lock};

/// A freshly spawned session thread and its construction outcome.
pub(super) struct Spawned {
    pub(super) tx: Sender<HostMsg>,
    pub(super) join: JoinHandle<()>,
    pub(super) ready: Receiver<Result<(), String>>,
}

pub(super) fn spawn_session<E, F>(
    store: Box<dyn MediaStore>,
    factory: F,
    settings: HostSettings,
    shared: Shared,
) -> Spawned
where
    E: PlaybackEngine + 'static,
    F: FnOnce(EventSink) -> Result<E, EngineError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<HostMsg>();
    let (ready_tx, ready) = mpsc::channel();
    let engine_tx = tx.clone();

    let join = thread::spawn(move || {
        let sink: EventSink = Arc::new(move |event| {
            let _ = engine_tx.send(HostMsg::Engine(event));
        });
        let engine = match factory(sink) {
            Ok(engine) => engine,
            Err(e) => {
                let _ = ready_tx.send(Err(e.to_string()));
                return;
            }
        };

        let mut session = PlaybackSession::new(engine);
        session.set_shuffle(settings.flags.shuffle);
        session.set_auto_repeat(settings.flags.auto_repeat);
        session.set_playlist(store.enumerate());
        publish(&mut session, &shared);
        let _ = ready_tx.send(Ok(()));
        info!(
            tracks = session.playlist().len(),
            flags = ?session.flags(),
            "playback session ready"
        );

        run(&mut session, store.as_ref(), &rx, &settings, &shared);

        session.teardown();
        publish(&mut session, &shared);
    });

    Spawned { tx, join, ready }
}

fn run<E: PlaybackEngine>(
    session: &mut PlaybackSession<E>,
    store: &dyn MediaStore,
    rx: &Receiver<HostMsg>,
    settings: &HostSettings,
    shared: &Shared,
) {
    loop {
        match rx.recv_timeout(settings.tick) {
            Ok(HostMsg::Command(cmd)) => {
                apply(session, store, shared, cmd);
                debug!(status = ?session.status(), cursor = ?session.cursor(), "command applied");
            }
            Ok(HostMsg::Engine(event)) => {
                debug!(?event, current = ?session.generation(), "engine event");
                session.handle_event(event);
            }
            Ok(HostMsg::Teardown) => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("session channel closed without teardown");
                break;
            }
        }
        session.tick();
        publish(session, shared);
    }
}

fn apply<E: PlaybackEngine>(
    session: &mut PlaybackSession<E>,
    store: &dyn MediaStore,
    shared: &Shared,
    cmd: SessionCmd,
) {
    match cmd {
        SessionCmd::Rescan => {
            debug!("rescanning media store");
            session.set_playlist(store.enumerate());
        }
        SessionCmd::SelectAndPlay(index, reply) => {
            let result = session.select_and_play(index);
            answer(session, shared, reply, result);
        }
        SessionCmd::Resume => session.resume(),
        SessionCmd::Pause => session.pause(),
        SessionCmd::TogglePause(reply) => {
            let result = session.toggle_pause();
            answer(session, shared, reply, result);
        }
        SessionCmd::Seek(ms) => session.seek(ms),
        SessionCmd::SeekBy(delta) => session.seek_by(delta),
        SessionCmd::Next(reply) => {
            let result = session.skip_to_next();
            answer(session, shared, reply, result);
        }
        SessionCmd::Previous(reply) => {
            let result = session.skip_to_previous();
            answer(session, shared, reply, result);
        }
        SessionCmd::SetShuffle(on) => session.set_shuffle(on),
        SessionCmd::SetAutoRepeat(on) => session.set_auto_repeat(on),
        SessionCmd::Delete(index, reply) => {
            let result = session.delete_track(index, store);
            answer(session, shared, reply, result);
        }
    }
}

/// Reply only after publishing, so the caller sees the state its request
/// produced.
fn answer<E: PlaybackEngine, T>(
    session: &mut PlaybackSession<E>,
    shared: &Shared,
    reply: Reply<T>,
    result: crate::error::Result<T>,
) {
    publish(session, shared);
    let _ = reply.send(result);
}

/// Publish the snapshot, then tell observers what changed.
fn publish<E: PlaybackEngine>(session: &mut PlaybackSession<E>, shared: &Shared) {
    *lock(&shared.snapshot) = session.snapshot();
    let notes = session.take_notifications();
    if !notes.is_empty() {
        shared.observers.broadcast(&notes);
    }
}
