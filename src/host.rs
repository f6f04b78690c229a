//! Session host: keeps the one playback session alive independently of the
//! observers that connect to it.
//!
//! The session is built lazily by the first [`SessionHost::connect`] on its
//! own home thread, and stays there until [`SessionHost::teardown`]. Observers
//! talk to it through [`SessionHandle`]s; disconnecting a handle never stops
//! playback.

mod handle;
mod thread;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::audio::{EngineError, EngineEvent, EventSink, PlaybackEngine};
use crate::config::{PlaybackSettings, SessionSettings};
use crate::error::{Result, SessionError};
use crate::library::{MediaStore, Track};
use crate::session::{Notification, SessionFlags, SessionSnapshot};

pub use handle::SessionHandle;
use thread::Spawned;

/// The latest snapshot published by the session thread.
pub type SnapshotHandle = Arc<Mutex<SessionSnapshot>>;

type Reply<T> = Sender<Result<T>>;

/// Intents forwarded to the session thread.
pub(crate) enum SessionCmd {
    Rescan,
    SelectAndPlay(usize, Reply<()>),
    Resume,
    Pause,
    TogglePause(Reply<()>),
    Seek(u64),
    SeekBy(i64),
    Next(Reply<()>),
    Previous(Reply<()>),
    SetShuffle(bool),
    SetAutoRepeat(bool),
    Delete(usize, Reply<Track>),
}

/// Everything the session thread receives, in arrival order.
pub(crate) enum HostMsg {
    Command(SessionCmd),
    Engine(EngineEvent),
    Teardown,
}

/// Notification senders of connected observers, keyed by observer id.
#[derive(Clone, Default)]
pub(crate) struct ObserverRegistry(Arc<Mutex<Vec<(u64, Sender<Notification>)>>>);

impl ObserverRegistry {
    fn register(&self, id: u64, tx: Sender<Notification>) {
        lock(&self.0).push((id, tx));
    }

    pub(crate) fn unregister(&self, id: u64) {
        lock(&self.0).retain(|(i, _)| *i != id);
    }

    /// Send `notes` to every observer, forgetting those whose receiver is gone.
    pub(crate) fn broadcast(&self, notes: &[Notification]) {
        lock(&self.0).retain(|(_, tx)| notes.iter().all(|n| tx.send(*n).is_ok()));
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.0).len()
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How the session thread is configured at construction time.
#[derive(Debug, Clone)]
pub struct HostSettings {
    pub tick: Duration,
    pub flags: SessionFlags,
}

impl HostSettings {
    pub fn new(session: &SessionSettings, playback: &PlaybackSettings) -> Self {
        Self {
            tick: Duration::from_millis(session.tick_ms.max(1)),
            flags: SessionFlags {
                shuffle: playback.shuffle,
                auto_repeat: playback.auto_repeat,
            },
        }
    }
}

impl Default for HostSettings {
    fn default() -> Self {
        Self::new(&SessionSettings::default(), &PlaybackSettings::default())
    }
}

/// Spawns the session thread once everything generic has been captured.
type Launch = Box<dyn FnOnce(Shared) -> Spawned + Send>;

/// State shared between the host and its session thread.
#[derive(Clone)]
pub(crate) struct Shared {
    pub(crate) snapshot: SnapshotHandle,
    pub(crate) observers: ObserverRegistry,
}

enum HostState {
    NotStarted(Launch),
    Running {
        tx: Sender<HostMsg>,
        join: Option<JoinHandle<()>>,
    },
    Failed(String),
    TornDown,
}

struct HostInner {
    state: Mutex<HostState>,
    shared: Shared,
    next_observer: AtomicU64,
}

impl Drop for HostInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let HostState::Running { tx, join } = state {
            let _ = tx.send(HostMsg::Teardown);
            if let Some(h) = join.take() {
                let _ = h.join();
            }
        }
    }
}

/// Owner of the playback session. Cheap to clone; all clones share one
/// session.
#[derive(Clone)]
pub struct SessionHost {
    inner: Arc<HostInner>,
}

impl SessionHost {
    /// Prepare a host. Nothing runs until the first [`connect`](Self::connect).
    ///
    /// `factory` builds the engine on the session thread, since engines may
    /// hold resources that cannot leave the thread that opened them.
    pub fn new<E, F>(store: Box<dyn MediaStore>, factory: F, settings: HostSettings) -> Self
    where
        E: PlaybackEngine + 'static,
        F: FnOnce(EventSink) -> std::result::Result<E, EngineError> + Send + 'static,
    {
        let launch: Launch =
            Box::new(move |shared| thread::spawn_session(store, factory, settings, shared));
        Self {
            inner: Arc::new(HostInner {
                state: Mutex::new(HostState::NotStarted(launch)),
                shared: Shared {
                    snapshot: Arc::new(Mutex::new(SessionSnapshot::default())),
                    observers: ObserverRegistry::default(),
                },
                next_observer: AtomicU64::new(1),
            }),
        }
    }

    /// Bind an observer to the session, constructing it on first use.
    ///
    /// Blocks until construction has finished. Concurrent callers wait for
    /// the same construction and all get handles to the same session.
    pub fn connect(&self) -> Result<SessionHandle> {
        let mut state = lock(&self.inner.state);

        let current = std::mem::replace(&mut *state, HostState::TornDown);
        *state = match current {
            HostState::NotStarted(launch) => self.construct(launch),
            other => other,
        };

        match &*state {
            HostState::Running { tx, .. } => {
                let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
                let (note_tx, note_rx) = mpsc::channel();
                self.inner.shared.observers.register(id, note_tx);
                info!(observer = id, "observer connected");
                Ok(SessionHandle::observing(
                    tx.clone(),
                    self.inner.shared.clone(),
                    id,
                    note_rx,
                ))
            }
            HostState::Failed(msg) => Err(SessionError::Construction(msg.clone())),
            HostState::TornDown | HostState::NotStarted(_) => Err(SessionError::HostGone),
        }
    }

    fn construct(&self, launch: Launch) -> HostState {
        info!("constructing playback session");
        let Spawned { tx, join, ready } = launch(self.inner.shared.clone());
        match ready.recv() {
            Ok(Ok(())) => HostState::Running {
                tx,
                join: Some(join),
            },
            Ok(Err(msg)) => {
                error!(error = %msg, "playback session failed to start");
                let _ = join.join();
                HostState::Failed(msg)
            }
            Err(_) => {
                let _ = join.join();
                HostState::Failed("session thread exited during construction".to_string())
            }
        }
    }

    /// A handle to the running session that does not receive notifications,
    /// or `None` when the session was never constructed.
    pub fn session(&self) -> Option<SessionHandle> {
        match &*lock(&self.inner.state) {
            HostState::Running { tx, .. } => Some(SessionHandle::detached(
                tx.clone(),
                self.inner.shared.clone(),
            )),
            _ => None,
        }
    }

    /// The most recently published snapshot, without connecting.
    #[cfg(test)]
    pub(crate) fn snapshot_handle(&self) -> SnapshotHandle {
        self.inner.shared.snapshot.clone()
    }

    /// Stop and release the engine and join the session thread.
    pub fn teardown(&self) {
        let previous = std::mem::replace(&mut *lock(&self.inner.state), HostState::TornDown);
        match previous {
            HostState::Running { tx, join } => {
                info!("tearing down playback session");
                if tx.send(HostMsg::Teardown).is_err() {
                    warn!("session thread already gone");
                }
                if let Some(h) = join {
                    let _ = h.join();
                }
            }
            HostState::NotStarted(_) => info!("teardown before the session was constructed"),
            HostState::Failed(_) | HostState::TornDown => {}
        }
    }

    #[cfg(test)]
    pub(crate) fn observer_count(&self) -> usize {
        self.inner.shared.observers.len()
    }
}
