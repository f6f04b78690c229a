use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use tracing::{debug, info};

use crate::error::{Result, SessionError};
use crate::library::Track;
use crate::session::{Notification, SessionSnapshot};

use super::{HostMsg, Reply, SessionCmd, Shared, lock};

struct Observer {
    id: u64,
    notes: Receiver<Notification>,
}

/// An observer's binding to the running session.
///
/// Every call is forwarded to the session thread. After
/// [`disconnect`](Self::disconnect) all calls fail with
/// [`SessionError::Disconnected`] while the session itself keeps playing.
pub struct SessionHandle {
    tx: Sender<HostMsg>,
    shared: Shared,
    active: AtomicBool,
    observer: Option<Observer>,
}

impl SessionHandle {
    pub(super) fn observing(
        tx: Sender<HostMsg>,
        shared: Shared,
        id: u64,
        notes: Receiver<Notification>,
    ) -> Self {
        Self {
            tx,
            shared,
            active: AtomicBool::new(true),
            observer: Some(Observer { id, notes }),
        }
    }

    pub(super) fn detached(tx: Sender<HostMsg>, shared: Shared) -> Self {
        Self {
            tx,
            shared,
            active: AtomicBool::new(true),
            observer: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(SessionError::Disconnected)
        }
    }

    fn send(&self, cmd: SessionCmd) -> Result<()> {
        self.ensure_connected()?;
        self.tx
            .send(HostMsg::Command(cmd))
            .map_err(|_| SessionError::HostGone)
    }

    /// Send a command and wait for the session thread's answer.
    fn request<T>(&self, cmd: impl FnOnce(Reply<T>) -> SessionCmd) -> Result<T> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(cmd(reply_tx))?;
        reply_rx.recv().map_err(|_| SessionError::HostGone)?
    }

    /// Re-enumerate the media store and replace the playlist.
    pub fn rescan(&self) -> Result<()> {
        self.send(SessionCmd::Rescan)
    }

    pub fn select_and_play(&self, index: usize) -> Result<()> {
        self.request(|r| SessionCmd::SelectAndPlay(index, r))
    }

    pub fn resume(&self) -> Result<()> {
        self.send(SessionCmd::Resume)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(SessionCmd::Pause)
    }

    pub fn toggle_pause(&self) -> Result<()> {
        self.request(SessionCmd::TogglePause)
    }

    pub fn seek(&self, position_ms: u64) -> Result<()> {
        self.send(SessionCmd::Seek(position_ms))
    }

    pub fn seek_by(&self, delta_ms: i64) -> Result<()> {
        self.send(SessionCmd::SeekBy(delta_ms))
    }

    pub fn skip_to_next(&self) -> Result<()> {
        self.request(SessionCmd::Next)
    }

    pub fn skip_to_previous(&self) -> Result<()> {
        self.request(SessionCmd::Previous)
    }

    pub fn set_shuffle(&self, on: bool) -> Result<()> {
        self.send(SessionCmd::SetShuffle(on))
    }

    pub fn set_auto_repeat(&self, on: bool) -> Result<()> {
        self.send(SessionCmd::SetAutoRepeat(on))
    }

    /// Delete the track at `index` from the media store. Returns the removed
    /// track.
    pub fn delete_track(&self, index: usize) -> Result<Track> {
        self.request(|r| SessionCmd::Delete(index, r))
    }

    /// The most recently published session state.
    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        self.ensure_connected()?;
        Ok(lock(&self.shared.snapshot).clone())
    }

    /// Drain pending notifications without blocking.
    pub fn notifications(&self) -> Vec<Notification> {
        match &self.observer {
            Some(o) if self.is_connected() => o.notes.try_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Block until a notification arrives or `timeout` passes.
    #[cfg(test)]
    pub(crate) fn wait_notification(&self, timeout: std::time::Duration) -> Option<Notification> {
        let o = self.observer.as_ref().filter(|_| self.is_connected())?;
        o.notes.recv_timeout(timeout).ok()
    }

    /// Unbind from the session. Playback continues.
    pub fn disconnect(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        match &self.observer {
            Some(o) => {
                self.shared.observers.unregister(o.id);
                info!(observer = o.id, "observer disconnected");
            }
            None => debug!("detached handle disconnected"),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.disconnect();
    }
}
