use std::mem;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::audio::{EngineEvent, Generation, PlaybackEngine};
use crate::error::{LibraryError, Result, SessionError};
use crate::library::{MediaStore, Track, TrackId};

use super::model::{Fault, Notification, PlaybackStatus, SessionFlags, SessionSnapshot};
use super::playlist::Playlist;

/// Owns the playlist, the cursor into it and the engine, and implements every
/// transition between tracks.
///
/// All methods must run on one thread (the host's session thread). Engine
/// events are fed back through [`PlaybackSession::handle_event`]; each
/// carries the [`Generation`] of the prepare request it answers, and anything
/// older than the current generation is discarded.
pub struct PlaybackSession<E: PlaybackEngine> {
    engine: E,
    playlist: Playlist,
    cursor: Option<usize>,
    status: PlaybackStatus,
    flags: SessionFlags,
    generation: Generation,
    /// Paused while preparing: land in `Paused` instead of starting.
    hold_on_prepare: bool,
    fault: Option<Fault>,
    rng: StdRng,
    outbox: Vec<Notification>,
}

impl<E: PlaybackEngine> PlaybackSession<E> {
    pub fn new(engine: E) -> Self {
        Self::with_rng(engine, StdRng::from_os_rng())
    }

    pub fn with_rng(engine: E, rng: StdRng) -> Self {
        Self {
            engine,
            playlist: Playlist::default(),
            cursor: None,
            status: PlaybackStatus::Idle,
            flags: SessionFlags::default(),
            generation: Generation::default(),
            hold_on_prepare: false,
            fault: None,
            rng,
            outbox: Vec::new(),
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn flags(&self) -> SessionFlags {
        self.flags
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.cursor.and_then(|i| self.playlist.get(i))
    }

    /// Drain the change notifications raised since the last call.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        mem::take(&mut self.outbox)
    }

    fn notify(&mut self, n: Notification) {
        if !self.outbox.contains(&n) {
            self.outbox.push(n);
        }
    }

    fn set_status(&mut self, status: PlaybackStatus) {
        if self.status != status {
            debug!(from = ?self.status, to = ?status, "status change");
            self.status = status;
            self.notify(Notification::StatusChanged);
        }
    }

    /// Replace the playlist. Does not start playback.
    pub fn set_playlist(&mut self, tracks: Vec<Track>) {
        let playing = self.current_track().map(|t| t.id);
        self.replace_playlist(tracks, playing);
    }

    fn replace_playlist(&mut self, tracks: Vec<Track>, playing: Option<TrackId>) {
        self.playlist = Playlist::from_tracks(tracks);
        self.notify(Notification::PlaylistChanged);
        info!(len = self.playlist.len(), "playlist replaced");

        match playing.map(|id| self.playlist.position_of(id)) {
            Some(Some(pos)) => {
                if self.cursor != Some(pos) {
                    debug!(from = ?self.cursor, to = pos, "cursor re-resolved by id");
                    self.cursor = Some(pos);
                }
            }
            Some(None) => {
                info!("current track left the playlist; stopping");
                self.abandon_current();
            }
            None => self.cursor = None,
        }

        if self.playlist.is_empty() {
            self.abandon_current();
        }
    }

    /// Stop whatever is loaded and forget the selection.
    fn abandon_current(&mut self) {
        self.generation = self.generation.next();
        self.engine.reset();
        self.hold_on_prepare = false;
        self.fault = None;
        if self.cursor.take().is_some() {
            self.notify(Notification::TrackChanged);
        }
        self.set_status(PlaybackStatus::Idle);
    }

    pub fn select_and_play(&mut self, index: usize) -> Result<()> {
        let len = self.playlist.len();
        if index >= len {
            return Err(SessionError::OutOfRange { index, len });
        }
        self.cursor = Some(index);
        self.notify(Notification::TrackChanged);
        self.load_current()
    }

    /// Reset the engine and start preparing the track under the cursor under
    /// a fresh generation.
    fn load_current(&mut self) -> Result<()> {
        let Some(track) = self.current_track().cloned() else {
            return Ok(());
        };

        self.generation = self.generation.next();
        self.hold_on_prepare = false;
        self.fault = None;
        self.engine.reset();

        if let Err(e) = self.engine.load(&track.locator) {
            warn!(path = %track.locator.display(), error = %e, "cannot open track");
            self.fault = Some(Fault::SourceUnavailable {
                title: track.title.clone(),
            });
            self.set_status(PlaybackStatus::Error);
            self.notify(Notification::StatusChanged);
            return Err(SessionError::SourceUnavailable {
                title: track.title,
                reason: e.to_string(),
            });
        }

        info!(title = %track.title, generation = %self.generation, "preparing track");
        self.set_status(PlaybackStatus::Preparing);
        self.engine.prepare_async(self.generation);
        Ok(())
    }

    pub fn resume(&mut self) {
        if self.cursor.is_none() {
            debug!("resume ignored: nothing selected");
            return;
        }
        match self.status {
            PlaybackStatus::Paused => {
                if !self.engine.is_playing() {
                    self.engine.start();
                }
                self.set_status(PlaybackStatus::Playing);
            }
            PlaybackStatus::Preparing => self.hold_on_prepare = false,
            other => debug!(status = ?other, "resume ignored"),
        }
    }

    pub fn pause(&mut self) {
        match self.status {
            PlaybackStatus::Playing => {
                self.engine.pause();
                self.set_status(PlaybackStatus::Paused);
            }
            PlaybackStatus::Preparing => self.hold_on_prepare = true,
            _ => {}
        }
    }

    /// Play/pause button: pauses or resumes, and (re)starts the selection when
    /// nothing is playing. After an engine failure the fault is reported
    /// instead; picking a track again is left to the caller.
    pub fn toggle_pause(&mut self) -> Result<()> {
        if let Some(Fault::Engine { fault, .. }) = &self.fault {
            if self.status == PlaybackStatus::Error {
                return Err(SessionError::Engine(*fault));
            }
        }
        match self.status {
            PlaybackStatus::Playing => self.pause(),
            PlaybackStatus::Paused => self.resume(),
            PlaybackStatus::Preparing if self.hold_on_prepare => self.resume(),
            PlaybackStatus::Preparing => self.pause(),
            PlaybackStatus::Idle | PlaybackStatus::Error => {
                if !self.playlist.is_empty() {
                    return self.select_and_play(self.cursor.unwrap_or(0));
                }
            }
        }
        Ok(())
    }

    pub fn seek(&mut self, position_ms: u64) {
        self.engine.seek_to(position_ms);
    }

    /// Seek relative to the current position, clamped to the track.
    pub fn seek_by(&mut self, delta_ms: i64) {
        if !matches!(self.status, PlaybackStatus::Playing | PlaybackStatus::Paused) {
            return;
        }
        let mut target = self.current_position_ms().saturating_add_signed(delta_ms);
        let duration = self.current_duration_ms();
        if duration > 0 {
            target = target.min(duration);
        }
        self.seek(target);
    }

    pub fn skip_to_next(&mut self) -> Result<()> {
        let Some(next) = self.next_index() else {
            return Ok(());
        };
        self.cursor = Some(next);
        self.notify(Notification::TrackChanged);
        self.load_current()
    }

    /// Always sequential, whatever the shuffle flag says.
    pub fn skip_to_previous(&mut self) -> Result<()> {
        let len = self.playlist.len();
        if len == 0 {
            return Ok(());
        }
        let prev = match self.cursor {
            Some(0) | None => len - 1,
            Some(c) => c - 1,
        };
        self.cursor = Some(prev);
        self.notify(Notification::TrackChanged);
        self.load_current()
    }

    fn next_index(&mut self) -> Option<usize> {
        let len = self.playlist.len();
        if len == 0 {
            return None;
        }
        if !self.flags.shuffle {
            return Some(self.cursor.map_or(0, |c| (c + 1) % len));
        }
        if len == 1 {
            return Some(0);
        }
        loop {
            let pick = self.rng.random_range(0..len);
            if Some(pick) != self.cursor {
                return Some(pick);
            }
        }
    }

    pub fn set_shuffle(&mut self, on: bool) {
        if self.flags.shuffle != on {
            self.flags.shuffle = on;
            self.notify(Notification::StatusChanged);
        }
    }

    pub fn set_auto_repeat(&mut self, on: bool) {
        if self.flags.auto_repeat != on {
            self.flags.auto_repeat = on;
            self.notify(Notification::StatusChanged);
        }
    }

    fn has_metrics(&self) -> bool {
        matches!(self.status, PlaybackStatus::Playing | PlaybackStatus::Paused)
    }

    pub fn current_position_ms(&self) -> u64 {
        if self.has_metrics() {
            self.engine.position_ms()
        } else {
            0
        }
    }

    pub fn current_duration_ms(&self) -> u64 {
        if self.has_metrics() {
            self.engine.duration_ms()
        } else {
            0
        }
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        if event.generation() != self.generation {
            debug!(
                event = ?event,
                current = %self.generation,
                "discarding stale engine event"
            );
            return;
        }

        match event {
            EngineEvent::Prepared { .. } => {
                if self.status != PlaybackStatus::Preparing {
                    debug!(status = ?self.status, "prepared outside of Preparing");
                    return;
                }
                if mem::take(&mut self.hold_on_prepare) {
                    self.set_status(PlaybackStatus::Paused);
                } else {
                    self.engine.start();
                    self.set_status(PlaybackStatus::Playing);
                }
                self.notify(Notification::TransportReady);
            }
            EngineEvent::Completed { position_ms, .. } => {
                // Some backends report completion for streams that never played.
                if position_ms == 0 {
                    debug!("ignoring completion at position 0");
                    return;
                }
                let next = if self.flags.auto_repeat {
                    self.load_current()
                } else {
                    self.skip_to_next()
                };
                if let Err(e) = next {
                    warn!(error = %e, "could not continue after track end");
                }
            }
            EngineEvent::Error { fault, .. } => {
                let title = self
                    .current_track()
                    .map(|t| t.title.clone())
                    .unwrap_or_default();
                warn!(%title, %fault, "engine error");
                self.engine.reset();
                self.hold_on_prepare = false;
                self.fault = Some(Fault::Engine { title, fault });
                self.set_status(PlaybackStatus::Error);
                self.notify(Notification::StatusChanged);
            }
        }
    }

    /// Poll the engine for events it only detects by polling.
    pub fn tick(&mut self) {
        while let Some(event) = self.engine.poll() {
            self.handle_event(event);
        }
    }

    /// Delete the track at `index` from `store` and refresh the playlist.
    ///
    /// The playing track cannot be deleted. A file that was already gone is
    /// reported as [`LibraryError::NotFound`] after the refresh.
    pub fn delete_track(&mut self, index: usize, store: &dyn MediaStore) -> Result<Track> {
        let len = self.playlist.len();
        let target = self
            .playlist
            .get(index)
            .cloned()
            .ok_or(SessionError::OutOfRange { index, len })?;

        let playing = self.current_track().map(|t| t.id);
        if playing == Some(target.id) {
            return Err(SessionError::DeleteConflict {
                title: target.title,
            });
        }

        let missing = match store.remove(&target) {
            Ok(()) => None,
            Err(e @ LibraryError::NotFound(_)) => Some(e),
            Err(e) => return Err(e.into()),
        };

        if let Some(c) = self.cursor.filter(|&c| index < c) {
            self.cursor = Some(c - 1);
        }
        self.replace_playlist(store.enumerate(), playing);

        match missing {
            Some(e) => Err(e.into()),
            None => Ok(target),
        }
    }

    /// Release the engine. Only used when the process is shutting down.
    pub fn teardown(&mut self) {
        self.generation = self.generation.next();
        self.hold_on_prepare = false;
        self.engine.stop();
        self.engine.release();
        self.set_status(PlaybackStatus::Idle);
        info!("session torn down");
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            cursor: self.cursor,
            flags: self.flags,
            playlist: self.playlist.shared(),
            position_ms: self.current_position_ms(),
            duration_ms: self.current_duration_ms(),
            fault: self.fault.clone(),
        }
    }
}
