//! A scriptable engine that records every call, for session and host tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::engine::{EngineError, EngineEvent, Generation, PlaybackEngine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Reset,
    Load(PathBuf),
    Prepare(Generation),
    Start,
    Pause,
    SeekTo(u64),
    Stop,
    Release,
}

#[derive(Default)]
pub struct FakeState {
    pub calls: Vec<EngineCall>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub playing: bool,
    pub prepared: bool,
    pub unopenable: HashSet<PathBuf>,
    /// Events handed out by `poll`, front first.
    pub queued: Vec<EngineEvent>,
}

/// Cloneable view onto a [`FakeEngine`]'s state, usable after the engine has
/// moved into a session thread.
#[derive(Clone, Default)]
pub struct FakeProbe(pub Arc<Mutex<FakeState>>);

impl FakeProbe {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.0.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.0.lock().unwrap().calls.clear();
    }

    pub fn set_metrics(&self, position_ms: u64, duration_ms: u64) {
        let mut s = self.0.lock().unwrap();
        s.position_ms = position_ms;
        s.duration_ms = duration_ms;
    }

    pub fn make_unopenable(&self, path: impl Into<PathBuf>) {
        self.0.lock().unwrap().unopenable.insert(path.into());
    }

    pub fn queue_event(&self, ev: EngineEvent) {
        self.0.lock().unwrap().queued.push(ev);
    }

    pub fn last_prepare(&self) -> Option<Generation> {
        self.calls().into_iter().rev().find_map(|c| match c {
            EngineCall::Prepare(g) => Some(g),
            _ => None,
        })
    }

    pub fn loads(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Load(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

pub struct FakeEngine {
    probe: FakeProbe,
}

impl FakeEngine {
    pub fn new() -> (Self, FakeProbe) {
        let probe = FakeProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }

    fn record(&self, call: EngineCall) -> std::sync::MutexGuard<'_, FakeState> {
        let mut s = self.probe.0.lock().unwrap();
        s.calls.push(call);
        s
    }
}

impl PlaybackEngine for FakeEngine {
    fn reset(&mut self) {
        let mut s = self.record(EngineCall::Reset);
        s.playing = false;
        s.prepared = false;
        s.position_ms = 0;
        s.duration_ms = 0;
    }

    fn load(&mut self, locator: &Path) -> Result<(), EngineError> {
        let s = self.record(EngineCall::Load(locator.to_path_buf()));
        if s.unopenable.contains(locator) {
            return Err(EngineError::Open {
                path: locator.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(())
    }

    fn prepare_async(&mut self, generation: Generation) {
        self.record(EngineCall::Prepare(generation)).prepared = true;
    }

    fn start(&mut self) {
        self.record(EngineCall::Start).playing = true;
    }

    fn pause(&mut self) {
        self.record(EngineCall::Pause).playing = false;
    }

    fn seek_to(&mut self, position_ms: u64) {
        let mut s = self.record(EngineCall::SeekTo(position_ms));
        if s.prepared {
            s.position_ms = position_ms;
        }
    }

    fn position_ms(&self) -> u64 {
        self.probe.0.lock().unwrap().position_ms
    }

    fn duration_ms(&self) -> u64 {
        self.probe.0.lock().unwrap().duration_ms
    }

    fn is_playing(&self) -> bool {
        self.probe.0.lock().unwrap().playing
    }

    fn stop(&mut self) {
        self.record(EngineCall::Stop).playing = false;
    }

    fn release(&mut self) {
        self.record(EngineCall::Release);
    }

    fn poll(&mut self) -> Option<EngineEvent> {
        let mut s = self.probe.0.lock().unwrap();
        if s.queued.is_empty() {
            None
        } else {
            Some(s.queued.remove(0))
        }
    }
}
