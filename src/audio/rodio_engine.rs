use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tracing::{debug, warn};

use super::engine::{
    EngineError, EngineEvent, EngineFault, EventSink, Generation, PlaybackEngine,
};
use super::source::{FileSource, open_source, probe};

struct Prepared {
    generation: Generation,
    source: FileSource,
    duration: Option<Duration>,
}

/// [`PlaybackEngine`] over the default rodio output device.
///
/// Decoding for `prepare_async` happens on a short-lived worker thread; the
/// decoded source is parked in a slot until `start` attaches it to a sink.
/// The output stream is not `Send`, so the engine must be built on the thread
/// that will drive it.
pub struct RodioEngine {
    stream: Option<OutputStream>,
    events: EventSink,
    locator: Option<PathBuf>,
    generation: Option<Generation>,
    prepared: Arc<Mutex<Option<Prepared>>>,
    sink: Option<Sink>,
    duration: Option<Duration>,
    last_pos: Duration,
    finished: bool,
}

impl RodioEngine {
    pub fn open(events: EventSink) -> Result<Self, EngineError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| EngineError::Output(e.to_string()))?;
        // rodio logs to stderr when the stream is dropped, which would land
        // on top of the terminal UI.
        stream.log_on_drop(false);

        Ok(Self {
            stream: Some(stream),
            events,
            locator: None,
            generation: None,
            prepared: Arc::new(Mutex::new(None)),
            sink: None,
            duration: None,
            last_pos: Duration::ZERO,
            finished: false,
        })
    }

    fn take_prepared(&self) -> Option<Prepared> {
        let mut slot = self.prepared.lock().ok()?;
        match slot.take() {
            Some(p) if Some(p.generation) == self.generation => Some(p),
            Some(stale) => {
                debug!(generation = %stale.generation, "dropping stale prepared source");
                None
            }
            None => None,
        }
    }
}

impl PlaybackEngine for RodioEngine {
    fn reset(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        if let Ok(mut slot) = self.prepared.lock() {
            *slot = None;
        }
        self.locator = None;
        self.generation = None;
        self.duration = None;
        self.last_pos = Duration::ZERO;
        self.finished = false;
    }

    fn load(&mut self, locator: &Path) -> Result<(), EngineError> {
        probe(locator)?;
        self.locator = Some(locator.to_path_buf());
        Ok(())
    }

    fn prepare_async(&mut self, generation: Generation) {
        let Some(path) = self.locator.clone() else {
            (self.events)(EngineEvent::Error {
                generation,
                fault: EngineFault::NotLoaded,
            });
            return;
        };
        self.generation = Some(generation);

        let slot = self.prepared.clone();
        let events = self.events.clone();
        thread::spawn(move || match open_source(&path) {
            Ok((source, duration)) => {
                if let Ok(mut slot) = slot.lock() {
                    // A slower worker for an older request must not clobber a newer one.
                    if slot.as_ref().is_none_or(|p| p.generation < generation) {
                        *slot = Some(Prepared {
                            generation,
                            source,
                            duration,
                        });
                    }
                }
                events(EngineEvent::Prepared { generation });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "prepare failed");
                events(EngineEvent::Error {
                    generation,
                    fault: e.fault(),
                });
            }
        });
    }

    fn start(&mut self) {
        if let Some(sink) = self.sink.as_ref() {
            sink.play();
            return;
        }
        let Some(stream) = self.stream.as_ref() else {
            return;
        };
        let Some(prepared) = self.take_prepared() else {
            debug!("start ignored: nothing prepared");
            return;
        };

        let sink = Sink::connect_new(stream.mixer());
        sink.append(prepared.source);
        sink.play();
        self.duration = prepared.duration;
        self.last_pos = Duration::ZERO;
        self.finished = false;
        self.sink = Some(sink);
    }

    fn pause(&mut self) {
        if let Some(sink) = self.sink.as_ref() {
            sink.pause();
            self.last_pos = sink.get_pos();
        }
    }

    fn seek_to(&mut self, position_ms: u64) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        let target = Duration::from_millis(position_ms);
        match sink.try_seek(target) {
            Ok(()) => self.last_pos = target,
            Err(e) => warn!(error = %e, "seek failed"),
        }
    }

    fn position_ms(&self) -> u64 {
        let pos = match self.sink.as_ref() {
            Some(sink) if !self.finished => sink.get_pos(),
            _ => self.last_pos,
        };
        pos.as_millis() as u64
    }

    fn duration_ms(&self) -> u64 {
        self.duration.map_or(0, |d| d.as_millis() as u64)
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|s| !s.is_paused() && !s.empty())
    }

    fn stop(&mut self) {
        self.reset();
    }

    fn release(&mut self) {
        self.reset();
        self.stream = None;
    }

    fn poll(&mut self) -> Option<EngineEvent> {
        if self.finished {
            return None;
        }
        let sink = self.sink.as_ref()?;
        if sink.is_paused() {
            return None;
        }
        if !sink.empty() {
            self.last_pos = sink.get_pos();
            return None;
        }

        self.finished = true;
        Some(EngineEvent::Completed {
            generation: self.generation?,
            position_ms: self.last_pos.as_millis() as u64,
        })
    }
}
