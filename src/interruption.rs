//! Pauses playback when the system interrupts the user, e.g. a suspend.
//!
//! Events arrive on a channel so any source can feed the listener; the
//! desktop source is logind's `PrepareForSleep` signal (see [`spawn_logind_source`]).

mod logind;

use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::host::SessionHost;

pub use logind::spawn_logind_source;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Interruption {
    Began,
    Ended,
}

/// Background thread reacting to [`Interruption`]s.
///
/// It never constructs a session: with nothing running, `Began` is ignored.
/// Playback is not resumed when the interruption ends.
pub struct InterruptionListener {
    join: Option<JoinHandle<()>>,
}

impl InterruptionListener {
    pub fn spawn(host: SessionHost, events: Receiver<Interruption>) -> Self {
        let join = thread::spawn(move || {
            for event in events {
                on_interruption(&host, event);
            }
            debug!("interruption source closed");
        });
        Self { join: Some(join) }
    }

    /// Wait for the event source to close.
    pub fn join(mut self) {
        if let Some(h) = self.join.take() {
            let _ = h.join();
        }
    }
}

fn on_interruption(host: &SessionHost, event: Interruption) {
    match event {
        Interruption::Began => {
            let Some(session) = host.session() else {
                debug!("interruption began with no session running");
                return;
            };
            info!("interruption began; pausing");
            if let Err(e) = session.pause() {
                warn!(error = %e, "could not pause for interruption");
            }
        }
        Interruption::Ended => info!("interruption ended"),
    }
}
