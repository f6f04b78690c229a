use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod audio;
mod config;
mod error;
mod host;
mod interruption;
mod library;
mod mpris;
mod runtime;
mod session;
mod ui;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = runtime::load_settings();
    init_tracing(&settings);
    runtime::run(settings)
}

/// Log to a file; the terminal belongs to the UI.
fn init_tracing(settings: &config::Settings) {
    let Some(path) = settings.log_path() else {
        eprintln!("lilt: no place for a log file (HOME unset), logging disabled");
        return;
    };
    if let Some(dir) = path.parent() {
        let _ = fs::create_dir_all(dir);
    }
    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!(
                "lilt: cannot open log file {}: {e}; logging disabled",
                path.display()
            );
            return;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log.filter.as_str()));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init();
}
