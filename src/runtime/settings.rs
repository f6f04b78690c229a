use crate::config;

/// Load settings, falling back to defaults when the file is missing or bad.
///
/// Runs before logging is set up, so problems go to stderr.
pub fn load_settings() -> config::Settings {
    match config::Settings::load() {
        Ok(s) => match s.validate() {
            Ok(()) => s,
            Err(msg) => {
                eprintln!("lilt: invalid config, using defaults: {msg}");
                config::Settings::default()
            }
        },
        Err(e) => {
            eprintln!("lilt: failed to load config, using defaults: {e}");
            config::Settings::default()
        }
    }
}
