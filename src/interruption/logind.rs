use std::sync::mpsc::Sender;

use async_io::block_on;
use futures::StreamExt;
use tracing::{debug, warn};
use zbus::{Connection, proxy};

use super::Interruption;

#[proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LoginManager {
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

/// Forward logind suspend/resume as [`Interruption`]s.
///
/// Runs until `tx` is closed. Without a system bus (containers, non-systemd
/// hosts) it logs and exits, and the listener simply never fires.
pub fn spawn_logind_source(tx: Sender<Interruption>) {
    std::thread::spawn(move || {
        block_on(async move {
            let connection = match Connection::system().await {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "logind: no system bus");
                    return;
                }
            };

            let manager = match LoginManagerProxy::new(&connection).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "logind: manager unavailable");
                    return;
                }
            };

            let mut signals = match manager.receive_prepare_for_sleep().await {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "logind: cannot subscribe to PrepareForSleep");
                    return;
                }
            };

            while let Some(signal) = signals.next().await {
                let start = match signal.args() {
                    Ok(args) => *args.start(),
                    Err(e) => {
                        warn!(error = %e, "logind: malformed PrepareForSleep");
                        continue;
                    }
                };
                let event = if start {
                    Interruption::Began
                } else {
                    Interruption::Ended
                };
                debug!(?event, "logind sleep signal");
                if tx.send(event).is_err() {
                    break;
                }
            }
        });
    });
}
