//! The echo pipeline.
//!
//! One exchange is `accept -> read -> write -> close`, written as a single
//! railway chain. The listener is built the same way and closed once after
//! the last exchange. Connections are served strictly one at a time.

use crate::config::{Config, ServeMode};
use crate::protocol;
use crate::socket::{Closed, Handle, Listener, ReadOutcome, SocketError};
use bytes::Bytes;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pause after the first failed exchange; doubles per consecutive failure.
const BACKOFF_BASE: Duration = Duration::from_millis(10);

/// Longest pause between failed exchanges.
const BACKOFF_MAX: Duration = Duration::from_secs(1);

/// What a call to [`serve`] got through.
#[derive(Debug, Default, PartialEq)]
pub struct ServeReport {
    /// Exchanges that completed.
    pub served: usize,
    /// Per-connection failures, in order.
    pub errors: Vec<SocketError>,
}

/// Server instance
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Server { config }
    }

    /// create -> bind -> listen, as configured.
    pub fn listen(&self) -> Handle<Listener> {
        Handle::<Listener>::create()
            .bind(self.config.port, &self.config.host)
            .listen(self.config.backlog)
    }

    /// Listen and serve according to the configured mode.
    ///
    /// In loop mode this only returns if the listener itself fails.
    pub fn run(&self) -> Result<ServeReport, SocketError> {
        let listener = self.listen();

        match listener.local_address() {
            Handle::Ready(addr) => {
                info!(address = %addr, mode = ?self.config.mode, "Server listening");
            }
            Handle::Failed(err) if listener.is_ready() => {
                warn!(error = %err, "Local address unavailable");
            }
            // serve reports the listener's own error
            Handle::Failed(_) => {}
        }

        let limit = match self.config.mode {
            ServeMode::Once => Some(1),
            ServeMode::Loop => None,
        };
        serve(listener, self.config.buffer_size, limit)
    }
}

/// Serve up to `limit` connections (forever if `None`), then close the
/// listener.
///
/// A failure on one connection is logged and recorded in the report, and
/// serving continues after a short pause that grows while failures repeat.
/// A failed listener ends serving at once and its error is returned.
pub fn serve(
    listener: Handle<Listener>,
    buffer_size: usize,
    limit: Option<usize>,
) -> Result<ServeReport, SocketError> {
    let mut report = ServeReport::default();
    let mut attempts = 0;
    let mut consecutive_failures = 0;

    while limit.map_or(true, |max| attempts < max) {
        if consecutive_failures > 0 {
            thread::sleep(backoff(consecutive_failures));
        }
        attempts += 1;

        match exchange(&listener, buffer_size).into_result() {
            Ok(closed) => {
                report.served += 1;
                consecutive_failures = 0;
                debug!(fd = closed.fd(), served = report.served, "Exchange complete");
            }
            Err(_) if listener.is_failed() => break,
            Err(err) => {
                consecutive_failures += 1;
                warn!(error = %err, consecutive_failures, "Connection failed");
                report.errors.push(err);
            }
        }
    }

    let closed = listener.close().into_result()?;
    debug!(fd = closed.fd(), "Listener closed");
    Ok(report)
}

fn backoff(consecutive_failures: u32) -> Duration {
    let doublings = consecutive_failures.saturating_sub(1).min(16);
    BACKOFF_BASE.saturating_mul(1 << doublings).min(BACKOFF_MAX)
}

/// Accept one peer, answer its first line, and close it.
fn exchange(listener: &Handle<Listener>, buffer_size: usize) -> Handle<Closed> {
    listener
        .accept_with(|conn| {
            info!(peer = %conn.peer(), "Accepted a connection");
            Handle::Ready(conn)
        })
        .read_with(buffer_size, |conn, outcome| {
            let request = match outcome {
                ReadOutcome::Data(request) => request,
                ReadOutcome::Closed => {
                    debug!(peer = %conn.peer(), "Peer closed without sending");
                    Bytes::new()
                }
            };
            Handle::Ready(conn).write(&protocol::respond(&request))
        })
        .close()
}
