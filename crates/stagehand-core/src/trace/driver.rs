use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Trace;
use crate::config::TraceSettings;
use crate::error::TraceError;
use crate::events::StatusEvent;
use crate::output::{OutputMode, OutputSink};

/// Consume status events until the channel closes, a fatal error occurs or
/// `cancel` fires.
///
/// Each batch is applied, rendered and pruned in that order. The spinner is
/// running for the whole call and stopped before returning.
pub async fn follow(
    mut events: mpsc::Receiver<StatusEvent>,
    mode: OutputMode,
    sink: Arc<dyn OutputSink>,
    settings: TraceSettings,
    cancel: CancellationToken,
) -> Result<(), TraceError> {
    let period = settings.heartbeat();
    let mut heartbeat = interval_at(Instant::now() + period, period);

    sink.set_spinner_text("Synchronizing context...");
    sink.start_spinner();

    let mut trace = Trace::new(Arc::clone(&sink), settings);
    let result = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break Err(TraceError::Cancelled),
            _ = heartbeat.tick() => {
                debug!("still waiting for status events ({} steps tracked)", trace.registry().len());
            }
            event = events.recv() => {
                let Some(event) = event else {
                    break trace.take_terminal_error().map_or(Ok(()), Err);
                };
                if let Err(err) = trace.update(&event) {
                    break Err(err);
                }
                if let Err(err) = trace.display(mode) {
                    break Err(err);
                }
                trace.remove_completed_steps();
                if let Some(err) = trace.take_terminal_error() {
                    break Err(err);
                }
            }
        }
    };

    sink.stop_spinner();
    result
}

/// Read newline-delimited JSON status events and forward them to `tx`.
///
/// Lines that are not UTF-8 or fail to decode are skipped. Returns the
/// number of events forwarded; stops early once the receiver is gone.
pub async fn forward_json_lines<R>(reader: R, tx: mpsc::Sender<StatusEvent>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.split(b'\n');
    let mut forwarded = 0;
    while let Some(raw) = lines.next_segment().await? {
        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line.trim(),
            Err(err) => {
                debug!("skipping status event that is not valid UTF-8: {}", err);
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        let event = match StatusEvent::from_json_line(line) {
            Ok(event) => event,
            Err(err) => {
                debug!("skipping undecodable status event: {}", err);
                continue;
            }
        };
        if tx.send(event).await.is_err() {
            break;
        }
        forwarded += 1;
    }
    Ok(forwarded)
}
