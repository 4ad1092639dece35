//! Supervision of remote actions that the user may interrupt.
//!
//! Every supervised call races the remote work against an interrupt. The
//! interrupt always wins a tie. On interrupt, cancellation of background work
//! is requested but not awaited: the caller gets [`ActionError::Interrupted`]
//! right away while the activities unwind on their own.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{ActionClient, ActionHandle};
use crate::error::{ActionError, ClientError};
use crate::output::OutputSink;

pub type InterruptFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Source of user interrupts. Armed once per supervised operation.
pub trait InterruptSource: Send + Sync {
    fn arm(&self) -> InterruptFuture;
}

/// Interrupts delivered by Ctrl+C.
#[derive(Debug, Default, Clone, Copy)]
pub struct CtrlC;

impl InterruptSource for CtrlC {
    fn arm(&self) -> InterruptFuture {
        Box::pin(async {
            if tokio::signal::ctrl_c().await.is_err() {
                // No signal handler available: never interrupt.
                std::future::pending::<()>().await;
            }
        })
    }
}

/// Interrupts triggered by cancelling a token.
#[derive(Debug, Default, Clone)]
pub struct TokenInterrupt(pub CancellationToken);

impl InterruptSource for TokenInterrupt {
    fn arm(&self) -> InterruptFuture {
        Box::pin(self.0.clone().cancelled_owned())
    }
}

/// Counts outstanding background activities and fires once all of them finished.
#[derive(Debug)]
struct ActivityTracker {
    remaining: AtomicUsize,
    all_done: CancellationToken,
}

impl ActivityTracker {
    fn new(activities: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(activities),
            all_done: CancellationToken::new(),
        })
    }

    fn finish(&self) {
        // Only the last finisher signals, so the signal fires exactly once.
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.all_done.cancel();
        }
    }

    async fn wait(&self) {
        self.all_done.cancelled().await;
    }
}

/// Marks an activity finished when dropped, including on panic.
struct ActivityGuard(Arc<ActivityTracker>);

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Stops the spinner when the supervised call returns.
struct SpinnerGuard<'a>(&'a dyn OutputSink);

impl<'a> SpinnerGuard<'a> {
    fn start(sink: &'a dyn OutputSink, text: &str) -> Self {
        sink.set_spinner_text(text);
        sink.start_spinner();
        Self(sink)
    }
}

impl Drop for SpinnerGuard<'_> {
    fn drop(&mut self) {
        self.0.stop_spinner();
    }
}

/// Runs remote pipeline actions under interrupt supervision.
pub struct Supervisor {
    client: Arc<dyn ActionClient>,
    sink: Arc<dyn OutputSink>,
    interrupts: Arc<dyn InterruptSource>,
    log_drain: Duration,
}

impl Supervisor {
    pub fn new(
        client: Arc<dyn ActionClient>,
        sink: Arc<dyn OutputSink>,
        interrupts: Arc<dyn InterruptSource>,
    ) -> Self {
        Self {
            client,
            sink,
            interrupts,
            log_drain: Duration::from_secs(5),
        }
    }

    /// How long the log stream may keep running once the action has finished.
    pub fn with_log_drain(mut self, log_drain: Duration) -> Self {
        self.log_drain = log_drain;
        self
    }

    pub fn sink(&self) -> &Arc<dyn OutputSink> {
        &self.sink
    }

    /// Schedule the destruction of pipeline `name`.
    pub async fn destroy(
        &self,
        name: &str,
        destroy_volumes: bool,
    ) -> Result<ActionHandle, ActionError> {
        let _spinner = SpinnerGuard::start(
            self.sink.as_ref(),
            &format!("Destroying pipeline '{}'...", name),
        );
        let interrupt = self.interrupts.arm();

        let (exit_tx, exit_rx) = oneshot::channel();
        let client = Arc::clone(&self.client);
        let owned_name = name.to_string();
        tokio::spawn(async move {
            let result = client
                .destroy(&owned_name, destroy_volumes)
                .await
                .map_err(|err| {
                    ActionError::failed(format!("destroy pipeline '{}'", owned_name), err)
                });
            // The receiver is gone if the caller was interrupted.
            let _ = exit_tx.send(result);
        });

        tokio::select! {
            biased;
            _ = interrupt => {
                info!("CTRL+C received, starting shutdown sequence");
                self.sink.stop_spinner();
                Err(ActionError::Interrupted)
            }
            result = exit_rx => match result {
                Ok(Ok(handle)) => Ok(handle),
                Ok(Err(err)) => {
                    info!("exit signal received due to error: {}", err);
                    Err(err)
                }
                Err(_) => Err(ActionError::failed(
                    format!("destroy pipeline '{}'", name),
                    lost_result("destroy"),
                )),
            },
        }
    }

    /// Wait for `action` to finish while streaming its logs.
    ///
    /// Log streaming is best effort: its failures become warnings. The wait
    /// itself is bounded by `timeout` (zero waits forever).
    pub async fn wait_until_finished(
        &self,
        name: &str,
        namespace: &str,
        action: &ActionHandle,
        timeout: Duration,
    ) -> Result<(), ActionError> {
        let cancel = CancellationToken::new();
        let _cancel_on_return = cancel.clone().drop_guard();
        let _spinner = SpinnerGuard::start(
            self.sink.as_ref(),
            &format!("Waiting for the pipeline '{}' to be destroyed...", name),
        );
        let mut interrupt = self.interrupts.arm();

        let tracker = ActivityTracker::new(2);
        let (exit_tx, mut exit_rx) = oneshot::channel::<Result<(), ClientError>>();

        {
            let guard = ActivityGuard(Arc::clone(&tracker));
            let client = Arc::clone(&self.client);
            let sink = Arc::clone(&self.sink);
            let cancel = cancel.clone();
            let (name, namespace, action) =
                (name.to_string(), namespace.to_string(), action.name.clone());
            tokio::spawn(async move {
                let _guard = guard;
                if let Err(err) = client
                    .stream_logs(&cancel, &name, &namespace, &action)
                    .await
                {
                    sink.warning(&format!(
                        "there was an error streaming pipeline logs: {}",
                        err
                    ));
                }
            });
        }

        {
            let guard = ActivityGuard(Arc::clone(&tracker));
            let client = Arc::clone(&self.client);
            let cancel = cancel.clone();
            let (name, namespace, action) =
                (name.to_string(), namespace.to_string(), action.name.clone());
            tokio::spawn(async move {
                let _guard = guard;
                let result = client
                    .wait_for_action_to_finish(&cancel, &name, &namespace, &action, timeout)
                    .await;
                let _ = exit_tx.send(result);
            });
        }

        let outcome = tokio::select! {
            biased;
            _ = &mut interrupt => return Err(self.interrupted(&cancel)),
            result = &mut exit_rx => result.unwrap_or_else(|_| Err(lost_result("wait"))),
        };

        tokio::select! {
            biased;
            _ = &mut interrupt => return Err(self.interrupted(&cancel)),
            _ = tracker.wait() => {}
            _ = tokio::time::sleep(self.log_drain) => {
                debug!("log stream still running after the action finished, cancelling it");
                cancel.cancel();
            }
        }

        outcome.map_err(|err| {
            info!("exit signal received due to error: {}", err);
            ActionError::failed(format!("wait for pipeline '{}'", name), err)
        })
    }

    fn interrupted(&self, cancel: &CancellationToken) -> ActionError {
        cancel.cancel();
        info!("CTRL+C received, starting shutdown sequence");
        self.sink.stop_spinner();
        ActionError::Interrupted
    }
}

fn lost_result(operation: &str) -> ClientError {
    ClientError::Remote {
        operation: operation.to_string(),
        message: "task ended without reporting a result".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;

    use super::*;
    use crate::output::testing::{RecordingSink, SinkCall};

    /// Scripted client: each call sleeps for its delay, then returns its outcome.
    #[derive(Default)]
    struct FakeClient {
        destroy_delay: Duration,
        destroy_not_found: bool,
        wait_delay: Duration,
        wait_timeout: bool,
        /// `None` streams until cancelled.
        stream_for: Option<Duration>,
        stream_fails: bool,
        stream_cancel_observed: AtomicBool,
        wait_cancel_observed: AtomicBool,
    }

    #[async_trait]
    impl ActionClient for FakeClient {
        async fn destroy(
            &self,
            name: &str,
            _destroy_volumes: bool,
        ) -> Result<ActionHandle, ClientError> {
            tokio::time::sleep(self.destroy_delay).await;
            if self.destroy_not_found {
                return Err(ClientError::NotFound);
            }
            Ok(ActionHandle::new(format!("destroy-{}", name)))
        }

        async fn wait_for_action_to_finish(
            &self,
            cancel: &CancellationToken,
            _name: &str,
            _namespace: &str,
            _action: &str,
            timeout: Duration,
        ) -> Result<(), ClientError> {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.wait_cancel_observed.store(true, Ordering::SeqCst);
                    Ok(())
                }
                _ = tokio::time::sleep(self.wait_delay) => {
                    if self.wait_timeout {
                        Err(ClientError::Timeout(timeout))
                    } else {
                        Ok(())
                    }
                }
            }
        }

        async fn stream_logs(
            &self,
            cancel: &CancellationToken,
            _name: &str,
            _namespace: &str,
            _action: &str,
        ) -> Result<(), ClientError> {
            let run_for = self.stream_for.unwrap_or(Duration::from_secs(3600));
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.stream_cancel_observed.store(true, Ordering::SeqCst);
                    Ok(())
                }
                _ = tokio::time::sleep(run_for) => {
                    if self.stream_fails {
                        Err(ClientError::Remote {
                            operation: "logs".into(),
                            message: "connection reset".into(),
                        })
                    } else {
                        Ok(())
                    }
                }
            }
        }
    }

    fn supervisor(
        client: Arc<FakeClient>,
        interrupt: CancellationToken,
    ) -> (Arc<RecordingSink>, Supervisor) {
        let sink = Arc::new(RecordingSink::default());
        let supervisor = Supervisor::new(client, sink.clone(), Arc::new(TokenInterrupt(interrupt)))
            .with_log_drain(Duration::from_millis(200));
        (sink, supervisor)
    }

    async fn eventually(flag: &AtomicBool) -> bool {
        for _ in 0..100 {
            if flag.load(Ordering::SeqCst) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[test]
    fn test_tracker_fires_once_after_all_finish() {
        let tracker = ActivityTracker::new(2);
        tracker.finish();
        assert!(!tracker.all_done.is_cancelled());
        tracker.finish();
        assert!(tracker.all_done.is_cancelled());
    }

    #[test]
    fn test_activity_guard_finishes_on_drop() {
        let tracker = ActivityTracker::new(1);
        drop(ActivityGuard(Arc::clone(&tracker)));
        assert!(tracker.all_done.is_cancelled());
    }

    #[tokio::test]
    async fn test_destroy_completes() {
        let (sink, supervisor) =
            supervisor(Arc::new(FakeClient::default()), CancellationToken::new());

        let handle = supervisor.destroy("api", false).await.expect("destroyed");
        assert_eq!(handle.name, "destroy-api");
        let calls = sink.calls();
        assert_eq!(calls[0], SinkCall::Text("Destroying pipeline 'api'...".into()));
        assert_eq!(calls[1], SinkCall::Start);
        assert_eq!(calls.last(), Some(&SinkCall::Stop));
    }

    #[tokio::test]
    async fn test_destroy_failure_names_operation() {
        let client = Arc::new(FakeClient {
            destroy_not_found: true,
            ..FakeClient::default()
        });
        let (_sink, supervisor) = supervisor(client, CancellationToken::new());

        let err = supervisor.destroy("api", true).await.expect_err("not found");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "failed to destroy pipeline 'api': not found");
    }

    #[tokio::test]
    async fn test_destroy_interrupted_before_result() {
        let client = Arc::new(FakeClient {
            destroy_delay: Duration::from_millis(50),
            ..FakeClient::default()
        });
        let interrupt = CancellationToken::new();
        interrupt.cancel();
        let (sink, supervisor) = supervisor(client, interrupt);

        let err = supervisor.destroy("api", false).await.expect_err("interrupted");
        assert!(err.is_interrupted());
        assert!(sink.calls().contains(&SinkCall::Stop));

        // The destroy task finishes later and sends into a dropped receiver.
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_wait_completes_after_both_activities() {
        let client = Arc::new(FakeClient {
            wait_delay: Duration::from_millis(20),
            stream_for: Some(Duration::from_millis(40)),
            ..FakeClient::default()
        });
        let (sink, supervisor) = supervisor(client.clone(), CancellationToken::new());

        supervisor
            .wait_until_finished("api", "default", &ActionHandle::new("a1"), Duration::from_secs(5))
            .await
            .expect("finished");
        assert!(!client.stream_cancel_observed.load(Ordering::SeqCst));
        assert!(sink.warnings().is_empty());
        assert_eq!(
            sink.texts(),
            vec!["Waiting for the pipeline 'api' to be destroyed...".to_string()]
        );
    }

    #[tokio::test]
    async fn test_wait_cancels_lingering_log_stream() {
        let client = Arc::new(FakeClient {
            wait_delay: Duration::from_millis(10),
            stream_for: None,
            ..FakeClient::default()
        });
        let (_sink, supervisor) = supervisor(client.clone(), CancellationToken::new());

        supervisor
            .wait_until_finished("api", "default", &ActionHandle::new("a1"), Duration::ZERO)
            .await
            .expect("finished");
        assert!(eventually(&client.stream_cancel_observed).await);
    }

    #[tokio::test]
    async fn test_wait_timeout_is_plain_failure() {
        let client = Arc::new(FakeClient {
            wait_timeout: true,
            stream_for: Some(Duration::ZERO),
            ..FakeClient::default()
        });
        let (_sink, supervisor) = supervisor(client, CancellationToken::new());

        let err = supervisor
            .wait_until_finished("api", "default", &ActionHandle::new("a1"), Duration::from_secs(7))
            .await
            .expect_err("timed out");
        assert!(!err.is_interrupted());
        assert!(err.to_string().contains("timed out after 7s"));
    }

    #[tokio::test]
    async fn test_log_stream_failure_is_a_warning() {
        let client = Arc::new(FakeClient {
            wait_delay: Duration::from_millis(30),
            stream_for: Some(Duration::ZERO),
            stream_fails: true,
            ..FakeClient::default()
        });
        let (sink, supervisor) = supervisor(client, CancellationToken::new());

        supervisor
            .wait_until_finished("api", "default", &ActionHandle::new("a1"), Duration::ZERO)
            .await
            .expect("stream failure does not fail the wait");
        assert_eq!(
            sink.warnings(),
            vec!["there was an error streaming pipeline logs: logs failed: connection reset"
                .to_string()]
        );
    }

    #[tokio::test]
    async fn test_wait_interrupt_requests_cancellation_without_awaiting_it() {
        let client = Arc::new(FakeClient {
            wait_delay: Duration::from_secs(3600),
            stream_for: None,
            ..FakeClient::default()
        });
        let interrupt = CancellationToken::new();
        let (sink, supervisor) = supervisor(client.clone(), interrupt.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            interrupt.cancel();
        });
        let err = supervisor
            .wait_until_finished("api", "default", &ActionHandle::new("a1"), Duration::ZERO)
            .await
            .expect_err("interrupted");
        trigger.await.expect("trigger task");

        assert!(err.is_interrupted());
        assert!(sink.calls().contains(&SinkCall::Stop));
        // Cancellation was requested; both activities observe it eventually.
        assert!(eventually(&client.stream_cancel_observed).await);
        assert!(eventually(&client.wait_cancel_observed).await);
    }

    #[tokio::test]
    async fn test_interrupt_wins_over_ready_result() {
        let interrupt = CancellationToken::new();
        interrupt.cancel();
        let client = Arc::new(FakeClient {
            stream_for: Some(Duration::ZERO),
            ..FakeClient::default()
        });
        let (_sink, supervisor) = supervisor(client, interrupt);

        let err = supervisor
            .wait_until_finished("api", "default", &ActionHandle::new("a1"), Duration::ZERO)
            .await
            .expect_err("interrupt has priority");
        assert!(err.is_interrupted());
    }
}
