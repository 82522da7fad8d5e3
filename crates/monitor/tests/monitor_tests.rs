//! Integration tests for the threshold monitor.
//!
//! Drives the full monitor loop — baseline, polling, drift correction,
//! breach handling, shutdown — against a scripted in-process executor.
//! No sockets are involved; timer-driven scenarios run under tokio's
//! paused clock so intervals elapse instantly and deterministically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use axon_core::config::MonitorConfig;
use axon_monitor::{start, MonitorEvent, StartError};
use axon_proto::client::{ClientOptions, CorrelationClient};
use axon_proto::executor::{ExecutorError, RequestExecutor};
use axon_proto::message::{Body, Envelope, Header, ParamValue, RESPONSE_OK};

// ---------------------------------------------------------------------------
// Scripted executor + responder
// ---------------------------------------------------------------------------

/// Executor double that forwards every dispatched frame to the test's
/// responder task.
struct ScriptedExecutor {
    outbox: mpsc::UnboundedSender<Vec<u8>>,
    fail_open: bool,
}

#[async_trait]
impl RequestExecutor for ScriptedExecutor {
    async fn open(&self) -> Result<(), ExecutorError> {
        if self.fail_open {
            return Err(ExecutorError::Connection("backend unreachable".into()));
        }
        Ok(())
    }

    async fn dispatch(&self, frame: Vec<u8>) -> Result<(), ExecutorError> {
        self.outbox
            .send(frame)
            .map_err(|_| ExecutorError::Dispatch("responder gone".into()))
    }

    async fn close(&self) {}
}

/// One scripted answer to a `get_value` request.
enum Reply {
    /// Respond with the given response code and `(name, value)` pairs.
    Values(i32, Vec<(&'static str, &'static str)>),
    /// Leave the request hanging with no response at all.
    Silent,
}

/// Per-test script: queued `get_value` replies plus a record of every
/// reset command received.
struct Script {
    replies: Mutex<VecDeque<Reply>>,
    resets: Mutex<Vec<(i32, i32)>>,
    get_requests: AtomicUsize,
}

impl Script {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            resets: Mutex::new(Vec::new()),
            get_requests: AtomicUsize::new(0),
        })
    }

    fn reset_commands(&self) -> Vec<(i32, i32)> {
        self.resets.lock().unwrap().clone()
    }

    fn get_request_count(&self) -> usize {
        self.get_requests.load(Ordering::SeqCst)
    }
}

/// Answer requests from the monitor according to the script. Reset
/// commands are always acknowledged with success and recorded.
fn spawn_responder(
    mut inbox: mpsc::UnboundedReceiver<Vec<u8>>,
    client: Arc<CorrelationClient>,
    script: Arc<Script>,
) {
    tokio::spawn(async move {
        while let Some(frame) = inbox.recv().await {
            let request = Envelope::decode(&frame).expect("monitor sent malformed frame");
            match request.body {
                Body::GetValue { .. } => {
                    script.get_requests.fetch_add(1, Ordering::SeqCst);
                    let reply = script
                        .replies
                        .lock()
                        .unwrap()
                        .pop_front()
                        .unwrap_or(Reply::Silent);
                    match reply {
                        Reply::Values(code, values) => {
                            let _ = client.deliver(&respond(&request.header, code, values));
                        }
                        Reply::Silent => {}
                    }
                }
                Body::Reset {
                    delay_seconds,
                    reset_type,
                } => {
                    script
                        .resets
                        .lock()
                        .unwrap()
                        .push((delay_seconds, reset_type));
                    let ack = Envelope {
                        header: response_header(&request.header, RESPONSE_OK),
                        body: Body::Reset {
                            delay_seconds,
                            reset_type,
                        },
                    };
                    let _ = client.deliver(&ack.encode().unwrap());
                }
                Body::GetValueResponse { .. } => {
                    panic!("monitor should never send a response variant")
                }
            }
        }
    });
}

fn response_header(request: &Header, code: i32) -> Header {
    Header {
        correlation_id: request.correlation_id,
        caller_id: "datamodel".into(),
        response_address: String::new(),
        response_port: 0,
        more: false,
        response_code: code,
    }
}

fn respond(request: &Header, code: i32, values: Vec<(&'static str, &'static str)>) -> Vec<u8> {
    let envelope = Envelope {
        header: response_header(request, code),
        body: Body::GetValueResponse {
            param_values: values
                .into_iter()
                .map(|(name, value)| ParamValue {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
        },
    };
    envelope.encode().unwrap()
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Running {
    handle: axon_monitor::MonitorHandle,
    script: Arc<Script>,
    events: broadcast::Receiver<MonitorEvent>,
}

/// Start a monitor wired to a scripted responder.
async fn start_scripted(
    config: MonitorConfig,
    options: ClientOptions,
    replies: Vec<Reply>,
) -> Running {
    let (outbox, inbox) = mpsc::unbounded_channel();
    let executor = Arc::new(ScriptedExecutor {
        outbox,
        fail_open: false,
    });

    let handle = start(config, executor, options)
        .await
        .expect("monitor should start");
    let events = handle.subscribe();

    let script = Script::new(replies);
    spawn_responder(inbox, handle.client().clone(), script.clone());

    Running {
        handle,
        script,
        events,
    }
}

/// Receive the next monitor event, guarded so a wrong script fails the
/// test instead of hanging it.
async fn next_event(events: &mut broadcast::Receiver<MonitorEvent>) -> MonitorEvent {
    tokio::time::timeout(Duration::from_secs(600), events.recv())
        .await
        .expect("timed out waiting for monitor event")
        .expect("event channel closed")
}

fn test_config() -> MonitorConfig {
    MonitorConfig::new(
        Duration::from_secs(30),
        150,
        "Device.Ethernet.Interface.*.Stats.ErrorsSent",
    )
}

// ---------------------------------------------------------------------------
// Test: breach fires the corrective action, polling continues
// ---------------------------------------------------------------------------

/// The canonical scenario end to end: baseline 10, sample 130 (corrected
/// 120, under the 150 threshold), sample 50 (read as a counter reset,
/// corrected 160 — breach), sample 60 (corrected 210 — breach again).
/// Each breach observation fires exactly one reset, and the corrected
/// total keeps accumulating rather than being cleared by the action.
#[tokio::test(start_paused = true)]
async fn breach_fires_reset_and_polling_continues() {
    let mut running = start_scripted(
        test_config(),
        ClientOptions::default(),
        vec![
            Reply::Values(RESPONSE_OK, vec![("t", "10")]),
            Reply::Values(RESPONSE_OK, vec![("t", "130")]),
            Reply::Values(RESPONSE_OK, vec![("t", "50")]),
            Reply::Values(RESPONSE_OK, vec![("t", "60")]),
        ],
    )
    .await;

    assert_matches!(
        next_event(&mut running.events).await,
        MonitorEvent::BaselineCaptured { baseline: 10, .. }
    );

    // Cycle 1 stays under the threshold: no event. Cycle 2 breaches.
    assert_matches!(
        next_event(&mut running.events).await,
        MonitorEvent::ThresholdBreached {
            corrected: 160,
            threshold: 150,
            ..
        }
    );
    assert_matches!(
        next_event(&mut running.events).await,
        MonitorEvent::ResetRequested { .. }
    );

    // Cycle 3: the corrected total was not cleared by the action, so it
    // keeps growing and breaches again.
    assert_matches!(
        next_event(&mut running.events).await,
        MonitorEvent::ThresholdBreached { corrected: 210, .. }
    );
    assert_matches!(
        next_event(&mut running.events).await,
        MonitorEvent::ResetRequested { .. }
    );

    assert_eq!(running.script.reset_commands(), vec![(0, 0), (0, 0)]);

    running.handle.stop().await;
}

// ---------------------------------------------------------------------------
// Test: failed cycles are skipped without touching state
// ---------------------------------------------------------------------------

/// A nonzero response code skips the cycle: no breach, no reset, state
/// unchanged. The next successful cycle proceeds normally.
#[tokio::test(start_paused = true)]
async fn nonzero_response_code_skips_cycle() {
    let config = MonitorConfig::new(Duration::from_secs(30), 100, "Device.X.Count");
    let mut running = start_scripted(
        config,
        ClientOptions::default(),
        vec![
            Reply::Values(RESPONSE_OK, vec![("t", "0")]),
            Reply::Values(9005, vec![]),
            Reply::Values(RESPONSE_OK, vec![("t", "500")]),
        ],
    )
    .await;

    assert_matches!(
        next_event(&mut running.events).await,
        MonitorEvent::BaselineCaptured { baseline: 0, .. }
    );

    let skipped = next_event(&mut running.events).await;
    match skipped {
        MonitorEvent::CycleSkipped { reason, .. } => {
            assert!(reason.contains("9005"), "reason was: {reason}");
        }
        other => panic!("Expected CycleSkipped, got {other:?}"),
    }
    // The failed cycle must not have fired the action.
    assert!(running.script.reset_commands().is_empty());

    // Next cycle recovers and sees the breach.
    assert_matches!(
        next_event(&mut running.events).await,
        MonitorEvent::ThresholdBreached { corrected: 500, .. }
    );
    assert_matches!(
        next_event(&mut running.events).await,
        MonitorEvent::ResetRequested { .. }
    );
    assert_eq!(running.script.reset_commands().len(), 1);

    running.handle.stop().await;
}

// ---------------------------------------------------------------------------
// Test: baseline failure degrades to zero
// ---------------------------------------------------------------------------

/// A failed baseline query is non-fatal: the monitor starts counting
/// from zero and keeps polling.
#[tokio::test(start_paused = true)]
async fn failed_baseline_degrades_to_zero() {
    let config = MonitorConfig::new(Duration::from_secs(30), 10, "Device.X.Count");
    let mut running = start_scripted(
        config,
        ClientOptions::default(),
        vec![
            Reply::Values(9001, vec![]),
            Reply::Values(RESPONSE_OK, vec![("t", "42")]),
        ],
    )
    .await;

    assert_matches!(
        next_event(&mut running.events).await,
        MonitorEvent::BaselineCaptured { baseline: 0, .. }
    );
    assert_matches!(
        next_event(&mut running.events).await,
        MonitorEvent::ThresholdBreached { corrected: 42, .. }
    );

    running.handle.stop().await;
}

// ---------------------------------------------------------------------------
// Test: unparsable instance values aggregate as zero
// ---------------------------------------------------------------------------

/// Garbage values from individual instances parse to zero and flow
/// through the average: ("garbage", "10") averages to 5.
#[tokio::test(start_paused = true)]
async fn unparsable_values_aggregate_as_zero() {
    let config = MonitorConfig::new(Duration::from_secs(30), 4, "Device.X.*.Count");
    let mut running = start_scripted(
        config,
        ClientOptions::default(),
        vec![
            Reply::Values(RESPONSE_OK, vec![("a", "0"), ("b", "0")]),
            Reply::Values(RESPONSE_OK, vec![("a", "garbage"), ("b", "10")]),
        ],
    )
    .await;

    assert_matches!(
        next_event(&mut running.events).await,
        MonitorEvent::BaselineCaptured { baseline: 0, .. }
    );
    assert_matches!(
        next_event(&mut running.events).await,
        MonitorEvent::ThresholdBreached { corrected: 5, .. }
    );

    running.handle.stop().await;
}

// ---------------------------------------------------------------------------
// Test: stop during an in-flight poll returns promptly
// ---------------------------------------------------------------------------

/// Stopping while a poll request is awaiting its response must not
/// hang until the reply timeout: the cancellation token interrupts the
/// wait and `stop` returns well inside the 60-second reply bound.
#[tokio::test(start_paused = true)]
async fn stop_during_in_flight_poll_returns_promptly() {
    let config = MonitorConfig::new(Duration::from_secs(5), 100, "Device.X.Count");
    let options = ClientOptions {
        reply_timeout: Duration::from_secs(60),
        ..ClientOptions::default()
    };
    let mut running = start_scripted(
        config,
        options,
        vec![Reply::Values(RESPONSE_OK, vec![("t", "0")]), Reply::Silent],
    )
    .await;

    assert_matches!(
        next_event(&mut running.events).await,
        MonitorEvent::BaselineCaptured { .. }
    );

    // Wait until the first poll request is actually in flight.
    while running.script.get_request_count() < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let before = tokio::time::Instant::now();
    running.handle.stop().await;
    assert!(
        before.elapsed() < Duration::from_secs(60),
        "stop waited out the reply timeout"
    );

    // The terminal event must have been emitted.
    loop {
        match next_event(&mut running.events).await {
            MonitorEvent::Stopped { .. } => break,
            _ => continue,
        }
    }
}

// ---------------------------------------------------------------------------
// Test: startup failures
// ---------------------------------------------------------------------------

/// A transport that cannot be opened aborts startup entirely.
#[tokio::test]
async fn start_fails_when_transport_cannot_open() {
    let (outbox, _inbox) = mpsc::unbounded_channel();
    let executor = Arc::new(ScriptedExecutor {
        outbox,
        fail_open: true,
    });

    let result = start(test_config(), executor, ClientOptions::default()).await;
    assert_matches!(result, Err(StartError::Transport(_)));
}

/// Invalid configuration is rejected before the transport is touched.
#[tokio::test]
async fn start_rejects_invalid_config() {
    let (outbox, _inbox) = mpsc::unbounded_channel();
    let executor = Arc::new(ScriptedExecutor {
        outbox,
        fail_open: false,
    });

    let config = MonitorConfig::new(Duration::ZERO, 10, "Device.X.Count");
    let result = start(config, executor, ClientOptions::default()).await;
    assert_matches!(result, Err(StartError::Config(_)));
}
