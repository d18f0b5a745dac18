use super::*;
use crate::adapter::NormalizedTag;
use crate::error::{PipelineError, PipelineResult, TransportResult};
use crate::transport::{PollStep, ScriptedTransport, TagTransport};
use crate::types::hex::encode_hex;
use crate::types::{RawTag, TagType};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout, Instant};

const WAIT: Duration = Duration::from_secs(5);

/// Reports identifiers as hex. The identifier `DEAD` makes detection fail.
struct HexDetector;

#[async_trait]
impl Detector for HexDetector {
    type Identity = String;

    async fn detect(&self, tag: &NormalizedTag) -> PipelineResult<Option<String>> {
        match tag.identifier() {
            Some([0xDE, 0xAD]) => Err(PipelineError::Detection("unreadable sector".into())),
            Some(id) => Ok(Some(encode_hex(id))),
            None => Ok(None),
        }
    }
}

/// Records every identity it is asked to encrypt. `BEEF` fails.
#[derive(Clone, Default)]
struct RecordingEncrypter {
    seen: Arc<StdMutex<Vec<String>>>,
}

impl RecordingEncrypter {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Encrypter<String> for RecordingEncrypter {
    type Output = String;

    async fn encrypt(&self, identity: String) -> PipelineResult<String> {
        self.seen.lock().unwrap().push(identity.clone());
        if identity == "BEEF" {
            return Err(PipelineError::Encryption("key rotated".into()));
        }
        Ok(format!("enc:{identity}"))
    }
}

/// Holds every identity at a gate, then fails to encrypt it.
struct StalledEncrypter {
    entered: Arc<AtomicBool>,
    gate: Arc<Notify>,
}

#[async_trait]
impl Encrypter<String> for StalledEncrypter {
    type Output = String;

    async fn encrypt(&self, identity: String) -> PipelineResult<String> {
        self.entered.store(true, Ordering::SeqCst);
        self.gate.notified().await;
        Err(PipelineError::Encryption(format!("hsm offline for {identity}")))
    }
}

/// Wraps a scripted transport with a slow release and an optional gate on
/// availability checks.
struct HookedTransport {
    inner: Arc<ScriptedTransport>,
    release_delay: Duration,
    availability_gate: Option<Arc<Notify>>,
    availability_checks: AtomicUsize,
}

impl HookedTransport {
    fn new(inner: Arc<ScriptedTransport>) -> Self {
        Self {
            inner,
            release_delay: Duration::ZERO,
            availability_gate: None,
            availability_checks: AtomicUsize::new(0),
        }
    }

    fn availability_checks(&self) -> usize {
        self.availability_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagTransport for HookedTransport {
    async fn is_available(&self) -> bool {
        self.availability_checks.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.availability_gate {
            gate.notified().await;
        }
        self.inner.is_available().await
    }

    async fn poll(&self, timeout: Duration) -> TransportResult<RawTag> {
        self.inner.poll(timeout).await
    }

    async fn transceive(&self, command: &[u8]) -> TransportResult<Vec<u8>> {
        self.inner.transceive(command).await
    }

    async fn finish(&self) -> TransportResult<()> {
        sleep(self.release_delay).await;
        self.inner.finish().await
    }
}

type TestLoop = ScanLoop<HexDetector, RecordingEncrypter>;

struct Harness {
    scan: TestLoop,
    transport: Arc<ScriptedTransport>,
    encrypter: RecordingEncrypter,
}

fn harness(steps: Vec<PollStep>, mode: ScanMode) -> Harness {
    let transport = Arc::new(ScriptedTransport::new(steps));
    let encrypter = RecordingEncrypter::default();
    let scan = ScanLoop::new(
        transport.clone(),
        DetectionPipeline::new(HexDetector, encrypter.clone()),
        mode,
    );
    Harness {
        scan,
        transport,
        encrypter,
    }
}

fn tag(id: &str) -> PollStep {
    PollStep::Tag(RawTag::new(TagType::IsoDep, id))
}

fn continuous(idle_ms: u64) -> ScanMode {
    ScanMode::repeat_polling(Duration::from_millis(idle_ms))
}

async fn next_event<T: Clone>(rx: &mut broadcast::Receiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

async fn wait_for_state(scan: &TestLoop, state: ScanState) {
    let mut rx = scan.watch_state();
    timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .expect("state not reached")
        .expect("state channel closed");
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

fn expect_identity(event: IdentityEvent<String>) -> String {
    match event {
        IdentityEvent::Identity(id) => id,
        IdentityEvent::Error(e) => panic!("unexpected error event: {e}"),
    }
}

fn expect_error(event: IdentityEvent<String>) -> Arc<ScanError> {
    match event {
        IdentityEvent::Error(e) => e,
        IdentityEvent::Identity(id) => panic!("unexpected identity: {id}"),
    }
}

#[tokio::test]
async fn test_is_available_reflects_transport() {
    let h = harness(Vec::new(), ScanMode::single_scan());
    assert!(h.scan.is_available().await);
    h.transport.set_available(false);
    assert!(!h.scan.is_available().await);
}

#[tokio::test]
async fn test_start_fails_when_unavailable() {
    let h = harness(vec![tag("01")], ScanMode::single_scan());
    h.transport.set_available(false);

    assert!(matches!(h.scan.start().await, Err(ScanError::Unavailable)));
    assert!(!h.scan.is_running());
    assert_eq!(h.transport.polls(), 0);
}

#[tokio::test]
async fn test_stop_when_not_running_is_noop() {
    let h = harness(Vec::new(), ScanMode::single_scan());

    h.scan.stop().await;
    h.scan.stop().await;

    assert!(!h.scan.is_running());
    assert_eq!(h.scan.state(), ScanState::Idle);
    assert_eq!(h.transport.finishes(), 0);
}

#[tokio::test]
async fn test_single_scan_publishes_identity() {
    let h = harness(vec![tag("0A0B")], ScanMode::single_scan());
    let mut events = h.scan.subscribe_identities().unwrap();
    let mut idle = h.scan.subscribe_idle().unwrap();

    h.scan.start().await.unwrap();
    let identity = expect_identity(next_event(&mut events).await);
    assert_eq!(identity, "enc:0A0B");
    // Published only after the encrypter saw the identity.
    assert_eq!(h.encrypter.seen(), vec!["0A0B".to_string()]);

    wait_for_state(&h.scan, ScanState::Idle).await;
    assert_eq!(h.transport.polls(), 1);
    assert!(!h.transport.session_open());
    assert!(h.transport.finishes() >= 1);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert!(matches!(idle.try_recv(), Err(TryRecvError::Empty)));

    // Single scan leaves the run flag alone.
    assert!(h.scan.is_running());
}

#[tokio::test]
async fn test_single_scan_start_again_schedules_new_cycle() {
    let h = harness(vec![tag("01"), tag("02")], ScanMode::single_scan());
    let mut events = h.scan.subscribe_identities().unwrap();

    h.scan.start().await.unwrap();
    assert_eq!(expect_identity(next_event(&mut events).await), "enc:01");
    wait_for_state(&h.scan, ScanState::Idle).await;

    h.scan.start().await.unwrap();
    assert_eq!(expect_identity(next_event(&mut events).await), "enc:02");
    assert_eq!(h.transport.polls(), 2);
}

#[tokio::test]
async fn test_start_twice_runs_one_cycle() {
    let h = harness(Vec::new(), continuous(10));

    h.scan.start().await.unwrap();
    eventually(|| h.transport.polls() == 1).await;

    h.scan.start().await.unwrap();
    sleep(Duration::from_millis(20)).await;
    assert_eq!(h.transport.polls(), 1);

    h.scan.stop().await;
    assert_eq!(h.transport.polls(), 1);
}

#[tokio::test]
async fn test_stop_unblocks_pending_poll() {
    let h = harness(Vec::new(), ScanMode::single_scan());
    let mut events = h.scan.subscribe_identities().unwrap();

    h.scan.start().await.unwrap();
    eventually(|| h.transport.session_open()).await;

    timeout(WAIT, h.scan.stop())
        .await
        .expect("stop should not wait for the poll timeout");

    assert!(!h.scan.is_running());
    assert_eq!(h.scan.state(), ScanState::Stopped);
    assert!(!h.transport.session_open());
    // Cancellation is not reported as a failure.
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_unrecognized_tag_is_silent_but_paces() {
    let unknown = PollStep::Tag(RawTag::new(TagType::Unknown, "01"));
    let h = harness(vec![unknown], continuous(10));
    let mut events = h.scan.subscribe_identities().unwrap();
    let mut idle = h.scan.subscribe_idle().unwrap();

    h.scan.start().await.unwrap();
    assert!(next_event(&mut idle).await);
    assert!(!next_event(&mut idle).await);
    eventually(|| h.transport.polls() == 2).await;

    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert!(h.encrypter.seen().is_empty());
    h.scan.stop().await;
}

#[tokio::test]
async fn test_poll_timeout_is_silent() {
    let h = harness(vec![PollStep::Timeout], ScanMode::single_scan());
    let mut events = h.scan.subscribe_identities().unwrap();

    h.scan.start().await.unwrap();
    wait_for_state(&h.scan, ScanState::Idle).await;

    assert_eq!(h.transport.polls(), 1);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_poll_failure_publishes_one_error() {
    let failure = PollStep::Fail {
        message: "antenna fault".into(),
    };
    let h = harness(vec![failure], ScanMode::single_scan());
    let mut events = h.scan.subscribe_identities().unwrap();

    h.scan.start().await.unwrap();
    let error = expect_error(next_event(&mut events).await);
    assert!(error.to_string().contains("antenna fault"));

    wait_for_state(&h.scan, ScanState::Idle).await;
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert!(h.transport.finishes() >= 1);
}

#[tokio::test]
async fn test_detection_failure_does_not_stop_continuous_loop() {
    let h = harness(vec![tag("DEAD"), tag("0102")], continuous(5));
    let mut events = h.scan.subscribe_identities().unwrap();

    h.scan.start().await.unwrap();
    let error = expect_error(next_event(&mut events).await);
    assert!(matches!(
        error.as_ref(),
        ScanError::Pipeline(PipelineError::Detection(_))
    ));
    assert_eq!(expect_identity(next_event(&mut events).await), "enc:0102");
    assert!(h.scan.is_running());

    h.scan.stop().await;
    assert!(!h.transport.session_open());
}

#[tokio::test]
async fn test_encryption_failure_publishes_error() {
    let h = harness(vec![tag("BEEF")], ScanMode::single_scan());
    let mut events = h.scan.subscribe_identities().unwrap();

    h.scan.start().await.unwrap();
    let error = expect_error(next_event(&mut events).await);
    assert!(matches!(
        error.as_ref(),
        ScanError::Pipeline(PipelineError::Encryption(_))
    ));

    wait_for_state(&h.scan, ScanState::Idle).await;
    assert_eq!(h.encrypter.seen(), vec!["BEEF".to_string()]);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert!(!h.transport.session_open());
}

#[tokio::test]
async fn test_failure_while_stopping_publishes_one_error() {
    let transport = Arc::new(ScriptedTransport::new(vec![tag("0A0B")]));
    let entered = Arc::new(AtomicBool::new(false));
    let gate = Arc::new(Notify::new());
    let encrypter = StalledEncrypter {
        entered: entered.clone(),
        gate: gate.clone(),
    };
    let scan = ScanLoop::new(
        transport.clone(),
        DetectionPipeline::new(HexDetector, encrypter),
        ScanMode::single_scan(),
    );
    let mut events = scan.subscribe_identities().unwrap();

    scan.start().await.unwrap();
    eventually(|| entered.load(Ordering::SeqCst)).await;

    // Let encryption fail only once stop() has cleared the run flag.
    let unblock = async {
        eventually(|| !scan.is_running()).await;
        gate.notify_one();
    };
    timeout(WAIT, async { tokio::join!(scan.stop(), unblock) })
        .await
        .expect("stop should finish once encryption fails");

    let error = expect_error(next_event(&mut events).await);
    assert!(matches!(
        error.as_ref(),
        ScanError::Pipeline(PipelineError::Encryption(_))
    ));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(scan.state(), ScanState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_release_overlaps_encryption_and_ends_the_cycle() {
    let release_delay = Duration::from_millis(200);
    let inner = Arc::new(ScriptedTransport::new(vec![tag("0A0B")]));
    let transport = Arc::new(HookedTransport {
        release_delay,
        ..HookedTransport::new(inner.clone())
    });
    let scan = ScanLoop::new(
        transport,
        DetectionPipeline::new(HexDetector, RecordingEncrypter::default()),
        ScanMode::single_scan(),
    );
    let mut events = scan.subscribe_identities().unwrap();

    let started = Instant::now();
    scan.start().await.unwrap();

    // Published while the release is still under way.
    assert_eq!(expect_identity(next_event(&mut events).await), "enc:0A0B");
    assert!(started.elapsed() < release_delay);
    assert_eq!(inner.finishes(), 0);
    assert_ne!(scan.state(), ScanState::Idle);

    wait_for_state(&scan, ScanState::Idle).await;
    assert_eq!(inner.finishes(), 1);
    assert!(started.elapsed() >= release_delay);
}

#[tokio::test]
async fn test_panicked_worker_is_reported() {
    struct PanickingDetector;

    #[async_trait]
    impl Detector for PanickingDetector {
        type Identity = String;

        async fn detect(&self, _tag: &NormalizedTag) -> PipelineResult<Option<String>> {
            panic!("detector bug")
        }
    }

    let transport = Arc::new(ScriptedTransport::new(vec![tag("01")]));
    let scan = ScanLoop::new(
        transport.clone(),
        DetectionPipeline::new(PanickingDetector, RecordingEncrypter::default()),
        ScanMode::single_scan(),
    );
    let mut events = scan.subscribe_identities().unwrap();

    scan.start().await.unwrap();
    eventually(|| transport.polls() == 1).await;
    scan.stop().await;

    let error = expect_error(next_event(&mut events).await);
    assert!(matches!(error.as_ref(), ScanError::Worker(_)));
    assert_eq!(scan.state(), ScanState::Stopped);
}

#[tokio::test]
async fn test_close_during_availability_check_wins() {
    let inner = Arc::new(ScriptedTransport::new(Vec::new()));
    let gate = Arc::new(Notify::new());
    let transport = Arc::new(HookedTransport {
        availability_gate: Some(gate.clone()),
        ..HookedTransport::new(inner.clone())
    });
    let scan = ScanLoop::new(
        transport.clone(),
        DetectionPipeline::new(HexDetector, RecordingEncrypter::default()),
        continuous(1),
    );

    let closing = async {
        eventually(|| transport.availability_checks() == 1).await;
        scan.close().await;
        gate.notify_one();
    };
    let (started, ()) = tokio::join!(scan.start(), closing);

    assert!(matches!(started, Err(ScanError::Closed)));
    assert!(!scan.is_running());
    sleep(Duration::from_millis(20)).await;
    assert_eq!(inner.polls(), 0);
}

#[tokio::test]
async fn test_release_failure_is_swallowed() {
    let h = harness(vec![tag("01")], ScanMode::single_scan());
    h.transport.fail_release(true);
    let mut events = h.scan.subscribe_identities().unwrap();

    h.scan.start().await.unwrap();
    assert_eq!(expect_identity(next_event(&mut events).await), "enc:01");

    wait_for_state(&h.scan, ScanState::Idle).await;
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_idle_signals_bracket_each_pause() {
    let h = harness(vec![tag("01"), PollStep::Timeout], continuous(30));
    let mut idle = h.scan.subscribe_idle().unwrap();

    h.scan.start().await.unwrap();

    assert!(next_event(&mut idle).await);
    assert_eq!(h.transport.polls(), 1);
    assert!(!next_event(&mut idle).await);
    eventually(|| h.transport.polls() >= 2).await;

    // The timed-out second cycle paces too.
    assert!(next_event(&mut idle).await);
    assert_eq!(h.transport.polls(), 2);
    assert!(!next_event(&mut idle).await);
    eventually(|| h.transport.polls() == 3).await;

    h.scan.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_false_arrives_after_configured_pause() {
    let pause = Duration::from_millis(500);
    let h = harness(vec![tag("01")], ScanMode::repeat_polling(pause));
    let mut idle = h.scan.subscribe_idle().unwrap();

    h.scan.start().await.unwrap();
    assert!(next_event(&mut idle).await);
    let paced_at = Instant::now();

    tokio::time::advance(pause - Duration::from_millis(1)).await;
    assert!(matches!(idle.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(h.transport.polls(), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    assert!(!next_event(&mut idle).await);
    assert!(paced_at.elapsed() >= pause);
    eventually(|| h.transport.polls() == 2).await;

    h.scan.stop().await;
}

#[tokio::test]
async fn test_stop_during_pacing_returns_promptly() {
    let h = harness(vec![PollStep::Timeout], continuous(60 * 60 * 1000));
    let mut idle = h.scan.subscribe_idle().unwrap();

    h.scan.start().await.unwrap();
    assert!(next_event(&mut idle).await);
    assert_eq!(h.scan.state(), ScanState::Pacing);

    timeout(WAIT, h.scan.stop())
        .await
        .expect("stop should cut the pause short");
    assert!(!next_event(&mut idle).await);
    assert_eq!(h.scan.state(), ScanState::Stopped);
    assert_eq!(h.transport.polls(), 1);
}

#[tokio::test]
async fn test_restart_runs_fresh_cycle() {
    let h = harness(Vec::new(), continuous(10));

    h.scan.start().await.unwrap();
    eventually(|| h.transport.polls() == 1).await;

    h.scan.restart().await.unwrap();
    eventually(|| h.transport.polls() == 2).await;
    assert!(h.scan.is_running());
    assert!(h.transport.finishes() >= 1);

    h.scan.stop().await;
    assert_eq!(h.transport.polls(), 2);
}

#[tokio::test]
async fn test_restart_fails_when_unavailable() {
    let h = harness(Vec::new(), continuous(10));
    h.scan.start().await.unwrap();
    h.transport.set_available(false);

    assert!(matches!(h.scan.restart().await, Err(ScanError::Unavailable)));
    assert!(!h.scan.is_running());
}

#[tokio::test]
async fn test_close_ends_streams() {
    let h = harness(Vec::new(), continuous(10));
    let identities = h.scan.identity_stream().unwrap();
    let idle = h.scan.idle_stream().unwrap();

    h.scan.start().await.unwrap();
    eventually(|| h.transport.polls() == 1).await;
    h.scan.close().await;

    let remaining: Vec<_> = timeout(WAIT, identities.collect::<Vec<_>>())
        .await
        .expect("identity stream should end");
    assert!(remaining.is_empty());
    timeout(WAIT, idle.collect::<Vec<_>>())
        .await
        .expect("idle stream should end");

    assert!(h.scan.is_closed());
    assert!(matches!(h.scan.start().await, Err(ScanError::Closed)));
    assert!(matches!(h.scan.subscribe_identities(), Err(ScanError::Closed)));
    assert!(matches!(h.scan.subscribe_idle(), Err(ScanError::Closed)));

    // Closing twice is harmless.
    h.scan.close().await;
}

#[tokio::test]
async fn test_each_acquisition_gets_fresh_handle() {
    struct HandleDetector;

    #[async_trait]
    impl Detector for HandleDetector {
        type Identity = String;

        async fn detect(&self, tag: &NormalizedTag) -> PipelineResult<Option<String>> {
            Ok(Some(tag.handle().to_string()))
        }
    }

    let transport = Arc::new(ScriptedTransport::new(vec![tag("01"), tag("01")]));
    let scan = ScanLoop::new(
        transport.clone(),
        DetectionPipeline::new(HandleDetector, RecordingEncrypter::default()),
        continuous(1),
    );
    let mut events = scan.subscribe_identities().unwrap();

    scan.start().await.unwrap();
    let first = expect_identity(next_event(&mut events).await);
    let second = expect_identity(next_event(&mut events).await);
    assert_ne!(first, second);

    scan.stop().await;
}
