use super::*;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst},
    Mutex as StdMutex,
};

use anyhow::anyhow;
use async_trait::async_trait;
use shared::{
    domain::{AttendanceFlags, MemberId},
    protocol::{MemberUpdate, WireFlags},
};

use crate::{
    controller::events::NoticeLevel,
    scan::CameraFacing,
};

#[derive(Default)]
struct CapabilityState {
    starts: AtomicUsize,
    stops: AtomicUsize,
    clears: AtomicUsize,
    fail_start: AtomicBool,
    hang_start: AtomicBool,
    fail_stop: AtomicBool,
    decoded_tx: StdMutex<Option<mpsc::Sender<String>>>,
    last_start: StdMutex<Option<(String, ScanConfig)>>,
}

#[derive(Clone, Default)]
struct FakeCapability(Arc<CapabilityState>);

impl FakeCapability {
    fn scan(&self, text: &str) {
        self.0
            .decoded_tx
            .lock()
            .unwrap()
            .as_ref()
            .expect("scanner running")
            .try_send(text.to_string())
            .expect("decode queue");
    }

    fn is_running(&self) -> bool {
        self.0.decoded_tx.lock().unwrap().is_some()
    }

    fn starts(&self) -> usize {
        self.0.starts.load(SeqCst)
    }

    fn stops(&self) -> usize {
        self.0.stops.load(SeqCst)
    }

    fn clears(&self) -> usize {
        self.0.clears.load(SeqCst)
    }
}

#[async_trait]
impl ScanCapability for FakeCapability {
    async fn start(&self, region: &str, config: &ScanConfig) -> anyhow::Result<ScanSession> {
        let state = &self.0;
        state.starts.fetch_add(1, SeqCst);
        *state.last_start.lock().unwrap() = Some((region.to_string(), config.clone()));

        if state.hang_start.load(SeqCst) {
            std::future::pending::<()>().await;
        }
        if state.fail_start.load(SeqCst) {
            return Err(anyhow!("NotAllowedError: Permission denied"));
        }

        let (tx, rx) = mpsc::channel(16);
        *state.decoded_tx.lock().unwrap() = Some(tx);
        Ok(ScanSession {
            handle: Box::new(FakeScannerHandle(Arc::clone(state))),
            decoded: rx,
        })
    }
}

struct FakeScannerHandle(Arc<CapabilityState>);

#[async_trait]
impl ScannerHandle for FakeScannerHandle {
    async fn stop(&mut self) -> anyhow::Result<()> {
        self.0.stops.fetch_add(1, SeqCst);
        self.0.decoded_tx.lock().unwrap().take();
        if self.0.fail_stop.load(SeqCst) {
            return Err(anyhow!("Cannot stop, scanner is not running or paused."));
        }
        Ok(())
    }

    async fn clear(&mut self) -> anyhow::Result<()> {
        self.0.clears.fetch_add(1, SeqCst);
        Ok(())
    }
}

enum FetchOutcome {
    Team(TeamDetails),
    Rejected(&'static str),
    NoTeam,
    Unreachable,
}

enum UpdateOutcome {
    Status(&'static str),
    Rejected(&'static str),
    Unreachable,
}

struct FakeBackend {
    fetch: StdMutex<FetchOutcome>,
    update: StdMutex<UpdateOutcome>,
    fetch_calls: StdMutex<Vec<TeamId>>,
    update_calls: StdMutex<Vec<(TeamId, Vec<MemberUpdate>)>>,
}

impl FakeBackend {
    fn new(fetch: FetchOutcome) -> Self {
        Self {
            fetch: StdMutex::new(fetch),
            update: StdMutex::new(UpdateOutcome::Status("updated")),
            fetch_calls: StdMutex::new(Vec::new()),
            update_calls: StdMutex::new(Vec::new()),
        }
    }

    fn with_update(self, update: UpdateOutcome) -> Self {
        *self.update.lock().unwrap() = update;
        self
    }

    fn fetch_calls(&self) -> Vec<TeamId> {
        self.fetch_calls.lock().unwrap().clone()
    }

    fn update_calls(&self) -> Vec<(TeamId, Vec<MemberUpdate>)> {
        self.update_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttendanceBackend for FakeBackend {
    async fn fetch_team(&self, team_id: &TeamId) -> Result<TeamDetails, ClientError> {
        self.fetch_calls.lock().unwrap().push(team_id.clone());
        match &*self.fetch.lock().unwrap() {
            FetchOutcome::Team(details) => Ok(details.clone()),
            FetchOutcome::Rejected(message) => Err(ClientError::Backend(message.to_string())),
            FetchOutcome::NoTeam => Err(ClientError::MissingTeam { status: 500 }),
            FetchOutcome::Unreachable => Err(ClientError::UnexpectedStatus {
                status: 502,
                body: "Bad Gateway".to_string(),
            }),
        }
    }

    async fn update_members(
        &self,
        team_id: &TeamId,
        members: Vec<MemberUpdate>,
    ) -> Result<UpdateAck, ClientError> {
        self.update_calls
            .lock()
            .unwrap()
            .push((team_id.clone(), members));
        match &*self.update.lock().unwrap() {
            UpdateOutcome::Status(status) => Ok(UpdateAck {
                status: Some(status.to_string()),
                error: None,
            }),
            UpdateOutcome::Rejected(message) => Err(ClientError::Backend(message.to_string())),
            UpdateOutcome::Unreachable => Err(ClientError::UnexpectedStatus {
                status: 503,
                body: "Service Unavailable".to_string(),
            }),
        }
    }
}

fn alpha() -> TeamDetails {
    TeamDetails {
        team_name: "Alpha".to_string(),
        members: vec![MemberRecord {
            member_id: MemberId::from("1"),
            member_name: "Ann".to_string(),
            flags: AttendanceFlags::default(),
        }],
    }
}

struct Harness {
    controller: WorkflowController,
    handle: WorkflowHandle,
    ui_rx: mpsc::UnboundedReceiver<UiEvent>,
    backend: Arc<FakeBackend>,
    capability: FakeCapability,
}

impl Harness {
    fn new(backend: FakeBackend) -> Self {
        Self::with_capability(backend, FakeCapability::default())
    }

    fn with_capability(backend: FakeBackend, capability: FakeCapability) -> Self {
        let backend = Arc::new(backend);
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (controller, handle) = WorkflowController::new(
            backend.clone(),
            Arc::new(capability.clone()),
            WorkflowSettings::default(),
            ui_tx,
        );
        Self {
            controller,
            handle,
            ui_rx,
            backend,
            capability,
        }
    }

    /// Handles queued events until nothing arrives for a short while.
    async fn settle(&mut self) {
        while let Ok(Some(inbound)) = tokio::time::timeout(
            Duration::from_millis(20),
            self.controller.inbound_rx.recv(),
        )
        .await
        {
            assert!(self.controller.handle(inbound).await);
        }
    }

    fn ui_events(&mut self) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.ui_rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn notices(&mut self) -> Vec<Notice> {
        self.ui_events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Notice(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    async fn load_team(&mut self, payload: &str) {
        self.controller.start_scanning().await;
        self.capability.scan(payload);
        self.settle().await;
    }
}

#[tokio::test(start_paused = true)]
async fn start_acquires_scanner_with_rear_camera_config() {
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Team(alpha())));

    h.controller.start_scanning().await;

    assert_eq!(h.controller.state(), WorkflowState::Scanning);
    assert!(h.controller.holds_scanner());
    let (region, config) = h.capability.0.last_start.lock().unwrap().clone().unwrap();
    assert_eq!(region, "reader");
    assert_eq!(
        config,
        ScanConfig {
            preferred_facing: CameraFacing::Environment,
            frame_rate: 10,
            detection_box_size: 250,
        }
    );
    assert_eq!(
        h.ui_events(),
        vec![
            UiEvent::LoadingIndicator(true),
            UiEvent::StateChanged(WorkflowState::Scanning),
            UiEvent::LoadingIndicator(false),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn scanner_start_failure_asks_for_camera_access_and_stays_idle() {
    let capability = FakeCapability::default();
    capability.0.fail_start.store(true, SeqCst);
    let mut h = Harness::with_capability(FakeBackend::new(FetchOutcome::Team(alpha())), capability);

    h.controller.start_scanning().await;

    assert_eq!(h.controller.state(), WorkflowState::Idle);
    assert!(!h.controller.holds_scanner());
    assert_eq!(h.notices(), vec![Notice::warning(CAMERA_ACCESS_MESSAGE)]);
    assert_eq!(h.capability.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn scanner_that_never_becomes_ready_times_out() {
    let capability = FakeCapability::default();
    capability.0.hang_start.store(true, SeqCst);
    let mut h = Harness::with_capability(FakeBackend::new(FetchOutcome::Team(alpha())), capability);

    h.controller.start_scanning().await;

    assert_eq!(h.controller.state(), WorkflowState::Idle);
    let events = h.ui_events();
    assert_eq!(events.first(), Some(&UiEvent::LoadingIndicator(true)));
    assert_eq!(events.last(), Some(&UiEvent::LoadingIndicator(false)));
    assert!(events.contains(&UiEvent::Notice(Notice::warning(CAMERA_ACCESS_MESSAGE))));
}

#[tokio::test(start_paused = true)]
async fn valid_scan_renders_roster_and_releases_scanner() {
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Team(alpha())));
    h.controller.start_scanning().await;
    h.ui_events();

    h.capability.scan(r#"{"team_id":"T1"}"#);
    h.settle().await;

    assert_eq!(h.backend.fetch_calls(), vec![TeamId::from("T1")]);
    assert_eq!(h.controller.state(), WorkflowState::Reviewing);
    assert_eq!(h.controller.active_team_id(), Some(&TeamId::from("T1")));
    assert_eq!(h.controller.roster(), alpha().members.as_slice());
    assert_eq!(h.controller.table().team_name(), Some("Alpha"));

    let rows = h.controller.table().rows().to_vec();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].member_name, "Ann");
    assert!(rows[0].checkboxes.iter().all(|(_, checked)| !checked));

    assert!(!h.controller.holds_scanner());
    assert!(!h.capability.is_running());
    assert_eq!((h.capability.stops(), h.capability.clears()), (1, 1));

    assert_eq!(
        h.ui_events(),
        vec![
            UiEvent::TeamName("Alpha".to_string()),
            UiEvent::RosterRendered(rows),
            UiEvent::ReviewVisible(true),
            UiEvent::ScanNextVisible(true),
            UiEvent::StateChanged(WorkflowState::Reviewing),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn unusable_payloads_warn_and_keep_scanning() {
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Team(alpha())));
    h.controller.start_scanning().await;
    h.ui_events();

    h.capability.scan("https://example.com/not-a-team");
    h.capability.scan(r#"{"team_name":"Alpha"}"#);
    h.capability.scan(r#"{"team_id":""}"#);
    h.settle().await;

    assert_eq!(
        h.notices(),
        vec![
            Notice::warning("Invalid QR Code. Please scan a valid team QR."),
            Notice::warning("QR Code missing team_id."),
            Notice::warning("QR Code missing team_id."),
        ]
    );
    assert!(h.backend.fetch_calls().is_empty());
    assert_eq!(h.controller.state(), WorkflowState::Scanning);
    assert_eq!(h.controller.active_team_id(), None);
    assert!(h.controller.roster().is_empty());
    assert!(h.capability.is_running());
}

#[tokio::test(start_paused = true)]
async fn backend_error_warns_and_leaves_scanner_running() {
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Rejected("team not found")));
    h.controller.start_scanning().await;
    h.ui_events();

    h.capability.scan(r#"{"team_id":"T9"}"#);
    h.settle().await;

    assert_eq!(h.notices(), vec![Notice::warning("team not found")]);
    assert_eq!(h.controller.state(), WorkflowState::Scanning);
    assert_eq!(h.controller.active_team_id(), None);
    assert!(h.controller.holds_scanner());
    assert_eq!(h.capability.stops(), 0);

    *h.backend.fetch.lock().unwrap() = FetchOutcome::Team(alpha());
    h.capability.scan(r#"{"team_id":"T1"}"#);
    h.settle().await;
    assert_eq!(h.controller.state(), WorkflowState::Reviewing);
    assert_eq!(h.backend.fetch_calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn unreachable_backend_warns_and_keeps_scanning() {
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Unreachable));
    h.controller.start_scanning().await;
    h.ui_events();

    h.capability.scan(r#"{"team_id":"T1"}"#);
    h.settle().await;

    assert_eq!(h.notices(), vec![Notice::warning(FETCH_FAILED_MESSAGE)]);
    assert_eq!(h.controller.state(), WorkflowState::Scanning);
    assert!(h.capability.is_running());
}

#[tokio::test(start_paused = true)]
async fn lookup_body_without_team_shows_generic_failure() {
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::NoTeam));
    h.controller.start_scanning().await;
    h.ui_events();

    h.capability.scan(r#"{"team_id":"T1"}"#);
    h.settle().await;

    assert_eq!(h.notices(), vec![Notice::warning(FETCH_FAILED_MESSAGE)]);
    assert_eq!(h.controller.state(), WorkflowState::Scanning);
    assert_eq!(h.controller.active_team_id(), None);
    assert!(h.capability.is_running());
}

#[tokio::test(start_paused = true)]
async fn repeated_decodes_issue_a_single_lookup() {
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Team(alpha())));
    h.controller.start_scanning().await;

    for _ in 0..3 {
        h.capability.scan(r#"{"team_id":"T1"}"#);
    }
    h.settle().await;

    assert_eq!(h.backend.fetch_calls(), vec![TeamId::from("T1")]);
    assert_eq!(h.controller.state(), WorkflowState::Reviewing);
}

#[tokio::test(start_paused = true)]
async fn submit_pushes_checkbox_state_and_reports_success() {
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Team(alpha())));
    h.load_team(r#"{"team_id":"T1"}"#).await;
    h.ui_events();

    h.handle.set_checkbox(0, AttendanceFlag::CheckIn, true);
    h.handle.toggle_checkbox(0, AttendanceFlag::CheckOut);
    h.handle.submit();
    h.settle().await;

    let expected = AttendanceFlags::default()
        .with(AttendanceFlag::CheckIn, true)
        .with(AttendanceFlag::CheckOut, true);
    let calls = h.backend.update_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, TeamId::from("T1"));
    assert_eq!(
        calls[0].1,
        vec![MemberUpdate {
            member_id: MemberId::from("1"),
            flags: WireFlags {
                check_in: 1,
                check_out: 1,
                ..WireFlags::default()
            },
        }]
    );

    let events = h.ui_events();
    assert!(events.contains(&UiEvent::StateChanged(WorkflowState::Submitting)));
    assert_eq!(
        events.last(),
        Some(&UiEvent::Notice(Notice::success(UPDATED_MESSAGE)))
    );
    assert_eq!(h.controller.state(), WorkflowState::Reviewing);
    assert_eq!(h.controller.active_team_id(), Some(&TeamId::from("T1")));
    assert_eq!(h.controller.roster()[0].flags, expected);
    assert_eq!(h.controller.table().rows()[0].checkboxes, expected);
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_or_failed_submission_warns() {
    let backend =
        FakeBackend::new(FetchOutcome::Team(alpha())).with_update(UpdateOutcome::Status("queued"));
    let mut h = Harness::new(backend);
    h.load_team(r#"{"team_id":"T1"}"#).await;
    h.ui_events();

    h.handle.submit();
    h.settle().await;
    assert_eq!(h.notices(), vec![Notice::warning(UPDATE_REJECTED_MESSAGE)]);
    assert_eq!(h.controller.state(), WorkflowState::Reviewing);

    *h.backend.update.lock().unwrap() = UpdateOutcome::Unreachable;
    h.handle.submit();
    h.settle().await;
    assert_eq!(h.notices(), vec![Notice::warning(UPDATE_FAILED_MESSAGE)]);
    assert_eq!(h.controller.state(), WorkflowState::Reviewing);
    assert_eq!(h.backend.update_calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn backend_rejected_submission_keeps_the_edits() {
    let backend = FakeBackend::new(FetchOutcome::Team(alpha()))
        .with_update(UpdateOutcome::Rejected("Invalid data"));
    let mut h = Harness::new(backend);
    h.load_team(r#"{"team_id":"T1"}"#).await;

    h.handle.set_checkbox(0, AttendanceFlag::Dinner, true);
    h.settle().await;
    h.ui_events();

    h.handle.submit();
    h.settle().await;

    let expected = AttendanceFlags::default().with(AttendanceFlag::Dinner, true);
    assert_eq!(h.backend.update_calls().len(), 1);
    assert_eq!(h.notices(), vec![Notice::warning(UPDATE_REJECTED_MESSAGE)]);
    assert_eq!(h.controller.state(), WorkflowState::Reviewing);
    assert_eq!(h.controller.active_team_id(), Some(&TeamId::from("T1")));
    assert_eq!(h.controller.roster()[0].flags, expected);
    assert_eq!(h.controller.table().rows()[0].checkboxes, expected);
}

#[tokio::test(start_paused = true)]
async fn submit_without_rows_is_rejected_locally() {
    let empty_team = TeamDetails {
        team_name: "Ghosts".to_string(),
        members: Vec::new(),
    };
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Team(empty_team)));
    h.load_team(r#"{"team_id":"T0"}"#).await;
    assert_eq!(h.controller.state(), WorkflowState::Reviewing);
    h.ui_events();

    h.handle.submit();
    h.settle().await;

    assert_eq!(h.notices(), vec![Notice::warning(NO_MEMBERS_MESSAGE)]);
    assert!(h.backend.update_calls().is_empty());
    assert_eq!(h.controller.state(), WorkflowState::Reviewing);
}

#[tokio::test(start_paused = true)]
async fn submit_before_any_scan_is_rejected() {
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Team(alpha())));
    h.controller.start_scanning().await;
    h.ui_events();

    h.handle.submit();
    h.settle().await;

    assert_eq!(h.notices(), vec![Notice::warning(NO_TEAM_MESSAGE)]);
    assert!(h.backend.update_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn double_submit_sends_one_batch() {
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Team(alpha())));
    h.load_team(r#"{"team_id":"T1"}"#).await;

    h.handle.submit();
    h.handle.submit();
    h.settle().await;

    assert_eq!(h.backend.update_calls().len(), 1);
    let successes = h
        .notices()
        .into_iter()
        .filter(|notice| notice.level == NoticeLevel::Success)
        .count();
    assert_eq!(successes, 1);
}

#[tokio::test(start_paused = true)]
async fn scan_next_clears_session_and_restarts_after_delay() {
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Team(alpha())));
    h.load_team(r#"{"team_id":"T1"}"#).await;
    h.ui_events();

    let started = tokio::time::Instant::now();
    h.handle.scan_next();
    h.settle().await;

    assert!(started.elapsed() >= Duration::from_millis(800));
    assert_eq!(h.controller.state(), WorkflowState::Scanning);
    assert_eq!(h.controller.active_team_id(), None);
    assert!(h.controller.roster().is_empty());
    assert!(h.controller.table().is_empty());
    assert_eq!(h.capability.starts(), 2);
    assert!(h.capability.is_running());

    let events = h.ui_events();
    assert_eq!(
        &events[..3],
        &[
            UiEvent::ReviewVisible(false),
            UiEvent::ScanNextVisible(false),
            UiEvent::StateChanged(WorkflowState::Idle),
        ]
    );
    assert!(events.contains(&UiEvent::StateChanged(WorkflowState::Scanning)));

    // The next team goes through the full cycle again.
    h.capability.scan(r#"{"team_id":"T2"}"#);
    h.settle().await;
    assert_eq!(h.controller.active_team_id(), Some(&TeamId::from("T2")));
}

#[tokio::test(start_paused = true)]
async fn scan_next_with_empty_session_still_restarts_scanning() {
    let empty_team = TeamDetails {
        team_name: "Ghosts".to_string(),
        members: Vec::new(),
    };
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Team(empty_team)));
    h.load_team(r#"{"team_id":"T0"}"#).await;

    h.handle.scan_next();
    h.settle().await;
    assert_eq!(h.controller.state(), WorkflowState::Scanning);

    // Releasing an already released scanner is a no-op.
    assert_eq!(h.capability.stops(), 1);
    assert!(h.notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn scan_next_from_idle_retries_the_scanner() {
    let capability = FakeCapability::default();
    capability.0.fail_start.store(true, SeqCst);
    let mut h = Harness::with_capability(FakeBackend::new(FetchOutcome::Team(alpha())), capability);
    h.controller.start_scanning().await;
    assert_eq!(h.controller.state(), WorkflowState::Idle);

    h.capability.0.fail_start.store(false, SeqCst);
    h.handle.scan_next();
    h.settle().await;

    assert_eq!(h.controller.state(), WorkflowState::Scanning);
    assert_eq!(h.capability.starts(), 2);
}

#[tokio::test(start_paused = true)]
async fn submission_result_after_reset_is_discarded() {
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Team(alpha())));
    h.load_team(r#"{"team_id":"T1"}"#).await;
    h.ui_events();

    h.handle.submit();
    h.handle.scan_next();
    h.settle().await;

    assert_eq!(h.backend.update_calls().len(), 1);
    assert_eq!(h.controller.state(), WorkflowState::Scanning);
    assert!(h.notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn scanner_release_errors_are_not_surfaced() {
    let capability = FakeCapability::default();
    capability.0.fail_stop.store(true, SeqCst);
    let mut h = Harness::with_capability(FakeBackend::new(FetchOutcome::Team(alpha())), capability);

    h.load_team(r#"{"team_id":"T1"}"#).await;

    assert_eq!(h.controller.state(), WorkflowState::Reviewing);
    assert!(!h.controller.holds_scanner());
    assert_eq!(h.capability.clears(), 1);
    assert!(h.notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn checkbox_edit_outside_the_table_warns() {
    let mut h = Harness::new(FakeBackend::new(FetchOutcome::Team(alpha())));
    h.load_team(r#"{"team_id":"T1"}"#).await;
    h.ui_events();

    h.handle.toggle_checkbox(4, AttendanceFlag::Dinner);
    h.handle.set_checkbox(0, AttendanceFlag::Dinner, true);
    h.settle().await;

    assert_eq!(
        h.ui_events(),
        vec![
            UiEvent::Notice(Notice::warning("No member in row 5.")),
            UiEvent::CheckboxChanged {
                row: 0,
                flag: AttendanceFlag::Dinner,
                checked: true,
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn run_releases_scanner_on_shutdown() {
    let h = Harness::new(FakeBackend::new(FetchOutcome::Team(alpha())));
    let capability = h.capability.clone();
    let handle = h.handle.clone();

    let task = tokio::spawn(h.controller.run());
    tokio::task::yield_now().await;
    assert!(capability.is_running());

    assert!(handle.shutdown());
    task.await.expect("controller task");
    assert_eq!(capability.stops(), 1);
    assert!(!handle.submit());
}
