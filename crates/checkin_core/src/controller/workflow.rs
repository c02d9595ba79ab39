use std::{sync::Arc, time::Duration};

use shared::{
    domain::{AttendanceFlag, MemberRecord, TeamDetails, TeamId},
    protocol::{ScanPayload, UpdateAck},
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    api::AttendanceBackend,
    controller::events::{Notice, UiEvent, WorkflowCommand, WorkflowState},
    error::ClientError,
    roster::RosterTable,
    scan::{ScanCapability, ScanConfig, ScanSession, ScannerHandle},
};

const DEFAULT_SCAN_REGION: &str = "reader";
const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(800);
const DEFAULT_SCANNER_START_TIMEOUT: Duration = Duration::from_secs(10);

const CAMERA_ACCESS_MESSAGE: &str = "Please allow camera access and reload the page.";
const FETCH_FAILED_MESSAGE: &str = "Unable to fetch team details. Please try again.";
const NO_TEAM_MESSAGE: &str = "No team selected. Please scan a team QR first.";
const NO_MEMBERS_MESSAGE: &str = "No members to update.";
const UPDATED_MESSAGE: &str = "Team details updated successfully!";
const UPDATE_REJECTED_MESSAGE: &str = "Failed to update. Please try again.";
const UPDATE_FAILED_MESSAGE: &str = "Server error. Please try again.";

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub scan: ScanConfig,
    pub scan_region: String,
    /// Pause between tearing down the review view and restarting the scanner.
    pub restart_delay: Duration,
    pub scanner_start_timeout: Duration,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            scan_region: DEFAULT_SCAN_REGION.to_string(),
            restart_delay: DEFAULT_RESTART_DELAY,
            scanner_start_timeout: DEFAULT_SCANNER_START_TIMEOUT,
        }
    }
}

/// Active team, its roster and the scanner handle. Owned by the controller only.
#[derive(Default)]
struct SessionState {
    active_team_id: Option<TeamId>,
    roster: Vec<MemberRecord>,
    scanner: Option<Box<dyn ScannerHandle>>,
    /// Bumped on every reset; network results carry the value they were issued under.
    generation: u64,
}

enum Inbound {
    Command(WorkflowCommand),
    Decoded {
        scanner_generation: u64,
        text: String,
    },
    FetchCompleted {
        generation: u64,
        team_id: TeamId,
        result: Result<TeamDetails, ClientError>,
    },
    SubmitCompleted {
        generation: u64,
        result: Result<UpdateAck, ClientError>,
    },
}

/// Cloneable sender for user actions.
#[derive(Clone)]
pub struct WorkflowHandle {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl WorkflowHandle {
    /// Returns `false` once the controller has gone away.
    pub fn dispatch(&self, cmd: WorkflowCommand) -> bool {
        let cmd_name = cmd.name();
        match self.tx.send(Inbound::Command(cmd)) {
            Ok(()) => {
                debug!(command = cmd_name, "queued ui->controller command");
                true
            }
            Err(_) => {
                warn!(command = cmd_name, "workflow controller is gone; dropping command");
                false
            }
        }
    }

    pub fn set_checkbox(&self, row: usize, flag: AttendanceFlag, checked: bool) -> bool {
        self.dispatch(WorkflowCommand::SetCheckbox { row, flag, checked })
    }

    pub fn toggle_checkbox(&self, row: usize, flag: AttendanceFlag) -> bool {
        self.dispatch(WorkflowCommand::ToggleCheckbox { row, flag })
    }

    pub fn submit(&self) -> bool {
        self.dispatch(WorkflowCommand::Submit)
    }

    pub fn scan_next(&self) -> bool {
        self.dispatch(WorkflowCommand::ScanNext)
    }

    pub fn shutdown(&self) -> bool {
        self.dispatch(WorkflowCommand::Shutdown)
    }
}

/// Drives scanning, team lookup, roster editing and submission on a single
/// event loop. Decoded text, user commands and network completions all arrive
/// through one channel and are handled one at a time.
pub struct WorkflowController {
    backend: Arc<dyn AttendanceBackend>,
    capability: Arc<dyn ScanCapability>,
    settings: WorkflowSettings,
    session: SessionState,
    table: RosterTable,
    state: WorkflowState,
    pending_fetch: Option<TeamId>,
    scanner_generation: u64,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
}

impl WorkflowController {
    pub fn new(
        backend: Arc<dyn AttendanceBackend>,
        capability: Arc<dyn ScanCapability>,
        settings: WorkflowSettings,
        ui_tx: mpsc::UnboundedSender<UiEvent>,
    ) -> (Self, WorkflowHandle) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let handle = WorkflowHandle {
            tx: inbound_tx.clone(),
        };
        let controller = Self {
            backend,
            capability,
            settings,
            session: SessionState::default(),
            table: RosterTable::default(),
            state: WorkflowState::Idle,
            pending_fetch: None,
            scanner_generation: 0,
            inbound_tx,
            inbound_rx,
            ui_tx,
        };
        (controller, handle)
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn active_team_id(&self) -> Option<&TeamId> {
        self.session.active_team_id.as_ref()
    }

    pub fn roster(&self) -> &[MemberRecord] {
        &self.session.roster
    }

    pub fn table(&self) -> &RosterTable {
        &self.table
    }

    pub fn holds_scanner(&self) -> bool {
        self.session.scanner.is_some()
    }

    /// Starts scanning and processes events until shutdown.
    pub async fn run(mut self) {
        self.start_scanning().await;
        while self.step().await {}
        self.release_scanner("shutdown").await;
        info!("workflow controller stopped");
    }

    /// Handles the next queued event. Returns `false` on shutdown.
    pub async fn step(&mut self) -> bool {
        let Some(inbound) = self.inbound_rx.recv().await else {
            return false;
        };
        self.handle(inbound).await
    }

    async fn handle(&mut self, inbound: Inbound) -> bool {
        match inbound {
            Inbound::Command(WorkflowCommand::Shutdown) => return false,
            Inbound::Command(WorkflowCommand::SetCheckbox { row, flag, checked }) => {
                self.set_checkbox(row, flag, checked);
            }
            Inbound::Command(WorkflowCommand::ToggleCheckbox { row, flag }) => {
                match self.table.checkbox(row, flag) {
                    Some(checked) => self.set_checkbox(row, flag, !checked),
                    None => self.set_checkbox(row, flag, true),
                }
            }
            Inbound::Command(WorkflowCommand::Submit) => self.submit(),
            Inbound::Command(WorkflowCommand::ScanNext) => self.scan_next().await,
            Inbound::Decoded {
                scanner_generation,
                text,
            } => self.on_decoded(scanner_generation, &text),
            Inbound::FetchCompleted {
                generation,
                team_id,
                result,
            } => self.on_fetch_completed(generation, team_id, result).await,
            Inbound::SubmitCompleted { generation, result } => {
                self.on_submit_completed(generation, result);
            }
        }
        true
    }

    /// Idle → Scanning. On failure the controller stays Idle; it does not retry
    /// on its own.
    pub async fn start_scanning(&mut self) {
        if self.session.scanner.is_some() {
            debug!("scanner already acquired");
            self.transition(WorkflowState::Scanning);
            return;
        }

        self.emit(UiEvent::LoadingIndicator(true));
        self.scanner_generation += 1;
        let scanner_generation = self.scanner_generation;

        let started = tokio::time::timeout(
            self.settings.scanner_start_timeout,
            self.capability
                .start(&self.settings.scan_region, &self.settings.scan),
        )
        .await;

        match started {
            Ok(Ok(ScanSession { handle, decoded })) => {
                self.session.scanner = Some(handle);
                self.spawn_decode_forwarder(scanner_generation, decoded);
                info!(
                    region = %self.settings.scan_region,
                    frame_rate = self.settings.scan.frame_rate,
                    "scanner started"
                );
                self.transition(WorkflowState::Scanning);
            }
            Ok(Err(error)) => {
                error!(%error, "scanner start error");
                self.notify(Notice::warning(CAMERA_ACCESS_MESSAGE));
                self.transition(WorkflowState::Idle);
            }
            Err(_) => {
                error!(
                    timeout = ?self.settings.scanner_start_timeout,
                    "scanner did not become ready"
                );
                self.notify(Notice::warning(CAMERA_ACCESS_MESSAGE));
                self.transition(WorkflowState::Idle);
            }
        }

        self.emit(UiEvent::LoadingIndicator(false));
    }

    fn spawn_decode_forwarder(&self, scanner_generation: u64, mut decoded: mpsc::Receiver<String>) {
        let inbound = self.inbound_tx.clone();
        tokio::spawn(async move {
            while let Some(text) = decoded.recv().await {
                if inbound
                    .send(Inbound::Decoded {
                        scanner_generation,
                        text,
                    })
                    .is_err()
                {
                    break;
                }
            }
            debug!(scanner_generation, "decode stream ended");
        });
    }

    fn on_decoded(&mut self, scanner_generation: u64, text: &str) {
        if scanner_generation != self.scanner_generation || self.state != WorkflowState::Scanning {
            debug!(?self.state, "dropping decode outside of scanning");
            return;
        }
        if let Some(team_id) = &self.pending_fetch {
            debug!(%team_id, "team lookup in flight; dropping decode");
            return;
        }

        let payload = match ScanPayload::parse(text) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%error, "rejected scan payload");
                self.notify(Notice::warning(error.user_message()));
                return;
            }
        };

        let team_id = payload.team_id;
        info!(%team_id, "team code scanned");
        self.pending_fetch = Some(team_id.clone());

        let backend = Arc::clone(&self.backend);
        let inbound = self.inbound_tx.clone();
        let generation = self.session.generation;
        tokio::spawn(async move {
            let result = backend.fetch_team(&team_id).await;
            let _ = inbound.send(Inbound::FetchCompleted {
                generation,
                team_id,
                result,
            });
        });
    }

    async fn on_fetch_completed(
        &mut self,
        generation: u64,
        team_id: TeamId,
        result: Result<TeamDetails, ClientError>,
    ) {
        if generation != self.session.generation
            || self.state != WorkflowState::Scanning
            || self.pending_fetch.as_ref() != Some(&team_id)
        {
            debug!(%team_id, "discarding stale team lookup");
            return;
        }
        self.pending_fetch = None;

        let details = match result {
            Ok(details) => details,
            Err(ClientError::Backend(message)) => {
                warn!(%team_id, %message, "backend rejected team lookup");
                self.notify(Notice::warning(message));
                return;
            }
            Err(error) => {
                warn!(%team_id, %error, "error fetching team details");
                self.notify(Notice::warning(FETCH_FAILED_MESSAGE));
                return;
            }
        };

        info!(
            %team_id,
            team_name = %details.team_name,
            members = details.members.len(),
            "team loaded"
        );
        self.session.active_team_id = Some(team_id);
        self.session.roster = details.members;
        self.table.render(&details.team_name, &self.session.roster);

        self.emit(UiEvent::TeamName(details.team_name));
        self.emit(UiEvent::RosterRendered(self.table.rows().to_vec()));
        self.emit(UiEvent::ReviewVisible(true));
        self.emit(UiEvent::ScanNextVisible(true));
        self.transition(WorkflowState::Reviewing);

        self.release_scanner("team loaded").await;
    }

    fn set_checkbox(&mut self, row: usize, flag: AttendanceFlag, checked: bool) {
        if !matches!(
            self.state,
            WorkflowState::Reviewing | WorkflowState::Submitting
        ) {
            debug!(?self.state, "ignoring checkbox edit without a roster");
            return;
        }
        if self.table.set_checkbox(row, flag, checked).is_none() {
            self.notify(Notice::warning(format!("No member in row {}.", row + 1)));
            return;
        }
        if let Some(member) = self.session.roster.get_mut(row) {
            member.flags.set(flag, checked);
        }
        self.emit(UiEvent::CheckboxChanged { row, flag, checked });
    }

    fn submit(&mut self) {
        match self.state {
            WorkflowState::Reviewing => {}
            WorkflowState::Submitting => {
                debug!("submission already in flight; ignoring submit");
                return;
            }
            WorkflowState::Idle | WorkflowState::Scanning => {
                self.notify(Notice::warning(NO_TEAM_MESSAGE));
                return;
            }
        }
        let Some(team_id) = self.session.active_team_id.clone() else {
            self.notify(Notice::warning(NO_TEAM_MESSAGE));
            return;
        };

        let members = self.table.read_updates();
        if members.is_empty() {
            self.notify(Notice::warning(NO_MEMBERS_MESSAGE));
            return;
        }

        info!(%team_id, members = members.len(), "submitting attendance");
        self.transition(WorkflowState::Submitting);

        let backend = Arc::clone(&self.backend);
        let inbound = self.inbound_tx.clone();
        let generation = self.session.generation;
        tokio::spawn(async move {
            let result = backend.update_members(&team_id, members).await;
            let _ = inbound.send(Inbound::SubmitCompleted { generation, result });
        });
    }

    fn on_submit_completed(&mut self, generation: u64, result: Result<UpdateAck, ClientError>) {
        if generation != self.session.generation || self.state != WorkflowState::Submitting {
            match &result {
                Ok(ack) => {
                    info!(
                        status = ?ack.status,
                        "discarding submission result for a closed session"
                    );
                }
                Err(error) => {
                    warn!(%error, "discarding failed submission for a closed session");
                }
            }
            return;
        }
        self.transition(WorkflowState::Reviewing);

        match result {
            Ok(ack) if ack.is_updated() => {
                info!("attendance updated");
                self.notify(Notice::success(UPDATED_MESSAGE));
            }
            Ok(ack) => {
                warn!(status = ?ack.status, "update not acknowledged");
                self.notify(Notice::warning(UPDATE_REJECTED_MESSAGE));
            }
            Err(ClientError::Backend(message)) => {
                warn!(%message, "backend rejected update");
                self.notify(Notice::warning(UPDATE_REJECTED_MESSAGE));
            }
            Err(error) => {
                error!(%error, "error updating members");
                self.notify(Notice::warning(UPDATE_FAILED_MESSAGE));
            }
        }
    }

    /// Reviewing → Idle → Scanning. Safe to call with an empty session.
    async fn scan_next(&mut self) {
        if self.state == WorkflowState::Scanning {
            debug!("already scanning; ignoring scan next");
            return;
        }

        self.emit(UiEvent::ReviewVisible(false));
        self.emit(UiEvent::ScanNextVisible(false));

        self.session.active_team_id = None;
        self.session.roster.clear();
        self.session.generation += 1;
        self.table.clear();
        self.pending_fetch = None;

        self.release_scanner("scan next").await;
        self.transition(WorkflowState::Idle);

        tokio::time::sleep(self.settings.restart_delay).await;
        self.start_scanning().await;
    }

    /// Teardown errors are logged, never surfaced.
    async fn release_scanner(&mut self, reason: &'static str) {
        let Some(mut handle) = self.session.scanner.take() else {
            return;
        };
        if let Err(error) = handle.stop().await {
            warn!(reason, %error, "error stopping scanner");
        }
        if let Err(error) = handle.clear().await {
            warn!(reason, %error, "error clearing scanner");
        }
        debug!(reason, "scanner released");
    }

    fn transition(&mut self, next: WorkflowState) {
        if self.state == next {
            return;
        }
        debug!(from = ?self.state, to = ?next, "workflow transition");
        self.state = next;
        self.emit(UiEvent::StateChanged(next));
    }

    fn notify(&self, notice: Notice) {
        self.emit(UiEvent::Notice(notice));
    }

    fn emit(&self, event: UiEvent) {
        let _ = self.ui_tx.send(event);
    }
}

#[cfg(test)]
#[path = "../tests/workflow_tests.rs"]
mod tests;
