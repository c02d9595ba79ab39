//! Events flowing into and out of the workflow controller.

use shared::domain::AttendanceFlag;

use crate::roster::RosterRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Scanning,
    Reviewing,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
}

/// A blocking, user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

/// Presentation changes for the UI collaborator to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    LoadingIndicator(bool),
    TeamName(String),
    RosterRendered(Vec<RosterRow>),
    CheckboxChanged {
        row: usize,
        flag: AttendanceFlag,
        checked: bool,
    },
    ReviewVisible(bool),
    ScanNextVisible(bool),
    StateChanged(WorkflowState),
    Notice(Notice),
}

/// User actions. Rows are zero-based table indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowCommand {
    SetCheckbox {
        row: usize,
        flag: AttendanceFlag,
        checked: bool,
    },
    ToggleCheckbox {
        row: usize,
        flag: AttendanceFlag,
    },
    Submit,
    ScanNext,
    Shutdown,
}

impl WorkflowCommand {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowCommand::SetCheckbox { .. } => "set_checkbox",
            WorkflowCommand::ToggleCheckbox { .. } => "toggle_checkbox",
            WorkflowCommand::Submit => "submit",
            WorkflowCommand::ScanNext => "scan_next",
            WorkflowCommand::Shutdown => "shutdown",
        }
    }
}
