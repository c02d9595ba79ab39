pub mod api;
pub mod controller;
pub mod error;
pub mod roster;
pub mod scan;

pub use api::{AttendanceBackend, Download, HttpAttendanceClient};
pub use controller::{
    Notice, NoticeLevel, UiEvent, WorkflowCommand, WorkflowController, WorkflowHandle,
    WorkflowSettings, WorkflowState,
};
pub use error::ClientError;
pub use roster::{RosterRow, RosterTable};
pub use scan::{CameraFacing, ScanCapability, ScanConfig, ScanSession, ScannerHandle};
