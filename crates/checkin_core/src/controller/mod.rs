//! Controller layer: the scan → review → submit state machine and its event types.

pub mod events;
pub mod workflow;

pub use events::{Notice, NoticeLevel, UiEvent, WorkflowCommand, WorkflowState};
pub use workflow::{WorkflowController, WorkflowHandle, WorkflowSettings};
