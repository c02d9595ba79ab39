//! Text rendering of controller UI events.

use checkin_core::{Notice, NoticeLevel, RosterRow, UiEvent, WorkflowState};
use shared::domain::{AttendanceFlag, TeamDetails};

const NAME_WIDTH: usize = 20;

fn column_header(flag: AttendanceFlag) -> &'static str {
    match flag {
        AttendanceFlag::CheckIn => "IN",
        AttendanceFlag::Refreshment1 => "RF1",
        AttendanceFlag::Round1 => "RD1",
        AttendanceFlag::Dinner => "DIN",
        AttendanceFlag::Refreshment2 => "RF2",
        AttendanceFlag::Round2 => "RD2",
        AttendanceFlag::Refreshment3 => "RF3",
        AttendanceFlag::Round3 => "RD3",
        AttendanceFlag::CheckOut => "OUT",
    }
}

#[derive(Debug, Default)]
pub struct TerminalView {
    team_name: Option<String>,
    rows: Vec<RosterRow>,
}

impl TerminalView {
    /// Applies one event and returns the lines to print.
    pub fn apply(&mut self, event: UiEvent) -> Vec<String> {
        match event {
            UiEvent::LoadingIndicator(true) => vec!["⏳ Starting scanner...".to_string()],
            UiEvent::LoadingIndicator(false) => Vec::new(),
            UiEvent::StateChanged(WorkflowState::Scanning) => vec![
                "📷 Ready. Scan a team QR code (or paste its text) and press Enter.".to_string(),
            ],
            UiEvent::StateChanged(WorkflowState::Submitting) => vec!["Submitting...".to_string()],
            UiEvent::StateChanged(WorkflowState::Idle | WorkflowState::Reviewing) => Vec::new(),
            UiEvent::TeamName(name) => {
                self.team_name = Some(name);
                Vec::new()
            }
            UiEvent::RosterRendered(rows) => {
                self.rows = rows;
                self.render_table()
            }
            UiEvent::CheckboxChanged { row, flag, checked } => {
                let Some(entry) = self.rows.get_mut(row) else {
                    return Vec::new();
                };
                entry.checkboxes.set(flag, checked);
                vec![format!(
                    "{}: {} {}",
                    entry.member_name,
                    flag,
                    checkbox(checked)
                )]
            }
            UiEvent::ReviewVisible(true) => Vec::new(),
            UiEvent::ReviewVisible(false) => {
                self.team_name = None;
                self.rows.clear();
                Vec::new()
            }
            UiEvent::ScanNextVisible(true) => vec![
                "Edit with `toggle <row> <flag>`, then `submit`.".to_string(),
                "Type `next` for the next team, `help` for more.".to_string(),
            ],
            UiEvent::ScanNextVisible(false) => Vec::new(),
            UiEvent::Notice(notice) => vec![notice_line(&notice)],
        }
    }

    pub fn render_table(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(format!(
            "Team: {}",
            self.team_name.as_deref().unwrap_or("(none)")
        ));

        let mut header = format!(" # {:<NAME_WIDTH$}", "member");
        for flag in AttendanceFlag::ALL {
            header.push_str(&format!(" {:^5}", column_header(flag)));
        }
        lines.push(header.trim_end().to_string());

        for (index, row) in self.rows.iter().enumerate() {
            let mut line = format!("{:>2} {:<NAME_WIDTH$}", index + 1, truncate(&row.member_name));
            for (_, checked) in row.checkboxes.iter() {
                line.push_str(&format!(" {:^5}", checkbox(checked)));
            }
            lines.push(line.trim_end().to_string());
        }
        if self.rows.is_empty() {
            lines.push("   (no members)".to_string());
        }
        lines
    }
}

/// One-off rendering for `checkin lookup`.
pub fn render_details(details: &TeamDetails) -> Vec<String> {
    let view = TerminalView {
        team_name: Some(details.team_name.clone()),
        rows: details
            .members
            .iter()
            .map(|member| RosterRow {
                member_id: member.member_id.clone(),
                member_name: member.member_name.clone(),
                checkboxes: member.flags,
            })
            .collect(),
    };
    view.render_table()
}

pub fn notice_line(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Success => format!("✅ {}", notice.message),
        NoticeLevel::Warning => format!("⚠️ {}", notice.message),
    }
}

fn checkbox(checked: bool) -> &'static str {
    if checked {
        "[x]"
    } else {
        "[ ]"
    }
}

fn truncate(name: &str) -> String {
    if name.chars().count() <= NAME_WIDTH {
        return name.to_string();
    }
    let mut short: String = name.chars().take(NAME_WIDTH - 1).collect();
    short.push('…');
    short
}
