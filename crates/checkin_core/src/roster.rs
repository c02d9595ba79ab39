//! View model of the rendered roster table.

use shared::{
    domain::{AttendanceFlag, AttendanceFlags, MemberId, MemberRecord},
    protocol::MemberUpdate,
};

/// One table row: the member's name cell followed by nine checkbox cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub member_id: MemberId,
    pub member_name: String,
    pub checkboxes: AttendanceFlags,
}

#[derive(Debug, Clone, Default)]
pub struct RosterTable {
    team_name: Option<String>,
    rows: Vec<RosterRow>,
}

impl RosterTable {
    /// Replaces whatever was rendered before.
    pub fn render(&mut self, team_name: &str, members: &[MemberRecord]) {
        self.team_name = Some(team_name.to_string());
        self.rows = members
            .iter()
            .map(|member| RosterRow {
                member_id: member.member_id.clone(),
                member_name: member.member_name.clone(),
                checkboxes: member.flags,
            })
            .collect();
    }

    pub fn clear(&mut self) {
        self.team_name = None;
        self.rows.clear();
    }

    pub fn team_name(&self) -> Option<&str> {
        self.team_name.as_deref()
    }

    pub fn rows(&self) -> &[RosterRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns `None` when `row` is not rendered.
    pub fn set_checkbox(&mut self, row: usize, flag: AttendanceFlag, checked: bool) -> Option<()> {
        let row = self.rows.get_mut(row)?;
        row.checkboxes.set(flag, checked);
        Some(())
    }

    pub fn checkbox(&self, row: usize, flag: AttendanceFlag) -> Option<bool> {
        self.rows.get(row).map(|row| row.checkboxes.get(flag))
    }

    /// Live checkbox state of every row, in table order.
    pub fn read_updates(&self) -> Vec<MemberUpdate> {
        self.rows
            .iter()
            .map(|row| MemberUpdate::new(row.member_id.clone(), row.checkboxes))
            .collect()
    }
}
