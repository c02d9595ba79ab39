//! Wire types for the attendance backend and the scanned QR payload.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    domain::{AttendanceFlag, AttendanceFlags, MemberId, MemberRecord, TeamDetails, TeamId},
    error::{DetailsError, PayloadError},
};

pub const TEAM_DETAILS_ROUTE: &str = "get_team_details";
pub const UPDATE_MEMBERS_ROUTE: &str = "update_members";
pub const STATS_ROUTE: &str = "stats";
/// Followed by `/<team_id>`; served as a PNG attachment.
pub const TEAM_QR_ROUTE: &str = "download_qr";
pub const EXPORT_QRS_ROUTE: &str = "export_qrs";
pub const EVENT_REPORT_ROUTE: &str = "event_report";

pub const UPDATED_STATUS: &str = "updated";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamDetailsRequest {
    pub team_id: TeamId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamDetailsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<MemberRow>>,
}

impl TeamDetailsResponse {
    /// Splits a response body into team details or the backend's error text.
    /// An empty `error` counts as absent.
    pub fn into_details(self) -> Result<TeamDetails, DetailsError> {
        if let Some(error) = non_empty(self.error) {
            return Err(DetailsError::Rejected(error));
        }
        let team = self.team.ok_or(DetailsError::MissingTeam)?;

        Ok(TeamDetails {
            team_name: team.team_name,
            members: self
                .members
                .unwrap_or_default()
                .into_iter()
                .map(MemberRecord::from)
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSummary {
    pub team_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// The nine flag columns, each `0` or `1` on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFlags {
    #[serde(default, deserialize_with = "flag_bit")]
    pub check_in: u8,
    #[serde(default, deserialize_with = "flag_bit")]
    pub snacks: u8,
    #[serde(default, deserialize_with = "flag_bit")]
    pub round1: u8,
    #[serde(default, deserialize_with = "flag_bit")]
    pub dinner: u8,
    #[serde(default, deserialize_with = "flag_bit")]
    pub refresh2: u8,
    #[serde(default, deserialize_with = "flag_bit")]
    pub round2: u8,
    #[serde(default, deserialize_with = "flag_bit")]
    pub refresh3: u8,
    #[serde(default, deserialize_with = "flag_bit")]
    pub round3: u8,
    #[serde(default, deserialize_with = "flag_bit")]
    pub check_out: u8,
}

impl WireFlags {
    fn slot(&mut self, flag: AttendanceFlag) -> &mut u8 {
        match flag {
            AttendanceFlag::CheckIn => &mut self.check_in,
            AttendanceFlag::Refreshment1 => &mut self.snacks,
            AttendanceFlag::Round1 => &mut self.round1,
            AttendanceFlag::Dinner => &mut self.dinner,
            AttendanceFlag::Refreshment2 => &mut self.refresh2,
            AttendanceFlag::Round2 => &mut self.round2,
            AttendanceFlag::Refreshment3 => &mut self.refresh3,
            AttendanceFlag::Round3 => &mut self.round3,
            AttendanceFlag::CheckOut => &mut self.check_out,
        }
    }
}

impl From<AttendanceFlags> for WireFlags {
    fn from(flags: AttendanceFlags) -> Self {
        let mut wire = WireFlags::default();
        for (flag, checked) in flags.iter() {
            *wire.slot(flag) = u8::from(checked);
        }
        wire
    }
}

impl From<WireFlags> for AttendanceFlags {
    fn from(mut wire: WireFlags) -> Self {
        let mut flags = AttendanceFlags::default();
        for flag in AttendanceFlag::ALL {
            flags.set(flag, *wire.slot(flag) == 1);
        }
        flags
    }
}

/// Member row as the backend stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRow {
    #[serde(deserialize_with = "lenient_member_id")]
    pub member_id: MemberId,
    #[serde(default)]
    pub member_name: String,
    #[serde(flatten)]
    pub flags: WireFlags,
}

impl From<MemberRow> for MemberRecord {
    fn from(row: MemberRow) -> Self {
        Self {
            member_id: row.member_id,
            member_name: row.member_name,
            flags: row.flags.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMembersRequest {
    pub team_id: TeamId,
    pub members: Vec<MemberUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberUpdate {
    #[serde(deserialize_with = "lenient_member_id")]
    pub member_id: MemberId,
    #[serde(flatten)]
    pub flags: WireFlags,
}

impl MemberUpdate {
    pub fn new(member_id: MemberId, flags: AttendanceFlags) -> Self {
        Self {
            member_id,
            flags: flags.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateAck {
    pub fn is_updated(&self) -> bool {
        self.status.as_deref() == Some(UPDATED_STATUS)
    }

    /// Takes the backend's rejection text, ignoring an empty `error`.
    pub fn take_error(&mut self) -> Option<String> {
        non_empty(self.error.take())
    }
}

/// Event-wide totals for the headline checkpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub check_in: i64,
    #[serde(default)]
    pub snacks: i64,
    #[serde(default)]
    pub dinner: i64,
    #[serde(default)]
    pub check_out: i64,
}

/// Decoded QR content. The printed codes also carry `team_name` and a member
/// list; only `team_id` is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPayload {
    pub team_id: TeamId,
}

impl ScanPayload {
    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        let value: Value =
            serde_json::from_str(text).map_err(|err| PayloadError::Malformed(err.to_string()))?;

        let team_id = match value.get("team_id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) if id.as_f64() != Some(0.0) => id.to_string(),
            _ => return Err(PayloadError::MissingTeamId),
        };

        Ok(Self {
            team_id: TeamId(team_id),
        })
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|text| !text.is_empty())
}

fn flag_bit<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let checked = match raw {
        Some(Value::Number(n)) => n.as_f64() == Some(1.0),
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => s.trim() == "1",
        _ => false,
    };
    Ok(u8::from(checked))
}

fn lenient_member_id<'de, D>(deserializer: D) -> Result<MemberId, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(MemberId(id)),
        Value::Number(id) => Ok(MemberId(id.to_string())),
        other => Err(de::Error::custom(format!(
            "member_id must be a string or number, got {other}"
        ))),
    }
}
