use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParseFlagError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(TeamId);
id_newtype!(MemberId);

/// One attendance checkpoint. Declaration order is the fixed display order of
/// the roster table columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceFlag {
    #[serde(rename = "check_in")]
    CheckIn,
    #[serde(rename = "snacks")]
    Refreshment1,
    #[serde(rename = "round1")]
    Round1,
    #[serde(rename = "dinner")]
    Dinner,
    #[serde(rename = "refresh2")]
    Refreshment2,
    #[serde(rename = "round2")]
    Round2,
    #[serde(rename = "refresh3")]
    Refreshment3,
    #[serde(rename = "round3")]
    Round3,
    #[serde(rename = "check_out")]
    CheckOut,
}

pub const FLAG_COUNT: usize = 9;

impl AttendanceFlag {
    pub const ALL: [AttendanceFlag; FLAG_COUNT] = [
        AttendanceFlag::CheckIn,
        AttendanceFlag::Refreshment1,
        AttendanceFlag::Round1,
        AttendanceFlag::Dinner,
        AttendanceFlag::Refreshment2,
        AttendanceFlag::Round2,
        AttendanceFlag::Refreshment3,
        AttendanceFlag::Round3,
        AttendanceFlag::CheckOut,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Column name used by the backend.
    pub fn wire_name(self) -> &'static str {
        match self {
            AttendanceFlag::CheckIn => "check_in",
            AttendanceFlag::Refreshment1 => "snacks",
            AttendanceFlag::Round1 => "round1",
            AttendanceFlag::Dinner => "dinner",
            AttendanceFlag::Refreshment2 => "refresh2",
            AttendanceFlag::Round2 => "round2",
            AttendanceFlag::Refreshment3 => "refresh3",
            AttendanceFlag::Round3 => "round3",
            AttendanceFlag::CheckOut => "check_out",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttendanceFlag::CheckIn => "check-in",
            AttendanceFlag::Refreshment1 => "refreshment-1",
            AttendanceFlag::Round1 => "round-1",
            AttendanceFlag::Dinner => "dinner",
            AttendanceFlag::Refreshment2 => "refreshment-2",
            AttendanceFlag::Round2 => "round-2",
            AttendanceFlag::Refreshment3 => "refreshment-3",
            AttendanceFlag::Round3 => "round-3",
            AttendanceFlag::CheckOut => "check-out",
        }
    }
}

impl fmt::Display for AttendanceFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AttendanceFlag {
    type Err = ParseFlagError;

    /// Accepts the display label, the backend column name, or a 1-based column
    /// number.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let needle = raw.trim().to_ascii_lowercase();
        if let Ok(column) = needle.parse::<usize>() {
            return column
                .checked_sub(1)
                .and_then(|index| Self::ALL.get(index).copied())
                .ok_or_else(|| ParseFlagError(raw.to_string()));
        }

        Self::ALL
            .into_iter()
            .find(|flag| flag.label() == needle || flag.wire_name() == needle)
            .ok_or_else(|| ParseFlagError(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceFlags([bool; FLAG_COUNT]);

impl AttendanceFlags {
    pub fn get(&self, flag: AttendanceFlag) -> bool {
        self.0[flag.index()]
    }

    pub fn set(&mut self, flag: AttendanceFlag, checked: bool) {
        self.0[flag.index()] = checked;
    }

    pub fn with(mut self, flag: AttendanceFlag, checked: bool) -> Self {
        self.set(flag, checked);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttendanceFlag, bool)> + '_ {
        AttendanceFlag::ALL
            .into_iter()
            .map(move |flag| (flag, self.get(flag)))
    }
}

impl From<[bool; FLAG_COUNT]> for AttendanceFlags {
    fn from(value: [bool; FLAG_COUNT]) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub member_id: MemberId,
    pub member_name: String,
    pub flags: AttendanceFlags,
}

/// Team metadata and roster as returned by a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamDetails {
    pub team_name: String,
    pub members: Vec<MemberRecord>,
}
