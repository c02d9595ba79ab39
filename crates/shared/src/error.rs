use thiserror::Error;

/// Why a decoded scan could not be used as a team code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("scanned text is not valid JSON: {0}")]
    Malformed(String),
    #[error("scanned payload has no team_id")]
    MissingTeamId,
}

impl PayloadError {
    /// Text shown to the operator.
    pub fn user_message(&self) -> &'static str {
        match self {
            PayloadError::Malformed(_) => "Invalid QR Code. Please scan a valid team QR.",
            PayloadError::MissingTeamId => "QR Code missing team_id.",
        }
    }
}

/// Why a team lookup body carries no usable team.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetailsError {
    /// The backend's own `error` text.
    #[error("{0}")]
    Rejected(String),
    #[error("response has no team object")]
    MissingTeam,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown attendance flag '{0}'")]
pub struct ParseFlagError(pub String);
