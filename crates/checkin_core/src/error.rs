use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("team id must not be empty")]
    EmptyTeamId,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Error text reported by the backend in an `{"error": ...}` body.
    #[error("{0}")]
    Backend(String),
    /// A JSON body with neither an `error` nor a `team` object.
    #[error("server response (HTTP {status}) has no team details")]
    MissingTeam { status: u16 },
    #[error("server returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("could not decode server response: {0}")]
    Decode(#[from] serde_json::Error),
}
