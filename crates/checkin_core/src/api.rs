//! HTTP clients for the team lookup and batch update endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_DISPOSITION, Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{TeamDetails, TeamId},
    protocol::{
        MemberUpdate, StatsResponse, TeamDetailsRequest, TeamDetailsResponse, UpdateAck,
        UpdateMembersRequest, EVENT_REPORT_ROUTE, EXPORT_QRS_ROUTE, STATS_ROUTE,
        TEAM_DETAILS_ROUTE, TEAM_QR_ROUTE, UPDATE_MEMBERS_ROUTE,
    },
    error::DetailsError,
};
use tracing::debug;
use url::Url;

use crate::error::ClientError;

const MAX_ERROR_BODY_CHARS: usize = 200;

#[async_trait]
pub trait AttendanceBackend: Send + Sync {
    /// One lookup, no retries.
    async fn fetch_team(&self, team_id: &TeamId) -> Result<TeamDetails, ClientError>;

    /// One batch push. The returned ack is judged all-or-nothing by the caller.
    async fn update_members(
        &self,
        team_id: &TeamId,
        members: Vec<MemberUpdate>,
    ) -> Result<UpdateAck, ClientError>;
}

/// A file served by the backend, with the name it suggested for saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct HttpAttendanceClient {
    http: Client,
    base_url: Url,
}

impl HttpAttendanceClient {
    pub fn new(server_url: &str, request_timeout: Duration) -> Result<Self, ClientError> {
        let mut normalized = server_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized).map_err(|source| ClientError::InvalidUrl {
            url: server_url.to_string(),
            source,
        })?;
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn fetch_stats(&self) -> Result<StatsResponse, ClientError> {
        let url = self.endpoint(STATS_ROUTE)?;
        let res = self.http.get(url).send().await?;
        let (_, stats) = decode_body(res).await?;
        Ok(stats)
    }

    /// The printable QR image for one team.
    pub async fn download_team_qr(&self, team_id: &TeamId) -> Result<Download, ClientError> {
        if team_id.as_str().is_empty() {
            return Err(ClientError::EmptyTeamId);
        }
        let mut url = self.endpoint(TEAM_QR_ROUTE)?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(team_id.as_str());
        }
        self.download(url).await
    }

    /// Every team's QR image in one zip archive.
    pub async fn export_qrs(&self) -> Result<Download, ClientError> {
        let url = self.endpoint(EXPORT_QRS_ROUTE)?;
        self.download(url).await
    }

    /// The PDF event report.
    pub async fn event_report(&self) -> Result<Download, ClientError> {
        let url = self.endpoint(EVENT_REPORT_ROUTE)?;
        self.download(url).await
    }

    fn endpoint(&self, route: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(route)
            .map_err(|source| ClientError::InvalidUrl {
                url: format!("{}{route}", self.base_url),
                source,
            })
    }

    async fn download(&self, url: Url) -> Result<Download, ClientError> {
        debug!(%url, "downloading from backend");
        let res = self.http.get(url).send().await?;
        let status = res.status();
        let file_name = res
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(attachment_name);
        let bytes = res.bytes().await?;
        if !status.is_success() {
            return Err(unexpected_status(status, &bytes));
        }
        Ok(Download {
            file_name,
            bytes: bytes.to_vec(),
        })
    }

    async fn post_json<B, R>(&self, route: &str, body: &B) -> Result<(StatusCode, R), ClientError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint(route)?;
        debug!(%url, "posting to backend");
        let res = self.http.post(url).json(body).send().await?;
        decode_body(res).await
    }
}

/// The backend pairs 4xx statuses with a JSON `error` body, so the body is
/// decoded before the status is judged.
async fn decode_body<R: DeserializeOwned>(
    res: reqwest::Response,
) -> Result<(StatusCode, R), ClientError> {
    let status = res.status();
    let bytes = res.bytes().await?;
    match serde_json::from_slice::<R>(&bytes) {
        Ok(body) => Ok((status, body)),
        Err(_) if !status.is_success() => Err(unexpected_status(status, &bytes)),
        Err(err) => Err(ClientError::Decode(err)),
    }
}

fn unexpected_status(status: StatusCode, body: &[u8]) -> ClientError {
    ClientError::UnexpectedStatus {
        status: status.as_u16(),
        body: String::from_utf8_lossy(body)
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect(),
    }
}

/// File name from `Content-Disposition`, reduced to its last path component.
fn attachment_name(header: &str) -> Option<String> {
    let raw = header.split(';').map(str::trim).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| value.trim().trim_matches('"'))
    })?;
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    (!name.is_empty() && name != "." && name != "..").then(|| name.to_string())
}

#[async_trait]
impl AttendanceBackend for HttpAttendanceClient {
    async fn fetch_team(&self, team_id: &TeamId) -> Result<TeamDetails, ClientError> {
        if team_id.as_str().is_empty() {
            return Err(ClientError::EmptyTeamId);
        }
        let (status, response): (StatusCode, TeamDetailsResponse) = self
            .post_json(
                TEAM_DETAILS_ROUTE,
                &TeamDetailsRequest {
                    team_id: team_id.clone(),
                },
            )
            .await?;
        response.into_details().map_err(|err| match err {
            DetailsError::Rejected(message) => ClientError::Backend(message),
            DetailsError::MissingTeam => ClientError::MissingTeam {
                status: status.as_u16(),
            },
        })
    }

    async fn update_members(
        &self,
        team_id: &TeamId,
        members: Vec<MemberUpdate>,
    ) -> Result<UpdateAck, ClientError> {
        let (_, mut ack): (StatusCode, UpdateAck) = self
            .post_json(
                UPDATE_MEMBERS_ROUTE,
                &UpdateMembersRequest {
                    team_id: team_id.clone(),
                    members,
                },
            )
            .await?;
        if let Some(error) = ack.take_error() {
            return Err(ClientError::Backend(error));
        }
        Ok(ack)
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
