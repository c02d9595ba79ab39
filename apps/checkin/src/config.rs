use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use checkin_core::{ScanConfig, WorkflowSettings};
use serde::Deserialize;
use url::Url;

const DEFAULT_CONFIG_FILE: &str = "checkin.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_url: String,
    pub request_timeout: Duration,
    pub restart_delay: Duration,
    pub scanner_start_timeout: Duration,
    pub scan_region: String,
    pub scan: ScanConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let workflow = WorkflowSettings::default();
        Self {
            server_url: "http://127.0.0.1:10000".into(),
            request_timeout: Duration::from_secs(10),
            restart_delay: workflow.restart_delay,
            scanner_start_timeout: workflow.scanner_start_timeout,
            scan_region: workflow.scan_region,
            scan: workflow.scan,
        }
    }
}

impl Settings {
    pub fn workflow(&self) -> WorkflowSettings {
        WorkflowSettings {
            scan: self.scan.clone(),
            scan_region: self.scan_region.clone(),
            restart_delay: self.restart_delay,
            scanner_start_timeout: self.scanner_start_timeout,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server_url: Option<String>,
    request_timeout_ms: Option<u64>,
    restart_delay_ms: Option<u64>,
    scanner_start_timeout_ms: Option<u64>,
    scan_region: Option<String>,
    scan: Option<ScanConfig>,
}

/// Defaults, then `checkin.toml` (or the explicit `path`), then environment.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (file, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(&file) {
        Ok(raw) => {
            let file_cfg: FileConfig = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file '{}'", file.display()))?;
            apply_file(&mut settings, file_cfg);
        }
        Err(err) if required => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", file.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileConfig) {
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.request_timeout_ms {
        settings.request_timeout = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.restart_delay_ms {
        settings.restart_delay = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.scanner_start_timeout_ms {
        settings.scanner_start_timeout = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.scan_region {
        settings.scan_region = v;
    }
    if let Some(v) = file_cfg.scan {
        settings.scan = v;
    }
}

fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("CHECKIN_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = lookup("CHECKIN_REQUEST_TIMEOUT_MS") {
        settings.request_timeout = parse_millis("CHECKIN_REQUEST_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = lookup("CHECKIN_RESTART_DELAY_MS") {
        settings.restart_delay = parse_millis("CHECKIN_RESTART_DELAY_MS", &v)?;
    }
    if let Some(v) = lookup("CHECKIN_SCANNER_START_TIMEOUT_MS") {
        settings.scanner_start_timeout = parse_millis("CHECKIN_SCANNER_START_TIMEOUT_MS", &v)?;
    }

    Ok(())
}

fn parse_millis(key: &str, raw: &str) -> anyhow::Result<Duration> {
    let millis = raw
        .trim()
        .parse::<u64>()
        .with_context(|| format!("{key} must be a whole number of milliseconds, got '{raw}'"))?;
    Ok(Duration::from_millis(millis))
}

pub fn validate_server_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid server url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("server url '{raw}' must use http or https");
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
