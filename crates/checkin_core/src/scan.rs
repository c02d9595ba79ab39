//! Seam for the camera-driven QR decoder.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    Environment,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub preferred_facing: CameraFacing,
    pub frame_rate: u32,
    pub detection_box_size: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            preferred_facing: CameraFacing::Environment,
            frame_rate: 10,
            detection_box_size: 250,
        }
    }
}

/// A running scanner: its control handle plus the stream of decoded text.
///
/// The capability keeps sending on `decoded` until the handle is stopped;
/// dropping the sender side ends the stream.
pub struct ScanSession {
    pub handle: Box<dyn ScannerHandle>,
    pub decoded: mpsc::Receiver<String>,
}

#[async_trait]
pub trait ScanCapability: Send + Sync {
    /// Acquires the scanner bound to `region` and resolves once it is ready to
    /// decode.
    async fn start(&self, region: &str, config: &ScanConfig) -> anyhow::Result<ScanSession>;
}

#[async_trait]
pub trait ScannerHandle: Send + Sync {
    async fn stop(&mut self) -> anyhow::Result<()>;
    /// Releases the display region and any remaining resources.
    async fn clear(&mut self) -> anyhow::Result<()>;
}
