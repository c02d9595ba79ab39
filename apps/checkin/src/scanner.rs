//! Line-oriented scan capability: each line read while scanning is one decoded
//! code, which is how keyboard-wedge QR readers deliver them.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use checkin_core::{ScanCapability, ScanConfig, ScanSession, ScannerHandle};
use tokio::sync::mpsc;
use tracing::{debug, info};

const DECODE_QUEUE: usize = 16;

type Sink = Arc<Mutex<Option<mpsc::Sender<String>>>>;

#[derive(Clone, Default)]
pub struct LineScanner {
    sink: Sink,
}

impl LineScanner {
    pub fn is_active(&self) -> bool {
        self.sink.lock().map(|sink| sink.is_some()).unwrap_or(false)
    }

    /// Hands one line to the running scanner. Returns `false` when no scanner
    /// is running or its queue is full.
    pub fn deliver(&self, text: &str) -> bool {
        let Ok(sink) = self.sink.lock() else {
            return false;
        };
        match sink.as_ref() {
            Some(tx) => tx.try_send(text.to_string()).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl ScanCapability for LineScanner {
    async fn start(&self, region: &str, config: &ScanConfig) -> anyhow::Result<ScanSession> {
        let decoded = {
            let mut sink = self
                .sink
                .lock()
                .map_err(|_| anyhow!("scanner state poisoned"))?;
            if sink.is_some() {
                bail!("a scanner is already running in region '{region}'");
            }
            let (tx, rx) = mpsc::channel(DECODE_QUEUE);
            *sink = Some(tx);
            rx
        };

        info!(
            region,
            facing = ?config.preferred_facing,
            frame_rate = config.frame_rate,
            box_size = config.detection_box_size,
            "line scanner ready"
        );
        Ok(ScanSession {
            handle: Box::new(LineScannerHandle {
                sink: Arc::clone(&self.sink),
                running: true,
            }),
            decoded,
        })
    }
}

struct LineScannerHandle {
    sink: Sink,
    running: bool,
}

#[async_trait]
impl ScannerHandle for LineScannerHandle {
    async fn stop(&mut self) -> anyhow::Result<()> {
        if !self.running {
            bail!("scanner is not running");
        }
        self.running = false;
        self.sink
            .lock()
            .map_err(|_| anyhow!("scanner state poisoned"))?
            .take();
        debug!("line scanner stopped");
        Ok(())
    }

    async fn clear(&mut self) -> anyhow::Result<()> {
        if self.running {
            bail!("cannot clear a running scanner");
        }
        Ok(())
    }
}
