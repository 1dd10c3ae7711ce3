//! In-memory hardware for tests and dry runs.
//!
//! - `MockSession` records every call and keeps the last displayed mask and
//!   the last allocated sequence.
//! - `MockCamera` records the settings applied to it.
//!
//! Both support one-shot failure injection for exercising error paths.

use crate::camera::{CameraConfig, TriggeredCamera};
use crate::device::MaskBuffer;
use crate::sequence::MaskSequence;
use crate::session::DeviceSession;
use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::info;

/// One recorded session call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    /// `open` on the given monitor.
    Open {
        /// Monitor requested by the caller.
        monitor_index: u32,
    },
    /// `close`.
    Close,
    /// `push_mask` with a mask of this shape.
    PushMask {
        /// Shape of the pushed mask.
        shape: (usize, usize),
    },
    /// `push_sequence` with this many frames.
    PushSequence {
        /// Frame count of the pushed sequence.
        frames: usize,
    },
}

/// Simulated modulator connection.
///
/// # Example
///
/// ```
/// use optomask::session::{mock::MockSession, DeviceSession};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> anyhow::Result<()> {
/// let mut session = MockSession::new("slm");
/// session.open(0).await?;
/// assert!(session.is_open());
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockSession {
    name: String,
    open: bool,
    fail_after: Option<usize>,
    calls: Vec<SessionCall>,
    displayed: Option<MaskBuffer>,
    allocated: Option<MaskSequence>,
}

impl MockSession {
    /// Closed session named `name` (used in error messages).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Make the next call fail with an injected error.
    pub fn inject_next_failure(&mut self) {
        self.inject_failure_after(0);
    }

    /// Let `calls` more calls succeed, then fail the one after them.
    pub fn inject_failure_after(&mut self, calls: usize) {
        self.fail_after = Some(calls);
    }

    /// Whether the session is open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Every call so far, failed ones included.
    pub fn calls(&self) -> &[SessionCall] {
        &self.calls
    }

    /// Last mask pushed to the "screen".
    pub fn displayed(&self) -> Option<&MaskBuffer> {
        self.displayed.as_ref()
    }

    /// Last sequence allocated in "device memory".
    pub fn allocated(&self) -> Option<&MaskSequence> {
        self.allocated.as_ref()
    }

    fn record(&mut self, call: SessionCall) -> Result<()> {
        self.calls.push(call.clone());
        match self.fail_after {
            Some(0) => {
                self.fail_after = None;
                bail!("{}: injected failure on {:?}", self.name, call);
            }
            Some(remaining) => self.fail_after = Some(remaining - 1),
            None => {}
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.open {
            bail!("{}: session is not open", self.name);
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceSession for MockSession {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&mut self, monitor_index: u32) -> Result<()> {
        self.record(SessionCall::Open { monitor_index })?;
        self.open = true;
        info!(session = %self.name, monitor_index, "Mock session opened");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.record(SessionCall::Close)?;
        self.open = false;
        info!(session = %self.name, "Mock session closed");
        Ok(())
    }

    async fn push_mask(&mut self, mask: &MaskBuffer) -> Result<()> {
        self.record(SessionCall::PushMask {
            shape: mask.shape(),
        })?;
        self.ensure_open()?;
        self.displayed = Some(mask.clone());
        Ok(())
    }

    async fn push_sequence(&mut self, sequence: &MaskSequence) -> Result<()> {
        self.record(SessionCall::PushSequence {
            frames: sequence.frame_count(),
        })?;
        self.ensure_open()?;
        self.allocated = Some(sequence.clone());
        Ok(())
    }
}

/// Simulated triggered camera.
#[derive(Debug, Default)]
pub struct MockCamera {
    open: bool,
    fail_after: Option<usize>,
    applied: Option<CameraConfig>,
}

impl MockCamera {
    /// Closed camera with nothing applied.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call fail with an injected error.
    pub fn inject_next_failure(&mut self) {
        self.inject_failure_after(0);
    }

    /// Let `calls` more calls succeed, then fail the one after them.
    pub fn inject_failure_after(&mut self, calls: usize) {
        self.fail_after = Some(calls);
    }

    /// Whether the camera is open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Settings applied by the last successful `apply`.
    pub fn applied(&self) -> Option<&CameraConfig> {
        self.applied.as_ref()
    }

    fn check_failure(&mut self, operation: &str) -> Result<()> {
        match self.fail_after {
            Some(0) => {
                self.fail_after = None;
                bail!("MockCamera: injected failure on {operation}");
            }
            Some(remaining) => self.fail_after = Some(remaining - 1),
            None => {}
        }
        Ok(())
    }
}

#[async_trait]
impl TriggeredCamera for MockCamera {
    async fn open(&mut self) -> Result<()> {
        self.check_failure("open")?;
        self.open = true;
        Ok(())
    }

    async fn apply(&mut self, config: &CameraConfig) -> Result<()> {
        self.check_failure("apply")?;
        if !self.open {
            bail!("MockCamera: cannot apply settings, device not open");
        }
        self.applied = Some(config.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.check_failure("close")?;
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_requires_open() {
        let mut session = MockSession::new("slm");
        let err = session
            .push_mask(&MaskBuffer::zeros((2, 2)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not open"));
        assert!(session.displayed().is_none());
    }

    #[tokio::test]
    async fn test_failure_injection_is_one_shot() {
        let mut session = MockSession::new("dmd");
        session.inject_next_failure();
        assert!(session.open(0).await.is_err());
        assert!(!session.is_open());
        session.open(0).await.unwrap();
        assert!(session.is_open());
        assert_eq!(
            session.calls(),
            &[
                SessionCall::Open { monitor_index: 0 },
                SessionCall::Open { monitor_index: 0 }
            ]
        );
    }

    #[tokio::test]
    async fn test_delayed_failure_injection() {
        let mut session = MockSession::new("slm");
        session.inject_failure_after(1);
        session.open(0).await.unwrap();
        assert!(session.push_mask(&MaskBuffer::zeros((2, 2))).await.is_err());
        session.push_mask(&MaskBuffer::zeros((2, 2))).await.unwrap();
        assert_eq!(session.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_camera_apply_needs_open() {
        let mut camera = MockCamera::new();
        assert!(camera.apply(&CameraConfig::default()).await.is_err());
        camera.open().await.unwrap();
        camera.apply(&CameraConfig::default()).await.unwrap();
        assert_eq!(camera.applied(), Some(&CameraConfig::default()));
        camera.close().await.unwrap();
        assert!(!camera.is_open());
    }
}
