//! Spatial light modulator control.
//!
//! `SlmController` owns the validated [`DeviceState`] and a session. Masks
//! are validated against the state before anything is sent, and what reaches
//! the session is always the state's oriented readout.

use crate::device::{DeviceState, MaskBuffer};
use crate::session::DeviceSession;
use anyhow::Result;
use tracing::{info, warn};

/// Keeps an SLM's displayed mask in sync with its validated state.
pub struct SlmController<S: DeviceSession> {
    state: DeviceState,
    session: S,
    open: bool,
}

impl<S: DeviceSession> SlmController<S> {
    /// Controller for `state`; the session is not opened yet.
    pub fn new(state: DeviceState, session: S) -> Self {
        Self {
            state,
            session,
            open: false,
        }
    }

    /// The validated device state.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Mutable access for reference / inversion changes. Call
    /// [`refresh`](Self::refresh) afterwards to show the new readout.
    pub fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    /// The underlying session.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Mutable access to the underlying session.
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Whether the controller holds an open session.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open the session and show the current mask.
    ///
    /// If the first push fails the session is closed again and the push error
    /// is returned; a close failure on that path is only logged.
    pub async fn open(&mut self) -> Result<()> {
        self.session.open(self.state.monitor_index()).await?;
        if let Err(err) = self.session.push_mask(&self.state.oriented_mask()).await {
            if let Err(close_err) = self.session.close().await {
                warn!(session = self.session.name(), %close_err, "Close failed after initial push error");
            }
            return Err(err);
        }
        self.open = true;
        info!(
            session = self.session.name(),
            model = self.state.model(),
            "SLM is active with the state mask"
        );
        Ok(())
    }

    /// Validate and store `mask`, then display it if the session is open.
    ///
    /// A rejected mask is never sent; the error is the [`MaskError`]
    /// (downcastable) and the state keeps its previous mask.
    ///
    /// [`MaskError`]: crate::error::MaskError
    pub async fn update_mask(&mut self, mask: impl Into<MaskBuffer>) -> Result<()> {
        self.state.update_mask(mask)?;
        self.refresh().await
    }

    /// Re-send the current oriented mask. No-op while closed.
    pub async fn refresh(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.session.push_mask(&self.state.oriented_mask()).await
    }

    /// Close the session. The controller can be reopened later.
    ///
    /// The controller stays open if the session fails to close, so the close
    /// can be retried.
    pub async fn close(&mut self) -> Result<()> {
        if !self.open {
            warn!(session = self.session.name(), "Close requested on a session that is not open");
            return Ok(());
        }
        self.session.close().await?;
        self.open = false;
        info!(session = self.session.name(), "SLM is closed");
        Ok(())
    }

    /// Give back the state and session.
    pub fn into_parts(self) -> (DeviceState, S) {
        (self.state, self.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MaskError;
    use crate::session::mock::{MockSession, SessionCall};
    use ndarray::Array2;

    fn controller() -> SlmController<MockSession> {
        let state = DeviceState::builder("LCR2500").monitor_index(2).build().unwrap();
        SlmController::new(state, MockSession::new("slm"))
    }

    #[tokio::test]
    async fn test_open_shows_state_mask() {
        let mut slm = controller();
        slm.open().await.unwrap();
        assert_eq!(
            slm.session().calls(),
            &[
                SessionCall::Open { monitor_index: 2 },
                SessionCall::PushMask { shape: (1024, 768) }
            ]
        );
        assert_eq!(slm.session().displayed(), Some(&MaskBuffer::zeros((1024, 768))));
    }

    #[tokio::test]
    async fn test_invalid_mask_never_reaches_session() {
        let mut slm = controller();
        slm.open().await.unwrap();
        let err = slm
            .update_mask(Array2::<f64>::zeros((10, 10)))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<MaskError>().is_some_and(MaskError::is_invalid_mask));
        assert_eq!(slm.session().calls().len(), 2);
    }

    #[tokio::test]
    async fn test_update_while_closed_is_staged() {
        let mut slm = controller();
        slm.update_mask(Array2::<f32>::ones((1024, 768))).await.unwrap();
        assert!(slm.session().calls().is_empty());

        slm.open().await.unwrap();
        assert_eq!(
            slm.session().displayed(),
            Some(&MaskBuffer::from(Array2::<f32>::ones((1024, 768))))
        );
    }

    #[tokio::test]
    async fn test_refresh_sends_oriented_mask() {
        let mut slm = controller();
        let mut mask = Array2::<i64>::zeros((1024, 768));
        mask[[0, 0]] = 1;
        slm.update_mask(mask).await.unwrap();
        slm.open().await.unwrap();

        slm.state_mut().update_inversion((1, -1)).unwrap();
        slm.refresh().await.unwrap();
        let shown = slm.session().displayed().unwrap().to_f64();
        assert_eq!(shown[[0, 767]], 1.0);
    }

    #[tokio::test]
    async fn test_close_twice_is_harmless() {
        let mut slm = controller();
        slm.open().await.unwrap();
        slm.close().await.unwrap();
        slm.close().await.unwrap();
        assert_eq!(slm.session().calls().last(), Some(&SessionCall::Close));
        assert!(!slm.session().is_open());
    }

    #[tokio::test]
    async fn test_failed_first_push_closes_session() {
        let mut slm = controller();
        slm.session_mut().inject_failure_after(1);
        let err = slm.open().await.unwrap_err();
        assert!(err.to_string().contains("injected failure"));
        assert!(!slm.is_open());
        assert!(!slm.session().is_open());
        assert_eq!(
            slm.session().calls(),
            &[
                SessionCall::Open { monitor_index: 2 },
                SessionCall::PushMask { shape: (1024, 768) },
                SessionCall::Close
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_close_can_be_retried() {
        let mut slm = controller();
        slm.open().await.unwrap();
        slm.session_mut().inject_next_failure();
        assert!(slm.close().await.is_err());
        assert!(slm.is_open());
        assert!(slm.session().is_open());

        slm.close().await.unwrap();
        assert!(!slm.is_open());
        assert!(!slm.session().is_open());
    }
}
