//! Scoped sequence upload for the micromirror projector.

use crate::device::DeviceState;
use crate::error::MaskError;
use crate::sequence::{MaskSequence, SequenceAllocator, SequenceTiming};
use crate::session::DeviceSession;
use anyhow::Result;
use ndarray::ArrayView3;
use tracing::{info, warn};

/// Open `session` on the projector's monitor, stage `masks` through
/// `allocator`, push the sequence and close the session again.
///
/// Frames must be `(rows, cols) == state.frame_shape()`; a mismatch is
/// rejected with [`MaskError::InvalidFrameShape`] before the session is opened.
///
/// The session is closed on every path, including when validation rejects the
/// batch after the session was opened. The first error encountered is
/// returned; a close failure after an earlier error is only logged.
pub async fn upload_sequence<S: DeviceSession>(
    session: &mut S,
    state: &DeviceState,
    allocator: &SequenceAllocator,
    masks: ArrayView3<'_, f64>,
    timing: SequenceTiming,
) -> Result<MaskSequence> {
    let (_, rows, cols) = masks.dim();
    let expected = state.frame_shape();
    if (rows, cols) != expected {
        warn!(
            model = state.model(),
            actual = ?(rows, cols),
            ?expected,
            "Rejected sequence: frame shape does not match projector resolution"
        );
        return Err(MaskError::InvalidFrameShape {
            actual: (rows, cols),
            expected,
        }
        .into());
    }

    session.open(state.monitor_index()).await?;

    let outcome = async {
        let sequence = allocator.allocate(masks, timing)?;
        session.push_sequence(&sequence).await?;
        Ok::<_, anyhow::Error>(sequence)
    }
    .await;

    let closed = session.close().await;
    match (outcome, closed) {
        (Ok(sequence), Ok(())) => {
            info!(
                session = session.name(),
                frames = sequence.frame_count(),
                "Sequence uploaded"
            );
            Ok(sequence)
        }
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), closed) => {
            if let Err(close_err) = closed {
                warn!(session = session.name(), %close_err, "Close failed after upload error");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::{MockSession, SessionCall};
    use ndarray::Array3;

    fn dmd_state() -> DeviceState {
        DeviceState::builder("DMD_DLP").bit_depth(1).build().unwrap()
    }

    #[tokio::test]
    async fn test_upload_success() {
        let mut dmd = MockSession::new("dmd");
        let masks = Array3::<f64>::ones((3, 768, 1024));
        let seq = upload_sequence(
            &mut dmd,
            &dmd_state(),
            &SequenceAllocator::default(),
            masks.view(),
            SequenceTiming::new(10_000, 9_000),
        )
        .await
        .unwrap();

        assert_eq!(seq.frame_count(), 3);
        assert_eq!(
            dmd.calls(),
            &[
                SessionCall::Open { monitor_index: 0 },
                SessionCall::PushSequence { frames: 3 },
                SessionCall::Close
            ]
        );
        assert_eq!(dmd.allocated(), Some(&seq));
    }

    #[tokio::test]
    async fn test_rejected_batch_still_closes() {
        let mut dmd = MockSession::new("dmd");
        let mut masks = Array3::<f64>::zeros((5, 768, 1024));
        masks[[2, 0, 0]] = 1.5;

        let err = upload_sequence(
            &mut dmd,
            &dmd_state(),
            &SequenceAllocator::default(),
            masks.view(),
            SequenceTiming::new(10_000, 9_000),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MaskError>(),
            Some(MaskError::InvalidMaskValues { frame: 2, .. })
        ));
        assert_eq!(
            dmd.calls(),
            &[SessionCall::Open { monitor_index: 0 }, SessionCall::Close]
        );
        assert!(dmd.allocated().is_none());
        assert!(!dmd.is_open());
    }

    #[tokio::test]
    async fn test_open_failure_propagates() {
        let mut dmd = MockSession::new("dmd");
        dmd.inject_next_failure();
        let masks = Array3::<f64>::zeros((1, 768, 1024));
        let err = upload_sequence(
            &mut dmd,
            &dmd_state(),
            &SequenceAllocator::default(),
            masks.view(),
            SequenceTiming::new(10, 10),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("injected failure"));
        assert_eq!(dmd.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_opens_on_configured_monitor() {
        let state = DeviceState::builder("DMD_DLP").monitor_index(3).build().unwrap();
        let mut dmd = MockSession::new("dmd");
        let masks = Array3::<f64>::zeros((2, 768, 1024));
        upload_sequence(
            &mut dmd,
            &state,
            &SequenceAllocator::default(),
            masks.view(),
            SequenceTiming::new(10_000, 9_000),
        )
        .await
        .unwrap();
        assert_eq!(dmd.calls().first(), Some(&SessionCall::Open { monitor_index: 3 }));
    }

    #[tokio::test]
    async fn test_frame_shape_mismatch_never_opens() {
        let state = DeviceState::builder("DMD_DLP").monitor_index(3).build().unwrap();
        let mut dmd = MockSession::new("dmd");
        let masks = Array3::<f64>::zeros((2, 4, 4));
        let err = upload_sequence(
            &mut dmd,
            &state,
            &SequenceAllocator::default(),
            masks.view(),
            SequenceTiming::new(10_000, 9_000),
        )
        .await
        .unwrap_err();

        assert_eq!(
            err.downcast_ref::<MaskError>(),
            Some(&MaskError::InvalidFrameShape {
                actual: (4, 4),
                expected: (768, 1024)
            })
        );
        assert!(dmd.calls().is_empty());
        assert!(dmd.allocated().is_none());
    }

    #[tokio::test]
    async fn test_transposed_frames_rejected() {
        let mut dmd = MockSession::new("dmd");
        let masks = Array3::<f64>::zeros((1, 1024, 768));
        let err = upload_sequence(
            &mut dmd,
            &dmd_state(),
            &SequenceAllocator::default(),
            masks.view(),
            SequenceTiming::new(10_000, 9_000),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MaskError>(),
            Some(MaskError::InvalidFrameShape { .. })
        ));
        assert!(dmd.calls().is_empty());
    }
}
