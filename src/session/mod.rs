//! Hardware session boundary.
//!
//! A [`DeviceSession`] is the thin adapter between validated state and a
//! physical modulator. Sessions never mutate device state; they only receive
//! buffers and sequences that already passed validation. Hardware failures
//! are returned as `anyhow::Error` and are not retried here.
//!
//! - [`SlmController`] pairs a [`DeviceState`](crate::device::DeviceState)
//!   with a session and keeps the displayed mask in sync with it.
//! - [`upload_sequence`] stages a projector sequence inside an open/close
//!   scope that is released on every exit path.
//! - [`mock`] holds in-memory sessions for tests and dry runs.

pub mod mock;
pub mod projector;
pub mod slm;

use crate::device::MaskBuffer;
use crate::sequence::MaskSequence;
use anyhow::Result;
use async_trait::async_trait;

pub use projector::upload_sequence;
pub use slm::SlmController;

/// Connection to one modulator.
///
/// Every call is awaited to completion before the next one is issued.
#[async_trait]
pub trait DeviceSession: Send {
    /// Human-readable adapter name, used in logs.
    fn name(&self) -> &str;

    /// Open the connection on the given monitor / output index.
    async fn open(&mut self, monitor_index: u32) -> Result<()>;

    /// Close the connection and wait until the device has released it.
    async fn close(&mut self) -> Result<()>;

    /// Display a single mask, already in hardware readout order.
    async fn push_mask(&mut self, mask: &MaskBuffer) -> Result<()>;

    /// Allocate and upload a whole projector sequence with its timing.
    async fn push_sequence(&mut self, sequence: &MaskSequence) -> Result<()>;
}
