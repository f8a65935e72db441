//! Device abstraction.
//!
//! The engine drives an output device through a small blocking API: negotiate a hardware
//! configuration, set software thresholds, then push interleaved frames with [`PcmDevice::writei`].
//! Transient conditions come back as [`PcmError`] codes (`Again`, `Xrun`, `Suspended`) that the
//! caller is expected to handle.

mod format;
mod hw_params;
mod sw_params;

pub use format::SampleFormat;
pub use hw_params::{Access, HwConfig, HwConstraints, HwParams};
pub use sw_params::SwParams;

use crate::error::PcmError;

/// Lifecycle state of an open device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PcmState {
    /// Opened, no hardware configuration yet.
    Open,
    /// Configured but not ready to accept frames.
    Setup,
    /// Ready; playback starts once the start threshold is reached.
    Prepared,
    Running,
    /// Stopped after running out of frames.
    Xrun,
    Suspended,
    Draining,
}

/// An open playback device.
pub trait PcmDevice {
    /// Identifier the device was opened with.
    fn name(&self) -> &str;

    fn state(&self) -> PcmState;

    /// Full configuration space the device supports.
    fn hw_params_any(&mut self) -> Result<HwParams, PcmError>;

    /// Install a hardware configuration. Leaves the device [`PcmState::Prepared`].
    fn hw_params_commit(&mut self, params: &HwParams) -> Result<(), PcmError>;

    /// Software parameters currently installed. Requires a committed hardware configuration.
    fn sw_params_current(&self) -> Result<SwParams, PcmError>;

    fn sw_params_commit(&mut self, params: &SwParams) -> Result<(), PcmError>;

    /// Write interleaved frames, blocking until the device took them.
    ///
    /// `buf` holds whole frames in the negotiated format. Returns the number of frames written,
    /// which may be fewer than `buf` holds.
    fn writei(&mut self, buf: &[u8]) -> Result<usize, PcmError>;

    /// Drop anything queued and get ready for a fresh start.
    fn prepare(&mut self) -> Result<(), PcmError>;

    /// Leave the suspended state. Returns [`PcmError::Again`] while the device is still away.
    fn resume(&mut self) -> Result<(), PcmError>;

    /// Block until every queued frame has been played, then stop.
    fn drain(&mut self) -> Result<(), PcmError>;
}

/// Opens devices by identifier.
pub trait PcmBackend {
    type Device: PcmDevice;

    fn open(&self, name: &str) -> Result<Self::Device, PcmError>;
}
