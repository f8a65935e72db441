//! Error types.
//!
//! Three layers:
//! - [`PcmError`]: result codes of a single device call
//! - [`FormatError`]: the wave header could not be accepted
//! - [`PlayerError`]: why a playback call returned early

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::pcm::PcmState;

/// Failure of one device call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PcmError {
    /// The device cannot take the call right now; the same call may succeed later.
    #[error("device not ready, try again")]
    Again,
    /// The device ran out of queued frames and stopped.
    #[error("buffer under-run")]
    Xrun,
    /// The device was suspended (power management or the device went away).
    #[error("device suspended")]
    Suspended,
    #[error("call not allowed in state {0:?}")]
    BadState(PcmState),
    #[error("invalid argument: {0}")]
    Invalid(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("no such device: {0}")]
    NoDevice(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// The byte source does not start with an acceptable wave header.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("header truncated: got {len} bytes, need 44")]
    Truncated { len: usize },
    #[error("bad {field} tag: {found:?}")]
    BadTag { field: &'static str, found: String },
    #[error("reading header: {0}")]
    Io(#[from] io::Error),
}

/// Why a playback call gave up before streaming.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("wave format error: {0}")]
    Format(#[from] FormatError),
    #[error("playback open error on {device:?}: {source}")]
    DeviceOpen {
        device: String,
        #[source]
        source: PcmError,
    },
    #[error("{step} failed: {source}")]
    DeviceConfig {
        step: &'static str,
        #[source]
        source: PcmError,
    },
}

impl PlayerError {
    /// `map_err` adapter tagging a device error with the negotiation step that produced it.
    pub(crate) fn config(step: &'static str) -> impl FnOnce(PcmError) -> PlayerError {
        move |source| PlayerError::DeviceConfig { step, source }
    }
}
