//! Fault recovery for failed device writes.
//!
//! - under-run: `prepare` the device and carry on
//! - suspend: `resume` until the device stops answering "try again", then `prepare`
//! - anything else: not recoverable here, handed back unchanged

use std::fmt;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::cancel::CancelToken;
use crate::error::PcmError;
use crate::pcm::PcmDevice;

/// Where the write path stands with respect to device faults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultState {
    Normal,
    UnderRun,
    Suspended,
}

impl FaultState {
    /// Fault state a write error puts the device in, if it is one we know how to leave.
    pub fn from_error(err: &PcmError) -> Option<Self> {
        match err {
            PcmError::Xrun => Some(Self::UnderRun),
            PcmError::Suspended => Some(Self::Suspended),
            _ => None,
        }
    }
}

impl fmt::Display for FaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::UnderRun => "underrun",
            Self::Suspended => "suspend",
        })
    }
}

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("can't recover from {fault}, prepare failed: {source}")]
    PrepareFailed {
        fault: FaultState,
        #[source]
        source: PcmError,
    },
    #[error("stop requested while waiting for the device to resume")]
    Cancelled,
    #[error(transparent)]
    Unrecoverable(PcmError),
}

/// Bring `device` back to a writable state after `err`.
///
/// Returns the fault that was recovered from; the device is back in [`FaultState::Normal`].
pub fn recover<D: PcmDevice + ?Sized>(
    device: &mut D,
    err: PcmError,
    resume_retry_interval: Duration,
    cancel: &CancelToken,
) -> Result<FaultState, RecoveryError> {
    let fault = FaultState::from_error(&err).ok_or(RecoveryError::Unrecoverable(err))?;

    if fault == FaultState::Suspended {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match device.resume() {
                Err(PcmError::Again) => {
                    if cancel.is_requested() {
                        return Err(RecoveryError::Cancelled);
                    }
                    thread::sleep(resume_retry_interval);
                }
                Ok(()) => break,
                Err(e) => {
                    tracing::debug!("resume failed after {attempts} attempts: {e}");
                    break;
                }
            }
        }
    }

    device
        .prepare()
        .map_err(|source| RecoveryError::PrepareFailed { fault, source })?;
    tracing::debug!(%fault, "device recovered");
    Ok(fault)
}
