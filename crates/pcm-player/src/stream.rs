//! Streaming stage: file → device, one period at a time.
//!
//! The loop owns a single period-sized buffer. Each pass zero-fills it, reads from the file and
//! writes it to the device. The final short block therefore goes out padded with silence.
//! Transient write failures are retried; faults go through [`recovery`](crate::recovery), and a
//! period that cannot be delivered is skipped rather than ending playback.

use std::io::Read;
use std::thread;

use crate::cancel::CancelToken;
use crate::config::PlayerConfig;
use crate::error::PcmError;
use crate::io::read_up_to;
use crate::negotiate::NegotiatedSizes;
use crate::pcm::PcmDevice;
use crate::recovery::{self, RecoveryError};

/// Why the streaming loop stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackEndReason {
    /// The file (or data chunk) was fully read.
    #[default]
    Eof,
    /// Reading the file failed.
    Error,
    /// A stop was requested.
    Stopped,
}

/// Summary of one streaming run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamReport {
    pub end_reason: PlaybackEndReason,
    pub bytes_read: u64,
    /// Periods fully handed to the device.
    pub periods_written: u64,
    /// Periods skipped because the device could not take them.
    pub periods_dropped: u64,
    /// Under-runs and suspends the device was brought back from.
    pub faults_recovered: u64,
}

enum PeriodOutcome {
    Written,
    Dropped,
    Stopped,
}

/// Stream `reader` to `device` until end of input, a read error, or a stop request.
///
/// `frame_bytes` sizes the buffer at `period_frames * frame_bytes` bytes and must match the
/// device's frame size.
pub fn stream_pcm<R, D>(
    reader: &mut R,
    device: &mut D,
    sizes: NegotiatedSizes,
    frame_bytes: usize,
    cancel: &CancelToken,
    config: &PlayerConfig,
) -> StreamReport
where
    R: Read + ?Sized,
    D: PcmDevice + ?Sized,
{
    let mut report = StreamReport::default();
    let mut buf = vec![0u8; sizes.period_frames as usize * frame_bytes];

    report.end_reason = loop {
        if cancel.is_requested() {
            break PlaybackEndReason::Stopped;
        }

        buf.fill(0);
        let read = match read_up_to(reader, &mut buf) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("read error, ending playback: {e}");
                break PlaybackEndReason::Error;
            }
        };
        report.bytes_read += read as u64;

        if cancel.is_requested() {
            break PlaybackEndReason::Stopped;
        }
        if read == 0 {
            break PlaybackEndReason::Eof;
        }

        match write_period(device, &buf, frame_bytes, cancel, config, &mut report) {
            PeriodOutcome::Written => report.periods_written += 1,
            PeriodOutcome::Dropped => report.periods_dropped += 1,
            PeriodOutcome::Stopped => break PlaybackEndReason::Stopped,
        }
    };

    tracing::debug!(
        end = ?report.end_reason,
        bytes_read = report.bytes_read,
        written = report.periods_written,
        dropped = report.periods_dropped,
        recovered = report.faults_recovered,
        "stream finished"
    );
    report
}

/// Push one period to the device, retrying until it is taken, skipped, or a stop arrives.
fn write_period<D: PcmDevice + ?Sized>(
    device: &mut D,
    period: &[u8],
    frame_bytes: usize,
    cancel: &CancelToken,
    config: &PlayerConfig,
    report: &mut StreamReport,
) -> PeriodOutcome {
    let mut offset = 0;
    let mut recoveries = 0u32;
    while offset < period.len() {
        let err = match device.writei(&period[offset..]) {
            Ok(0) => PcmError::Again,
            Ok(frames) => {
                offset = (offset + frames * frame_bytes).min(period.len());
                continue;
            }
            Err(e) => e,
        };

        thread::sleep(config.write_retry_pause);
        if cancel.is_requested() {
            return PeriodOutcome::Stopped;
        }

        match err {
            PcmError::Again => continue,
            err => match recovery::recover(device, err, config.resume_retry_interval, cancel) {
                Ok(fault) => {
                    report.faults_recovered += 1;
                    recoveries += 1;
                    if recoveries > config.max_recoveries_per_period {
                        tracing::warn!(
                            %fault,
                            recoveries,
                            "device keeps faulting, skipping one period"
                        );
                        return PeriodOutcome::Dropped;
                    }
                    tracing::info!(%fault, "recovered, retrying period");
                }
                Err(RecoveryError::Cancelled) => return PeriodOutcome::Stopped,
                Err(e) => {
                    tracing::warn!("write failed, skipping one period: {e}");
                    return PeriodOutcome::Dropped;
                }
            },
        }
    }
    PeriodOutcome::Written
}
