use std::time::Duration;

/// Device name used when the caller never picked one.
pub const DEFAULT_DEVICE: &str = "default";

/// Playback tuning parameters shared by the session, streaming loop and recovery.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Output device identifier. `"default"` selects the host default output.
    pub device: String,
    /// Pause between a failed device write and the retry.
    pub write_retry_pause: Duration,
    /// Pause between `resume` attempts while the device reports it is still suspended.
    pub resume_retry_interval: Duration,
    /// Recovered faults tolerated on one period before it is skipped.
    pub max_recoveries_per_period: u32,
    /// How long [`StopHandle::request_stop`](crate::StopHandle::request_stop) waits for the
    /// streaming loop to acknowledge. `None` waits until it does.
    pub stop_timeout: Option<Duration>,
    /// Stop reading at the end of the `data` chunk instead of at end of file.
    pub clamp_to_data_chunk: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            write_retry_pause: Duration::from_millis(1),
            resume_retry_interval: Duration::from_millis(100),
            max_recoveries_per_period: 3,
            stop_timeout: Some(Duration::from_millis(50)),
            clamp_to_data_chunk: true,
        }
    }
}

/// Knobs for the CPAL-backed device.
#[derive(Clone, Debug)]
pub struct CpalConfig {
    /// Upper bound on the negotiated ring buffer, in frames.
    pub max_buffer_frames: u32,
    /// Resampler input chunk size in frames (only used when the device lacks the file rate).
    pub resample_chunk_frames: usize,
}

impl Default for CpalConfig {
    /// Defaults tuned for low-risk playback across common devices.
    fn default() -> Self {
        Self {
            max_buffer_frames: 16_384,
            resample_chunk_frames: 1024,
        }
    }
}
