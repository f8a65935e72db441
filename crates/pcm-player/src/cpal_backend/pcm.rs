//! Blocking PCM device on top of a CPAL output stream.
//!
//! `writei` decodes frames to `f32` and pushes them into a bounded queue sized to the
//! negotiated ring buffer. The cpal stream is built and started once the start threshold is
//! queued, and its callback drains the queue. The callback's under-run flag and cpal's
//! device-gone error surface on the next `writei` as [`PcmError::Xrun`] and
//! [`PcmError::Suspended`].

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};

use super::device::{constraints_from_ranges, output_ranges, pick_buffer_size, pick_output_config};
use super::playback::{StreamStatus, build_output_stream};
use super::queue::{SharedAudio, wait_until_done_and_empty_or_abort};
use super::resample::start_resampler;
use crate::config::CpalConfig;
use crate::error::PcmError;
use crate::pcm::{Access, HwConfig, HwConstraints, HwParams, PcmDevice, PcmState, SwParams};

/// Output side chosen at `hw_params_commit`.
struct Output {
    hw: HwConfig,
    stream_config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
}

/// Queues, resampler and stream of one prepared run. Rebuilt by every `prepare`.
struct Path {
    /// What `writei` pushes into.
    writeq: Arc<SharedAudio>,
    /// What the output callback drains; the resampler's output when one runs.
    playq: Arc<SharedAudio>,
    stream: Option<cpal::Stream>,
    queued_frames: u64,
}

impl Path {
    fn close(&self) {
        self.writeq.close();
        self.playq.close();
    }
}

impl Drop for Path {
    fn drop(&mut self) {
        self.close();
    }
}

/// An open cpal output device driven through the blocking [`PcmDevice`] API.
pub struct CpalPcm {
    name: String,
    device: cpal::Device,
    config: CpalConfig,
    ranges: Vec<cpal::SupportedStreamConfigRange>,
    constraints: HwConstraints,
    state: PcmState,
    output: Option<Output>,
    sw: Option<SwParams>,
    path: Option<Path>,
    status: Arc<StreamStatus>,
    scratch: Vec<f32>,
}

impl CpalPcm {
    pub(crate) fn new(
        name: &str,
        device: cpal::Device,
        config: CpalConfig,
    ) -> Result<Self, PcmError> {
        let ranges = output_ranges(&device)?;
        let constraints = constraints_from_ranges(&ranges, &config);
        tracing::debug!(
            device = %name,
            rate_min = constraints.rate.0,
            rate_max = constraints.rate.1,
            max_channels = constraints.channels.1,
            buffer_max = constraints.buffer_frames.1,
            "output device capabilities"
        );
        Ok(Self {
            name: name.to_string(),
            device,
            config,
            ranges,
            constraints,
            state: PcmState::Open,
            output: None,
            sw: None,
            path: None,
            status: Arc::new(StreamStatus::default()),
            scratch: Vec::new(),
        })
    }

    /// Frames the output callback has played since the device was configured.
    pub fn played_frames(&self) -> u64 {
        self.status.played_frames.load(Ordering::Relaxed)
    }

    fn output(&self) -> Result<&Output, PcmError> {
        self.output.as_ref().ok_or(PcmError::BadState(self.state))
    }

    /// Fresh queues (and resampler) for a new run. Any previous stream is dropped first.
    fn build_path(&mut self) -> Result<(), PcmError> {
        self.path = None;
        self.status.xrun.store(false, Ordering::Release);

        let out = self.output()?;
        let channels = usize::from(out.hw.channels);
        let buffer_frames = out.hw.buffer_frames as usize;
        let writeq = Arc::new(SharedAudio::new(channels, buffer_frames));
        let dst_rate = out.stream_config.sample_rate;
        let playq = if dst_rate == out.hw.rate {
            writeq.clone()
        } else {
            let dst_frames = buffer_frames * dst_rate as usize / out.hw.rate as usize;
            start_resampler(
                writeq.clone(),
                out.hw.rate,
                dst_rate,
                self.config.resample_chunk_frames,
                dst_frames.max(self.config.resample_chunk_frames),
            )?
        };

        self.path = Some(Path {
            writeq,
            playq,
            stream: None,
            queued_frames: 0,
        });
        Ok(())
    }

    /// Build and start the cpal stream if it is not running yet.
    fn start(&mut self) -> Result<(), PcmError> {
        let Some(out) = self.output.as_ref() else {
            return Err(PcmError::BadState(self.state));
        };
        let Some(path) = self.path.as_mut() else {
            return Err(PcmError::BadState(self.state));
        };
        if path.stream.is_some() {
            return Ok(());
        }

        let stream = build_output_stream(
            &self.device,
            &out.stream_config,
            out.sample_format,
            &path.playq,
            &self.status,
            out.hw.period_frames as usize,
        )?;
        stream
            .play()
            .map_err(|e| PcmError::Backend(format!("starting output stream: {e}")))?;
        path.stream = Some(stream);
        self.state = PcmState::Running;
        tracing::debug!(device = %self.name, queued = path.queued_frames, "output stream started");
        Ok(())
    }

    /// Report a fault raised by the stream callbacks, moving into the matching state.
    fn check_faults(&mut self) -> Result<(), PcmError> {
        if self.status.suspended.load(Ordering::Acquire) {
            self.state = PcmState::Suspended;
        } else if self.state == PcmState::Running && self.status.xrun.load(Ordering::Acquire) {
            self.state = PcmState::Xrun;
        }
        match self.state {
            PcmState::Prepared | PcmState::Running => Ok(()),
            PcmState::Xrun => Err(PcmError::Xrun),
            PcmState::Suspended => Err(PcmError::Suspended),
            other => Err(PcmError::BadState(other)),
        }
    }
}

impl PcmDevice for CpalPcm {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> PcmState {
        self.state
    }

    fn hw_params_any(&mut self) -> Result<HwParams, PcmError> {
        Ok(HwParams::any(self.constraints.clone()))
    }

    fn hw_params_commit(&mut self, params: &HwParams) -> Result<(), PcmError> {
        let hw = params.finish()?;
        if hw.access != Access::RwInterleaved {
            return Err(PcmError::Unsupported(format!("access {:?}", hw.access)));
        }

        let supported = pick_output_config(&self.ranges, hw.rate)
            .ok_or_else(|| PcmError::Unsupported("no supported output configs".to_string()))?;
        if supported.sample_rate() != hw.rate && !hw.resample {
            return Err(PcmError::Unsupported(format!(
                "{} Hz without resampling",
                hw.rate
            )));
        }

        let mut stream_config: cpal::StreamConfig = supported.config();
        if let Some(buf) = pick_buffer_size(&supported, hw.period_frames) {
            stream_config.buffer_size = buf;
        }
        tracing::info!(
            device = %self.name,
            format = ?hw.format,
            channels = hw.channels,
            rate_hz = hw.rate,
            output_rate_hz = stream_config.sample_rate,
            output_channels = stream_config.channels,
            output_format = ?supported.sample_format(),
            buffer_frames = hw.buffer_frames,
            period_frames = hw.period_frames,
            "output configured"
        );

        self.path = None;
        self.output = Some(Output {
            hw,
            stream_config,
            sample_format: supported.sample_format(),
        });
        self.sw = Some(SwParams::new(hw.buffer_frames, hw.period_frames));
        self.status.played_frames.store(0, Ordering::Relaxed);
        self.state = PcmState::Setup;
        self.build_path()?;
        self.state = PcmState::Prepared;
        Ok(())
    }

    fn sw_params_current(&self) -> Result<SwParams, PcmError> {
        self.sw.ok_or(PcmError::BadState(self.state))
    }

    fn sw_params_commit(&mut self, params: &SwParams) -> Result<(), PcmError> {
        if self.output.is_none() {
            return Err(PcmError::BadState(self.state));
        }
        self.sw = Some(*params);
        Ok(())
    }

    fn writei(&mut self, buf: &[u8]) -> Result<usize, PcmError> {
        self.check_faults()?;
        let out = self.output()?;
        let frame_bytes = out.hw.frame_bytes();
        let format = out.hw.format;
        let channels = usize::from(out.hw.channels);
        let frames = buf.len() / frame_bytes;
        if frames == 0 {
            return Ok(0);
        }
        let start_threshold = u64::from(self.sw.map_or(1, |sw| sw.start_threshold()));

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        format.decode_into(&buf[..frames * frame_bytes], &mut scratch);

        let mut pushed = 0;
        let mut result = Ok(());
        if let Some(path) = self.path.as_mut() {
            if path.stream.is_none() {
                pushed = path.writeq.push_available(&scratch);
                path.queued_frames += (pushed / channels) as u64;
                if path.queued_frames >= start_threshold || pushed < scratch.len() {
                    result = self.start();
                }
            }
        }
        if result.is_ok() && pushed < scratch.len() {
            match self.path.as_ref() {
                Some(path) => {
                    pushed += path
                        .writeq
                        .push_interleaved_blocking(&scratch[pushed..], &self.status.suspended);
                }
                None => result = Err(PcmError::BadState(self.state)),
            }
        }
        self.scratch = scratch;

        match accepted_frames(pushed / channels, result)? {
            0 => self.check_faults().map(|()| 0),
            n => Ok(n),
        }
    }

    fn prepare(&mut self) -> Result<(), PcmError> {
        if self.output.is_none() {
            return Err(PcmError::BadState(self.state));
        }
        if self.status.suspended.load(Ordering::Acquire) {
            return Err(PcmError::Suspended);
        }
        self.build_path()?;
        self.state = PcmState::Prepared;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), PcmError> {
        if !self.status.suspended.load(Ordering::Acquire) {
            return Err(PcmError::BadState(self.state));
        }
        // The device answering a config query again is the only sign it is back.
        if self.device.default_output_config().is_err() {
            return Err(PcmError::Again);
        }
        self.path = None;
        self.status.suspended.store(false, Ordering::Release);
        self.state = PcmState::Setup;
        tracing::info!(device = %self.name, "output device back");
        Ok(())
    }

    fn drain(&mut self) -> Result<(), PcmError> {
        let Some(path) = self.path.as_ref() else {
            self.state = PcmState::Setup;
            return Ok(());
        };
        if path.stream.is_none() && path.queued_frames > 0 {
            self.start()?;
        }

        let latency = match (&self.path, &self.output) {
            (Some(path), Some(out)) if path.stream.is_some() => {
                self.state = PcmState::Draining;
                path.writeq.close();
                if !wait_until_done_and_empty_or_abort(&path.playq, &self.status.suspended) {
                    tracing::warn!(device = %self.name, "device went away while draining");
                }
                // The last callback's buffer is still in the device.
                let rate = f64::from(out.stream_config.sample_rate.max(1));
                Duration::from_secs_f64(f64::from(out.hw.period_frames) / rate)
            }
            _ => Duration::ZERO,
        };
        thread::sleep(latency);

        self.path = None;
        self.state = PcmState::Setup;
        tracing::debug!(device = %self.name, played = self.played_frames(), "drained");
        Ok(())
    }
}

/// Frames already queued will play, so they count as written even when starting the stream
/// failed. The error comes back from the next write.
fn accepted_frames(queued: usize, result: Result<(), PcmError>) -> Result<usize, PcmError> {
    match result {
        Err(e) if queued == 0 => Err(e),
        Err(e) => {
            tracing::debug!(queued, "keeping queued frames after write error: {e}");
            Ok(queued)
        }
        Ok(()) => Ok(queued),
    }
}
