//! CPAL output stream and its real-time callback.
//!
//! The callback:
//! - refills a small local buffer from the shared queue without blocking
//! - applies basic channel mapping (mono↔stereo, best-effort otherwise)
//! - converts `f32` samples to the device sample format
//! - raises the under-run flag when the queue runs dry before the producer closed it

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cpal::traits::DeviceTrait;

use super::queue::{PopStrategy, SharedAudio};
use crate::error::PcmError;

/// Flags shared between the stream callbacks and the device handle.
#[derive(Debug, Default)]
pub(crate) struct StreamStatus {
    /// The callback ran out of queued audio while playing.
    pub xrun: AtomicBool,
    /// cpal reported the device gone.
    pub suspended: AtomicBool,
    pub played_frames: AtomicU64,
}

/// Build a CPAL output stream that plays interleaved `f32` audio from `queue`.
///
/// `queue` must already be at the device sample rate. Call `play()` on the result to start it.
pub(crate) fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SharedAudio>,
    status: &Arc<StreamStatus>,
    refill_max_frames: usize,
) -> Result<cpal::Stream, PcmError> {
    let refill = refill_max_frames;
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, status, refill),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, status, refill),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, status, refill),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, status, refill),
        other => Err(PcmError::Unsupported(format!("device sample format {other:?}"))),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SharedAudio>,
    status: &Arc<StreamStatus>,
    refill_max_frames: usize,
) -> Result<cpal::Stream, PcmError>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = usize::from(config.channels).max(1);
    let refill_max_frames = refill_max_frames.max(1);

    let mut state = PlaybackState {
        pos: 0,
        src_channels: queue.channels(),
        src: Vec::new(),
    };
    let queue_cb = queue.clone();
    let status_cb = status.clone();
    let status_err = status.clone();

    let err_fn = move |err| match err {
        cpal::StreamError::DeviceNotAvailable => {
            tracing::warn!("output device went away");
            status_err.suspended.store(true, Ordering::Release);
        }
        other => tracing::warn!("stream error: {other}"),
    };

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _| {
                let frames = data.len() / channels_out;
                let mut filled_frames = 0usize;

                for frame in 0..frames {
                    if state.pos >= state.src.len() {
                        state.pos = 0;
                        state.src.clear();
                        match queue_cb.pop(PopStrategy::NonBlocking {
                            max_frames: refill_max_frames,
                        }) {
                            Some(v) => state.src = v,
                            None => {
                                // A closed queue running dry is the end of a drain.
                                if !queue_cb.is_done() {
                                    status_cb.xrun.store(true, Ordering::Release);
                                }
                                data[frame * channels_out..]
                                    .fill(<T as cpal::Sample>::from_sample::<f32>(0.0));
                                break;
                            }
                        }
                    }
                    for ch in 0..channels_out {
                        let sample = next_sample_mapped(&mut state, channels_out, ch);
                        data[frame * channels_out + ch] =
                            <T as cpal::Sample>::from_sample::<f32>(sample);
                    }
                    filled_frames += 1;
                }

                if filled_frames > 0 {
                    status_cb
                        .played_frames
                        .fetch_add(filled_frames as u64, Ordering::Relaxed);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| PcmError::Backend(format!("building output stream: {e}")))
}

/// Local buffer of interleaved samples fetched from the queue, so the callback locks the queue
/// once per refill rather than once per sample.
struct PlaybackState {
    pos: usize,
    src_channels: usize,
    src: Vec<f32>,
}

/// Read one output sample for `dst_ch`, applying a simple channel mapping.
///
/// - mono → stereo: duplicate channel 0
/// - stereo → mono: average L/R
/// - other layouts: clamp to the available source channels, silence beyond
///
/// `st.pos` advances once per destination frame (after the last channel).
fn next_sample_mapped(st: &mut PlaybackState, dst_channels: usize, dst_ch: usize) -> f32 {
    if st.pos >= st.src.len() {
        return 0.0;
    }

    let frame_start = st.pos;
    let get_src = |ch: usize, st: &PlaybackState| -> f32 {
        if ch < st.src_channels && frame_start + ch < st.src.len() {
            st.src[frame_start + ch]
        } else {
            0.0
        }
    };

    let out = match (st.src_channels, dst_channels) {
        (2, 1) => 0.5 * (get_src(0, st) + get_src(1, st)),
        (1, _) => get_src(0, st),
        _ => get_src(dst_ch, st),
    };

    if dst_ch + 1 == dst_channels {
        st.pos += st.src_channels;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(src_channels: usize, src: Vec<f32>, dst_channels: usize) -> Vec<f32> {
        let mut st = PlaybackState {
            pos: 0,
            src_channels,
            src,
        };
        let mut out = Vec::new();
        while st.pos < st.src.len() {
            for ch in 0..dst_channels {
                out.push(next_sample_mapped(&mut st, dst_channels, ch));
            }
        }
        out
    }

    #[test]
    fn mono_is_duplicated_to_stereo() {
        assert_eq!(render(1, vec![0.1, 0.2], 2), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        assert_eq!(render(2, vec![0.25, 0.75, -1.0, 1.0], 1), vec![0.5, 0.0]);
    }

    #[test]
    fn stereo_passes_through() {
        assert_eq!(render(2, vec![0.1, 0.2, 0.3, 0.4], 2), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn extra_output_channels_are_silent() {
        assert_eq!(render(2, vec![0.1, 0.2], 4), vec![0.1, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn surplus_source_channels_are_dropped() {
        assert_eq!(render(4, vec![0.1, 0.2, 0.3, 0.4], 2), vec![0.1, 0.2]);
    }
}
