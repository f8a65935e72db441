//! Software rate conversion for devices that lack the file's rate.
//!
//! Uses Rubato to convert interleaved `f32` audio from the negotiated rate to the output device
//! rate. Runs in a background thread between the write queue and the queue the output callback
//! drains.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;

use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use super::queue::{PopStrategy, SharedAudio};
use crate::error::PcmError;

/// Start a background resampler thread.
///
/// Reads from `srcq` at `src_rate` and writes to a new queue of `dst_capacity_frames` frames at
/// `dst_rate`. The output queue is closed once `srcq` is closed and fully converted, or when
/// the thread hits an error.
pub(crate) fn start_resampler(
    srcq: Arc<SharedAudio>,
    src_rate: u32,
    dst_rate: u32,
    chunk_frames: usize,
    dst_capacity_frames: usize,
) -> Result<Arc<SharedAudio>, PcmError> {
    if src_rate == 0 || dst_rate == 0 {
        return Err(PcmError::Invalid(format!("resample {src_rate} Hz -> {dst_rate} Hz")));
    }
    let channels = srcq.channels();
    let dstq = Arc::new(SharedAudio::new(channels, dst_capacity_frames));

    let f_ratio = f64::from(dst_rate) / f64::from(src_rate);

    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };

    let chunk_in_frames = chunk_frames.max(1);
    // Room for one chunk at the highest ratio the resampler may reach.
    let out_frames = chunk_in_frames * (f_ratio.ceil() as usize + 2);

    let dstq_thread = dstq.clone();
    thread::Builder::new()
        .name("pcm-resample".to_string())
        .spawn(move || {
            let mut resampler = match Async::<f32>::new_sinc(
                f_ratio,
                1.1,
                &params,
                chunk_in_frames,
                channels,
                FixedAsync::Input,
            ) {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!("resampler init error: {e:#}");
                    dstq_thread.close();
                    return;
                }
            };

            // Only a closed output queue stops a blocked push here.
            let never = AtomicBool::new(false);
            let mut out_interleaved = vec![0.0f32; channels * out_frames];
            let mut indexing = Indexing {
                input_offset: 0,
                output_offset: 0,
                active_channels_mask: None,
                partial_len: None,
            };

            let mut tail = false;
            loop {
                let input = if tail {
                    srcq.pop(PopStrategy::BlockingUpTo {
                        max_frames: chunk_in_frames,
                    })
                } else {
                    match srcq.pop(PopStrategy::BlockingExact {
                        frames: chunk_in_frames,
                    }) {
                        Some(v) => Some(v),
                        None => {
                            tail = true;
                            continue;
                        }
                    }
                };
                let Some(input) = input else { break };

                let frames = input.len() / channels;
                if frames == 0 {
                    continue;
                }
                indexing.partial_len = if tail { Some(frames) } else { None };

                let input_adapter = match InterleavedSlice::new(&input, channels, frames) {
                    Ok(a) => a,
                    Err(e) => {
                        tracing::error!("interleaved slice (input) error: {e:#}");
                        break;
                    }
                };
                let out_capacity_frames = out_interleaved.len() / channels;
                let mut output_adapter = match InterleavedSlice::new_mut(
                    &mut out_interleaved,
                    channels,
                    out_capacity_frames,
                ) {
                    Ok(a) => a,
                    Err(e) => {
                        tracing::error!("interleaved slice (output) error: {e:#}");
                        break;
                    }
                };

                let (_nbr_in, nbr_out) = match resampler.process_into_buffer(
                    &input_adapter,
                    &mut output_adapter,
                    Some(&indexing),
                ) {
                    Ok(x) => x,
                    Err(e) => {
                        tracing::error!("resampler process error: {e:#}");
                        break;
                    }
                };

                let produced = nbr_out * channels;
                if produced > 0
                    && dstq_thread.push_interleaved_blocking(&out_interleaved[..produced], &never)
                        < produced
                {
                    break;
                }
            }

            dstq_thread.close();
        })
        .map_err(|e| PcmError::Backend(format!("spawning resampler: {e}")))?;

    tracing::info!(src_hz = src_rate, dst_hz = dst_rate, "software resampling enabled");
    Ok(dstq)
}
