//! Output device discovery and configuration choice.
//!
//! Thin wrappers around CPAL for:
//! - listing output devices
//! - opening either the default device or a device by substring match
//! - turning the device's supported configurations into [`HwConstraints`]
//! - picking the stream configuration for a negotiated rate

use cpal::traits::{DeviceTrait, HostTrait};

use crate::config::{CpalConfig, DEFAULT_DEVICE};
use crate::error::PcmError;
use crate::pcm::{Access, HwConstraints, SampleFormat};

/// Ring buffer range used when the device does not report one.
const UNKNOWN_BUFFER_MIN_FRAMES: u32 = 256;

/// Smallest period handed out, in frames.
const MIN_PERIOD_FRAMES: u32 = 16;

/// Open an output device by identifier.
///
/// `"default"` selects the host default output. Anything else picks the first output device
/// whose name contains it (case-insensitive).
pub fn pick_device(host: &cpal::Host, name: &str) -> Result<cpal::Device, PcmError> {
    if name.trim().eq_ignore_ascii_case(DEFAULT_DEVICE) {
        return host
            .default_output_device()
            .ok_or_else(|| PcmError::NoDevice("no default output device".to_string()));
    }

    let mut devices = host
        .output_devices()
        .map_err(|e| PcmError::Backend(format!("enumerating output devices: {e}")))?;
    devices
        .find(|d| {
            d.description()
                .ok()
                .map(|n| matches_device_name(&n.name(), name))
                .unwrap_or(false)
        })
        .ok_or_else(|| PcmError::NoDevice(name.to_string()))
}

/// Names of all output devices on `host`, in host order.
pub fn list_output_devices(host: &cpal::Host) -> Result<Vec<String>, PcmError> {
    let devices = host
        .output_devices()
        .map_err(|e| PcmError::Backend(format!("enumerating output devices: {e}")))?;
    let mut out = Vec::new();
    for d in devices {
        match d.description() {
            Ok(desc) => out.push(desc.to_string()),
            Err(e) => tracing::debug!("skipping output device without a name: {e}"),
        }
    }
    Ok(out)
}

/// Supported stream configurations of `device`.
pub(crate) fn output_ranges(
    device: &cpal::Device,
) -> Result<Vec<cpal::SupportedStreamConfigRange>, PcmError> {
    let ranges: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| PcmError::Backend(format!("querying output configs: {e}")))?
        .collect();
    if ranges.is_empty() {
        return Err(PcmError::Unsupported("no supported output configs".to_string()));
    }
    Ok(ranges)
}

/// What the device accepts through this backend.
///
/// Samples are decoded to `f32` before they reach cpal, so every wave sample format is
/// accepted whatever the device's native format. Rates outside the native range are converted
/// in software when resampling is enabled.
pub(crate) fn constraints_from_ranges(
    ranges: &[cpal::SupportedStreamConfigRange],
    config: &CpalConfig,
) -> HwConstraints {
    let mut rate = (u32::MAX, 0u32);
    let mut max_channels = 1u16;
    let mut buffer = (u32::MAX, 0u32);
    for r in ranges {
        rate.0 = rate.0.min(r.min_sample_rate());
        rate.1 = rate.1.max(r.max_sample_rate());
        max_channels = max_channels.max(r.channels());
        let (lo, hi) = buffer_frame_range(r.buffer_size(), config.max_buffer_frames);
        buffer.0 = buffer.0.min(lo);
        buffer.1 = buffer.1.max(hi);
    }

    HwConstraints {
        formats: vec![SampleFormat::U8, SampleFormat::S16Le, SampleFormat::S24Le],
        access: vec![Access::RwInterleaved],
        channels: (1, max_channels),
        rate,
        can_resample: true,
        buffer_frames: buffer,
        period_frames: (MIN_PERIOD_FRAMES.min(buffer.1), buffer.1),
        min_periods: 2,
    }
}

/// Ring buffer range in frames, capped at `cap`.
pub(crate) fn buffer_frame_range(size: &cpal::SupportedBufferSize, cap: u32) -> (u32, u32) {
    let cap = cap.max(1);
    match size {
        cpal::SupportedBufferSize::Range { min, max } => {
            let lo = (*min).clamp(1, cap);
            (lo, (*max).min(cap).max(lo))
        }
        cpal::SupportedBufferSize::Unknown => (UNKNOWN_BUFFER_MIN_FRAMES.min(cap), cap),
    }
}

/// Choose the output configuration for `rate`.
///
/// A range that contains `rate` exactly wins; otherwise the nearest supported rate. Ties go to
/// the better device sample format.
pub(crate) fn pick_output_config(
    ranges: &[cpal::SupportedStreamConfigRange],
    rate: u32,
) -> Option<cpal::SupportedStreamConfig> {
    let mut best: Option<(u32, u8, &cpal::SupportedStreamConfigRange, u32)> = None;
    for range in ranges {
        let candidate = rate_for_range(range.min_sample_rate(), range.max_sample_rate(), rate);
        let distance = candidate.abs_diff(rate);
        let rank = sample_format_rank(range.sample_format());
        let replace = match &best {
            None => true,
            Some((b_distance, b_rank, _, _)) => {
                is_better_candidate(distance, rank, *b_distance, *b_rank)
            }
        };
        if replace {
            best = Some((distance, rank, range, candidate));
        }
    }
    best.map(|(_, _, range, candidate)| range.clone().with_sample_rate(candidate))
}

/// Ask cpal for callbacks of about one period when the device allows a fixed size.
///
/// Returns `None` when the device only supports its default buffer size.
pub(crate) fn pick_buffer_size(
    config: &cpal::SupportedStreamConfig,
    period_frames: u32,
) -> Option<cpal::BufferSize> {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            Some(cpal::BufferSize::Fixed(period_frames.clamp(*min, (*max).max(*min))))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

fn rate_for_range(min: u32, max: u32, target: u32) -> u32 {
    target.clamp(min, max.max(min))
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

fn is_better_candidate(distance: u32, rank: u8, best_distance: u32, best_rank: u8) -> bool {
    if distance != best_distance {
        distance < best_distance
    } else {
        rank < best_rank
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}
