//! Hardware parameter negotiation.
//!
//! Walks the device's configuration space in a fixed order and commits once at the end, so a
//! failing step never leaves a half-applied configuration on the device.

use crate::error::{PcmError, PlayerError};
use crate::header::WaveHeader;
use crate::pcm::{Access, PcmDevice, SampleFormat};

/// Ring buffer and period sizes the device accepted, in frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NegotiatedSizes {
    pub buffer_frames: u32,
    pub period_frames: u32,
}

/// Negotiate and commit a hardware configuration for `header` on `device`.
///
/// Order: resampling, interleaved access, sample format, channels, rate (nearest; a different
/// achieved rate is accepted), the longest buffer time, then the longest period time that fits
/// it. Each failure is reported with the step that failed.
pub fn configure_hw<D: PcmDevice + ?Sized>(
    device: &mut D,
    header: &WaveHeader,
) -> Result<NegotiatedSizes, PlayerError> {
    let mut params = device
        .hw_params_any()
        .map_err(PlayerError::config("no configurations available"))?;

    params
        .set_rate_resample(true)
        .map_err(PlayerError::config("resampling setup"))?;
    params
        .set_access(Access::RwInterleaved)
        .map_err(PlayerError::config("access type"))?;

    let format = SampleFormat::from_bits_per_sample(header.bits_per_sample).ok_or_else(|| {
        PlayerError::DeviceConfig {
            step: "sample format",
            source: PcmError::Unsupported(format!("{} bits per sample", header.bits_per_sample)),
        }
    })?;
    params
        .set_format(format)
        .map_err(PlayerError::config("sample format"))?;
    params
        .set_channels(header.channels)
        .map_err(PlayerError::config("channels count"))?;

    let rate = params
        .set_rate_near(header.sample_rate)
        .map_err(PlayerError::config("sample rate"))?;
    if rate != header.sample_rate {
        tracing::info!(
            requested_hz = header.sample_rate,
            achieved_hz = rate,
            "device rate differs from file rate"
        );
    }

    let buffer_time = params
        .buffer_time_max()
        .map_err(PlayerError::config("buffer time query"))?;
    let buffer_time = params
        .set_buffer_time_near(buffer_time)
        .map_err(PlayerError::config("buffer time"))?;
    let buffer_frames = params
        .buffer_size()
        .map_err(PlayerError::config("buffer size query"))?;

    let period_time = params
        .period_time_max()
        .map_err(PlayerError::config("period time query"))?;
    let period_time = params
        .set_period_time_near(period_time)
        .map_err(PlayerError::config("period time"))?;
    let period_frames = params
        .period_size()
        .map_err(PlayerError::config("period size query"))?;

    device
        .hw_params_commit(&params)
        .map_err(PlayerError::config("hw params commit"))?;

    tracing::debug!(
        device = %device.name(),
        ?format,
        channels = header.channels,
        rate_hz = rate,
        buffer_time_us = buffer_time,
        buffer_frames,
        period_time_us = period_time,
        period_frames,
        "hw params committed"
    );

    Ok(NegotiatedSizes {
        buffer_frames,
        period_frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDevice, mock_constraints};

    fn header(bits: u16) -> WaveHeader {
        WaveHeader::pcm(2, 44_100, bits, 0)
    }

    #[test]
    fn picks_format_from_bits_per_sample() {
        for (bits, format) in [
            (8, SampleFormat::U8),
            (16, SampleFormat::S16Le),
            (24, SampleFormat::S24Le),
        ] {
            let mut dev = MockDevice::new("default");
            configure_hw(&mut dev, &header(bits)).unwrap();
            assert_eq!(dev.log().hw.unwrap().format, format, "bits {bits}");
        }
    }

    #[test]
    fn unsupported_bits_fail_before_commit() {
        for bits in [0, 4, 12, 32] {
            let mut dev = MockDevice::new("default");
            match configure_hw(&mut dev, &header(bits)) {
                Err(PlayerError::DeviceConfig { step, source }) => {
                    assert_eq!(step, "sample format");
                    assert!(matches!(source, PcmError::Unsupported(_)));
                }
                other => panic!("bits {bits}: unexpected {other:?}"),
            }
            assert_eq!(dev.log().hw_commits, 0);
        }
    }

    #[test]
    fn buffer_holds_at_least_one_period() {
        let mut dev = MockDevice::new("default");
        let sizes = configure_hw(&mut dev, &header(16)).unwrap();
        assert!(sizes.period_frames > 0);
        assert!(sizes.buffer_frames >= sizes.period_frames);
        assert_eq!(sizes.buffer_frames, 4096);
        assert_eq!(sizes.period_frames, 2048);
    }

    #[test]
    fn different_achieved_rate_is_accepted() {
        let mut constraints = mock_constraints();
        constraints.can_resample = false;
        constraints.rate = (48_000, 48_000);
        let mut dev = MockDevice::with_constraints("default", constraints);
        configure_hw(&mut dev, &header(16)).unwrap();
        assert_eq!(dev.log().hw.unwrap().rate, 48_000);
    }

    #[test]
    fn channel_failure_names_step_and_skips_commit() {
        let mut h = header(16);
        h.channels = 0;
        let mut dev = MockDevice::new("default");
        match configure_hw(&mut dev, &h) {
            Err(PlayerError::DeviceConfig { step, .. }) => assert_eq!(step, "channels count"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(dev.log().hw_commits, 0);
    }

    #[test]
    fn commit_failure_is_reported() {
        let mut dev = MockDevice::new("default");
        dev.fail_hw_commit(PcmError::Backend("busy".to_string()));
        match configure_hw(&mut dev, &header(16)) {
            Err(PlayerError::DeviceConfig { step, .. }) => assert_eq!(step, "hw params commit"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
