//! Hardware configuration space.
//!
//! A device reports what it can do as [`HwConstraints`]; [`HwParams`] narrows that space one
//! choice at a time and [`HwParams::finish`] turns a fully narrowed space into the [`HwConfig`]
//! a device installs. Nothing here talks to hardware.

use crate::error::PcmError;

use super::SampleFormat;

/// Sample layout in the write buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Frames of all channels one after the other.
    RwInterleaved,
    /// One buffer per channel.
    RwNonInterleaved,
}

/// What a device can accept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HwConstraints {
    pub formats: Vec<SampleFormat>,
    pub access: Vec<Access>,
    /// Inclusive channel count range.
    pub channels: (u16, u16),
    /// Inclusive native sample-rate range in Hz.
    pub rate: (u32, u32),
    /// Whether the device can convert any requested rate when resampling is enabled.
    pub can_resample: bool,
    /// Inclusive ring buffer range in frames.
    pub buffer_frames: (u32, u32),
    /// Inclusive period range in frames.
    pub period_frames: (u32, u32),
    /// Minimum number of periods that must fit in the buffer.
    pub min_periods: u32,
}

/// A fully negotiated hardware configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HwConfig {
    pub access: Access,
    pub format: SampleFormat,
    pub channels: u16,
    pub rate: u32,
    pub resample: bool,
    pub buffer_frames: u32,
    pub period_frames: u32,
}

impl HwConfig {
    /// Bytes per interleaved frame.
    pub fn frame_bytes(&self) -> usize {
        self.format.bytes() * usize::from(self.channels)
    }
}

/// Hardware configuration being negotiated.
///
/// Times are in microseconds, sizes in frames. Buffer and period times can only be chosen once
/// the rate is known, and the period is bounded by the chosen buffer.
#[derive(Clone, Debug)]
pub struct HwParams {
    constraints: HwConstraints,
    resample: bool,
    access: Option<Access>,
    format: Option<SampleFormat>,
    channels: Option<u16>,
    rate: Option<u32>,
    buffer_frames: Option<u32>,
    period_frames: Option<u32>,
}

impl HwParams {
    /// The whole configuration space described by `constraints`.
    pub fn any(constraints: HwConstraints) -> Self {
        Self {
            constraints,
            resample: false,
            access: None,
            format: None,
            channels: None,
            rate: None,
            buffer_frames: None,
            period_frames: None,
        }
    }

    pub fn constraints(&self) -> &HwConstraints {
        &self.constraints
    }

    /// Allow the device to convert rates it does not support natively.
    pub fn set_rate_resample(&mut self, enable: bool) -> Result<(), PcmError> {
        self.resample = enable;
        Ok(())
    }

    pub fn set_access(&mut self, access: Access) -> Result<(), PcmError> {
        if !self.constraints.access.contains(&access) {
            return Err(PcmError::Invalid(format!("access {access:?} not available")));
        }
        self.access = Some(access);
        Ok(())
    }

    pub fn set_format(&mut self, format: SampleFormat) -> Result<(), PcmError> {
        if !self.constraints.formats.contains(&format) {
            return Err(PcmError::Invalid(format!("sample format {format:?} not available")));
        }
        self.format = Some(format);
        Ok(())
    }

    pub fn set_channels(&mut self, channels: u16) -> Result<(), PcmError> {
        let (min, max) = self.constraints.channels;
        if channels < min || channels > max {
            return Err(PcmError::Invalid(format!(
                "channels count ({channels}) not available, device takes {min}..={max}"
            )));
        }
        self.channels = Some(channels);
        Ok(())
    }

    /// Pick the supported rate closest to `rate`. Returns the rate actually chosen.
    pub fn set_rate_near(&mut self, rate: u32) -> Result<u32, PcmError> {
        if rate == 0 {
            return Err(PcmError::Invalid("rate 0Hz".to_string()));
        }
        let (min, max) = self.constraints.rate;
        let chosen = if self.resample && self.constraints.can_resample {
            rate
        } else {
            rate.clamp(min, max)
        };
        self.rate = Some(chosen);
        Ok(chosen)
    }

    /// Longest buffer the device allows at the chosen rate.
    pub fn buffer_time_max(&self) -> Result<u32, PcmError> {
        let rate = self.require_rate()?;
        Ok(frames_to_us(self.constraints.buffer_frames.1, rate))
    }

    /// Pick the buffer length closest to `us`. Returns the time actually chosen.
    pub fn set_buffer_time_near(&mut self, us: u32) -> Result<u32, PcmError> {
        let rate = self.require_rate()?;
        let (min, max) = self.constraints.buffer_frames;
        let frames = us_to_frames(us, rate).clamp(min.max(1), max.max(1));
        self.buffer_frames = Some(frames);
        Ok(frames_to_us(frames, rate))
    }

    pub fn buffer_size(&self) -> Result<u32, PcmError> {
        self.buffer_frames
            .ok_or_else(|| PcmError::Invalid("buffer size not chosen".to_string()))
    }

    /// Longest period allowed at the chosen rate and buffer.
    pub fn period_time_max(&self) -> Result<u32, PcmError> {
        let rate = self.require_rate()?;
        Ok(frames_to_us(self.period_bounds().1, rate))
    }

    /// Pick the period length closest to `us`. Returns the time actually chosen.
    pub fn set_period_time_near(&mut self, us: u32) -> Result<u32, PcmError> {
        let rate = self.require_rate()?;
        let (min, max) = self.period_bounds();
        let frames = us_to_frames(us, rate).clamp(min, max);
        self.period_frames = Some(frames);
        Ok(frames_to_us(frames, rate))
    }

    pub fn period_size(&self) -> Result<u32, PcmError> {
        self.period_frames
            .ok_or_else(|| PcmError::Invalid("period size not chosen".to_string()))
    }

    pub fn format(&self) -> Option<SampleFormat> {
        self.format
    }

    pub fn channels(&self) -> Option<u16> {
        self.channels
    }

    pub fn rate(&self) -> Option<u32> {
        self.rate
    }

    /// Check that every choice was made and is consistent.
    pub fn finish(&self) -> Result<HwConfig, PcmError> {
        let missing = |what: &str| PcmError::Invalid(format!("{what} not chosen"));
        let config = HwConfig {
            access: self.access.ok_or_else(|| missing("access"))?,
            format: self.format.ok_or_else(|| missing("sample format"))?,
            channels: self.channels.ok_or_else(|| missing("channels"))?,
            rate: self.require_rate()?,
            resample: self.resample,
            buffer_frames: self.buffer_size()?,
            period_frames: self.period_size()?,
        };
        if config.period_frames == 0 || config.period_frames > config.buffer_frames {
            return Err(PcmError::Invalid(format!(
                "period {} frames does not fit buffer {} frames",
                config.period_frames, config.buffer_frames
            )));
        }
        Ok(config)
    }

    fn require_rate(&self) -> Result<u32, PcmError> {
        self.rate
            .ok_or_else(|| PcmError::Invalid("rate not chosen".to_string()))
    }

    /// Period range narrowed by the buffer: at least `min_periods` periods must fit.
    fn period_bounds(&self) -> (u32, u32) {
        let (min, max) = self.constraints.period_frames;
        let buffer = self.buffer_frames.unwrap_or(self.constraints.buffer_frames.1);
        let fit = (buffer / self.constraints.min_periods.max(1)).max(1);
        let max = max.min(fit).max(1);
        (min.clamp(1, max), max)
    }
}

/// Saturates at `u32::MAX` for very low rates.
fn frames_to_us(frames: u32, rate: u32) -> u32 {
    let us = u64::from(frames) * 1_000_000 / u64::from(rate.max(1));
    u32::try_from(us).unwrap_or(u32::MAX)
}

/// `u32::MAX` stands for a saturated time and maps back to as many frames as possible.
fn us_to_frames(us: u32, rate: u32) -> u32 {
    if us == u32::MAX {
        return u32::MAX;
    }
    let frames = (u64::from(us) * u64::from(rate) + 500_000) / 1_000_000;
    u32::try_from(frames).unwrap_or(u32::MAX)
}
