use crate::error::PcmError;

/// Software thresholds of a configured device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwParams {
    buffer_frames: u32,
    start_threshold: u32,
    avail_min: u32,
}

impl SwParams {
    /// Defaults for a freshly configured device: start on the first frame, wake every period.
    pub fn new(buffer_frames: u32, period_frames: u32) -> Self {
        Self {
            buffer_frames,
            start_threshold: 1,
            avail_min: period_frames.max(1),
        }
    }

    /// Queued frames needed before a prepared device starts playing.
    pub fn start_threshold(&self) -> u32 {
        self.start_threshold
    }

    /// Free frames needed before a blocked writer is woken.
    pub fn avail_min(&self) -> u32 {
        self.avail_min
    }

    pub fn buffer_frames(&self) -> u32 {
        self.buffer_frames
    }

    pub fn set_start_threshold(&mut self, frames: u32) -> Result<(), PcmError> {
        if frames == 0 {
            return Err(PcmError::Invalid("start threshold 0".to_string()));
        }
        self.start_threshold = frames;
        Ok(())
    }

    pub fn set_avail_min(&mut self, frames: u32) -> Result<(), PcmError> {
        if frames == 0 || frames > self.buffer_frames {
            return Err(PcmError::Invalid(format!(
                "avail min {frames} outside 1..={}",
                self.buffer_frames
            )));
        }
        self.avail_min = frames;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avail_min_must_fit_buffer() {
        let mut sw = SwParams::new(1024, 256);
        assert_eq!(sw.avail_min(), 256);
        assert!(sw.set_avail_min(0).is_err());
        assert!(sw.set_avail_min(2048).is_err());
        sw.set_avail_min(1024).unwrap();
        assert_eq!(sw.avail_min(), 1024);
    }

    #[test]
    fn start_threshold_rejects_zero() {
        let mut sw = SwParams::new(1024, 256);
        assert_eq!(sw.start_threshold(), 1);
        assert!(sw.set_start_threshold(0).is_err());
        sw.set_start_threshold(4096).unwrap();
        assert_eq!(sw.start_threshold(), 4096);
    }
}
