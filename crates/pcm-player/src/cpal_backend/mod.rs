//! Output devices backed by CPAL.
//!
//! CPAL is callback driven; [`CpalPcm`] turns it into the blocking write API the engine
//! expects, with a bounded queue in between and a Rubato resampler when the device lacks the
//! negotiated rate.

mod device;
mod pcm;
mod playback;
mod queue;
mod resample;

pub use device::{list_output_devices, pick_device};
pub use pcm::CpalPcm;

use crate::config::CpalConfig;
use crate::error::PcmError;
use crate::pcm::PcmBackend;

/// Opens output devices on the default CPAL host.
pub struct CpalBackend {
    host: cpal::Host,
    config: CpalConfig,
}

impl CpalBackend {
    pub fn new(config: CpalConfig) -> Self {
        let host = cpal::default_host();
        tracing::debug!(host = ?host.id(), "audio host");
        Self { host, config }
    }

    /// Names of the output devices on this host.
    pub fn device_names(&self) -> Result<Vec<String>, PcmError> {
        list_output_devices(&self.host)
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new(CpalConfig::default())
    }
}

impl PcmBackend for CpalBackend {
    type Device = CpalPcm;

    fn open(&self, name: &str) -> Result<CpalPcm, PcmError> {
        let device = pick_device(&self.host, name)?;
        CpalPcm::new(name, device, self.config.clone())
    }
}
