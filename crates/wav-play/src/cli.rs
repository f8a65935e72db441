use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use pcm_player::config::DEFAULT_DEVICE;
use pcm_player::{CpalConfig, PlayerConfig};

#[derive(Parser, Debug)]
#[command(name = "wav-play", version, about = "Play an uncompressed PCM wave file")]
pub struct Args {
    /// Path to a 44-byte-header PCM wave file (8, 16 or 24 bit)
    #[arg(required_unless_present = "list_devices")]
    pub path: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Output device: "default" or a substring of the device name
    #[arg(long, default_value = DEFAULT_DEVICE)]
    pub device: String,

    /// How long Ctrl-C waits for playback to acknowledge the stop (0 waits forever)
    #[arg(long, default_value_t = 50)]
    pub stop_timeout_ms: u64,

    /// Play everything after the header, including chunks past the end of the data chunk
    #[arg(long)]
    pub no_clamp_data: bool,

    /// Upper bound on the device ring buffer, in frames
    #[arg(long, default_value_t = 16_384)]
    pub max_buffer_frames: u32,

    /// Resampler input chunk size in frames (only used when the device lacks the file rate)
    #[arg(long, default_value_t = 1024)]
    pub chunk_frames: usize,
}

impl Args {
    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            device: self.device.clone(),
            stop_timeout: match self.stop_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            clamp_to_data_chunk: !self.no_clamp_data,
            ..PlayerConfig::default()
        }
    }

    pub fn cpal_config(&self) -> CpalConfig {
        CpalConfig {
            max_buffer_frames: self.max_buffer_frames,
            resample_chunk_frames: self.chunk_frames,
        }
    }
}
