//! Blocking PCM wave playback.
//!
//! Plays the raw PCM payload of an uncompressed wave file on one output device:
//! 1. **Header**: validate the fixed 44-byte wave header ([`header`]).
//! 2. **Hardware params**: negotiate format, channels, rate, buffer and period sizes ([`negotiate`]).
//! 3. **Software params**: start threshold and wake-up threshold ([`swparams`]).
//! 4. **Stream**: read one period at a time from the file and write it to the device ([`stream`]),
//!    recovering from under-runs and suspends on the way ([`recovery`]).
//!
//! A [`PlaybackSession`] owns the device handle between calls; a [`StopHandle`] taken from it
//! can stop an in-flight playback from another thread ([`cancel`]).

pub mod cancel;
pub mod config;
pub mod cpal_backend;
pub mod error;
pub mod header;
pub mod negotiate;
pub mod pcm;
pub mod recovery;
pub mod session;
pub mod stream;
pub mod swparams;

mod io;

#[cfg(test)]
mod testing;

pub use cancel::{StopHandle, StopOutcome};
pub use config::{CpalConfig, PlayerConfig};
pub use error::{FormatError, PcmError, PlayerError};
pub use header::WaveHeader;
pub use negotiate::NegotiatedSizes;
pub use session::PlaybackSession;
pub use stream::{PlaybackEndReason, StreamReport};
