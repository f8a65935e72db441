//! Software parameter configuration.

use crate::error::PlayerError;
use crate::negotiate::NegotiatedSizes;
use crate::pcm::{PcmDevice, SwParams};

/// Largest whole number of periods that fits the buffer, in frames.
///
/// Playback starts only once this much is queued, so it begins with a nearly full buffer.
pub fn start_threshold(sizes: NegotiatedSizes) -> u32 {
    let period = sizes.period_frames.max(1);
    (sizes.buffer_frames / period) * period
}

/// Install the start threshold and a one-period wake-up threshold on `device`.
pub fn configure_sw<D: PcmDevice + ?Sized>(
    device: &mut D,
    sizes: NegotiatedSizes,
) -> Result<SwParams, PlayerError> {
    let mut params = device
        .sw_params_current()
        .map_err(PlayerError::config("current sw params"))?;
    params
        .set_start_threshold(start_threshold(sizes))
        .map_err(PlayerError::config("start threshold"))?;
    params
        .set_avail_min(sizes.period_frames)
        .map_err(PlayerError::config("avail min"))?;
    device
        .sw_params_commit(&params)
        .map_err(PlayerError::config("sw params commit"))?;

    tracing::debug!(
        start_threshold = params.start_threshold(),
        avail_min = params.avail_min(),
        "sw params committed"
    );
    Ok(params)
}
