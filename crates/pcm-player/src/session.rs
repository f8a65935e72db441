//! Playback entry points.
//!
//! [`PlaybackSession`] owns the open device between calls. Each `play` validates the header,
//! opens the device if needed, negotiates hardware and software parameters and streams the data
//! chunk. The device is left open afterwards so the next file starts without reopening it;
//! [`PlaybackSession::close_device`] drains and releases it.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use crate::cancel::{CancelToken, StopHandle};
use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::header::WaveHeader;
use crate::negotiate::configure_hw;
use crate::pcm::{PcmBackend, PcmDevice};
use crate::stream::{StreamReport, stream_pcm};
use crate::swparams::configure_sw;

pub struct PlaybackSession<B: PcmBackend> {
    backend: B,
    config: PlayerConfig,
    device_name: String,
    device: Option<B::Device>,
    token: CancelToken,
}

impl<B: PcmBackend> PlaybackSession<B> {
    pub fn new(backend: B, config: PlayerConfig) -> Self {
        Self {
            backend,
            device_name: config.device.clone(),
            config,
            device: None,
            token: CancelToken::new(),
        }
    }

    /// Device used by the next `play` that does not name one.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Handle for stopping playback from another thread, bounded by
    /// [`PlayerConfig::stop_timeout`].
    pub fn stop_handle(&self) -> StopHandle {
        self.token.stop_handle(self.config.stop_timeout)
    }

    /// Open the current device unless a handle is already open.
    pub fn open_device(&mut self) -> Result<(), PlayerError> {
        open_slot(&self.backend, &mut self.device, &self.device_name)?;
        Ok(())
    }

    /// Play out whatever is still queued, then release the device. No-op when nothing is open.
    pub fn close_device(&mut self) {
        let Some(mut device) = self.device.take() else {
            return;
        };
        if let Err(e) = device.drain() {
            tracing::warn!(device = %self.device_name, "drain failed: {e}");
        }
        tracing::info!(device = %self.device_name, "device closed");
    }

    /// Play the wave file at `path` on `device` (or the session's current device).
    pub fn play(
        &mut self,
        path: impl AsRef<Path>,
        device: Option<&str>,
    ) -> Result<StreamReport, PlayerError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| {
            let err = PlayerError::Open {
                path: path.to_path_buf(),
                source,
            };
            tracing::error!("{err}");
            err
        })?;
        tracing::info!(path = %path.display(), "playing");
        self.play_reader(&mut BufReader::new(file), device)
    }

    /// Play a wave stream from any seekable reader.
    ///
    /// Blocks until the data ends, a read fails, or a stop is requested through a
    /// [`StopHandle`]. Header and device setup failures are returned (and logged); faults
    /// while streaming are handled internally and show up in the report.
    pub fn play_reader<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        device: Option<&str>,
    ) -> Result<StreamReport, PlayerError> {
        // Held for the whole call so a stop during setup is seen by the stream loop.
        let _active = self.token.begin();
        let result = self.run(reader, device);
        match &result {
            Ok(report) => tracing::info!(
                end = ?report.end_reason,
                periods = report.periods_written,
                dropped = report.periods_dropped,
                recovered = report.faults_recovered,
                "playback finished"
            ),
            Err(e) => tracing::error!("{e}"),
        }
        result
    }

    fn run<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        device: Option<&str>,
    ) -> Result<StreamReport, PlayerError> {
        let header = WaveHeader::read_from(reader)?;
        if let Some(name) = device {
            self.select_device(name);
        }
        tracing::debug!(
            channels = header.channels,
            rate_hz = header.sample_rate,
            bits = header.bits_per_sample,
            data_len = header.data_len,
            "wave header"
        );

        let device = open_slot(&self.backend, &mut self.device, &self.device_name)?;
        let sizes = configure_hw(device, &header)?;
        configure_sw(device, sizes)?;

        let frame_bytes = device_frame_bytes(&header);
        if usize::from(header.block_align) != frame_bytes {
            tracing::warn!(
                block_align = header.block_align,
                frame_bytes,
                "header block alignment disagrees with format, using format frame size"
            );
        }

        let report = match header.data_len_hint().filter(|_| self.config.clamp_to_data_chunk) {
            Some(len) => stream_pcm(
                &mut reader.by_ref().take(len),
                device,
                sizes,
                frame_bytes,
                &self.token,
                &self.config,
            ),
            None => stream_pcm(reader, device, sizes, frame_bytes, &self.token, &self.config),
        };
        Ok(report)
    }

    /// Make `name` the session's device, closing a handle opened on a different one.
    fn select_device(&mut self, name: &str) {
        if name == self.device_name {
            return;
        }
        if self.device.is_some() {
            tracing::info!(from = %self.device_name, to = %name, "switching device");
            self.close_device();
        }
        self.device_name = name.to_string();
    }
}

impl<B: PcmBackend> Drop for PlaybackSession<B> {
    fn drop(&mut self) {
        self.close_device();
    }
}

fn open_slot<'a, B: PcmBackend>(
    backend: &B,
    slot: &'a mut Option<B::Device>,
    name: &str,
) -> Result<&'a mut B::Device, PlayerError> {
    let device = match slot.take() {
        Some(device) => device,
        None => {
            let device = backend.open(name).map_err(|source| PlayerError::DeviceOpen {
                device: name.to_string(),
                source,
            })?;
            tracing::info!(device = %name, "device opened");
            device
        }
    };
    Ok(slot.insert(device))
}

/// Bytes per interleaved frame in the negotiated format.
fn device_frame_bytes(header: &WaveHeader) -> usize {
    usize::from(header.channels) * usize::from(header.bits_per_sample / 8)
}
