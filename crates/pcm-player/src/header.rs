//! Wave header validation.
//!
//! Only the canonical 44-byte layout is accepted: `RIFF` / `WAVE` / a 16-byte `fmt ` chunk /
//! `data`. Fields are decoded one by one from little-endian bytes.

use std::io::{Read, Seek, SeekFrom};

use crate::error::FormatError;
use crate::io::read_up_to;

/// Size of the canonical wave header; samples start right after it.
pub const WAVE_HEADER_LEN: usize = 44;

/// Parsed canonical wave header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaveHeader {
    pub riff: [u8; 4],
    /// Container length (file size minus 8).
    pub riff_len: u32,
    pub wave: [u8; 4],
    pub fmt: [u8; 4],
    pub fmt_len: u32,
    /// Encoding tag (1 = integer PCM).
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    /// Bytes per sample frame across all channels.
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data: [u8; 4],
    /// Length of the `data` chunk payload in bytes.
    pub data_len: u32,
}

impl WaveHeader {
    /// Header for a plain integer PCM stream, with the derived fields filled in.
    pub fn pcm(channels: u16, sample_rate: u32, bits_per_sample: u16, data_len: u32) -> Self {
        let block_align = channels.saturating_mul(bits_per_sample.div_ceil(8));
        Self {
            riff: *b"RIFF",
            riff_len: data_len.saturating_add(WAVE_HEADER_LEN as u32 - 8),
            wave: *b"WAVE",
            fmt: *b"fmt ",
            fmt_len: 16,
            format_tag: 1,
            channels,
            sample_rate,
            byte_rate: sample_rate.saturating_mul(u32::from(block_align)),
            block_align,
            bits_per_sample,
            data: *b"data",
            data_len,
        }
    }

    /// Decode and validate a header from the first 44 bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let b: &[u8; WAVE_HEADER_LEN] = bytes
            .get(..WAVE_HEADER_LEN)
            .and_then(|head| head.try_into().ok())
            .ok_or(FormatError::Truncated { len: bytes.len() })?;

        let tag = |at: usize| [b[at], b[at + 1], b[at + 2], b[at + 3]];
        let u16_at = |at: usize| u16::from_le_bytes([b[at], b[at + 1]]);
        let u32_at = |at: usize| u32::from_le_bytes(tag(at));

        let header = Self {
            riff: tag(0),
            riff_len: u32_at(4),
            wave: tag(8),
            fmt: tag(12),
            fmt_len: u32_at(16),
            format_tag: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data: tag(36),
            data_len: u32_at(40),
        };
        header.check_tags()?;
        Ok(header)
    }

    /// Seek `src` to the start, read and validate the header.
    ///
    /// On success the read cursor sits on the first sample byte.
    pub fn read_from<R: Read + Seek>(src: &mut R) -> Result<Self, FormatError> {
        src.seek(SeekFrom::Start(0))?;
        let mut buf = [0u8; WAVE_HEADER_LEN];
        let len = read_up_to(src, &mut buf)?;
        if len < WAVE_HEADER_LEN {
            return Err(FormatError::Truncated { len });
        }
        Self::parse(&buf)
    }

    /// Encode back into the 44-byte on-disk layout.
    pub fn to_bytes(&self) -> [u8; WAVE_HEADER_LEN] {
        let mut out = [0u8; WAVE_HEADER_LEN];
        out[0..4].copy_from_slice(&self.riff);
        out[4..8].copy_from_slice(&self.riff_len.to_le_bytes());
        out[8..12].copy_from_slice(&self.wave);
        out[12..16].copy_from_slice(&self.fmt);
        out[16..20].copy_from_slice(&self.fmt_len.to_le_bytes());
        out[20..22].copy_from_slice(&self.format_tag.to_le_bytes());
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(&self.data);
        out[40..44].copy_from_slice(&self.data_len.to_le_bytes());
        out
    }

    /// Payload length to trust, if any.
    ///
    /// Streamed files often carry 0 or `0xFFFF_FFFF` because the writer never knew the final
    /// length; those yield `None`.
    pub fn data_len_hint(&self) -> Option<u64> {
        match self.data_len {
            0 | u32::MAX => None,
            len => Some(u64::from(len)),
        }
    }

    fn check_tags(&self) -> Result<(), FormatError> {
        let checks: [(&'static str, &[u8; 4], &[u8]); 4] = [
            ("RIFF", &self.riff, b"RIFF"),
            ("WAVE", &self.wave, b"WAVE"),
            ("fmt", &self.fmt, b"fmt"),
            ("data", &self.data, b"data"),
        ];
        for (field, found, expected) in checks {
            if !found[..expected.len()].eq_ignore_ascii_case(expected) {
                return Err(FormatError::BadTag {
                    field,
                    found: String::from_utf8_lossy(found).into_owned(),
                });
            }
        }
        Ok(())
    }
}
