/// Sample encodings a wave file can hand to the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// 8-bit unsigned, 128 is silence.
    U8,
    /// 16-bit signed little-endian.
    S16Le,
    /// 24-bit signed little-endian, packed in 3 bytes as stored in wave files.
    S24Le,
}

impl SampleFormat {
    /// Map a wave header's bits-per-sample to an encoding.
    pub fn from_bits_per_sample(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(Self::U8),
            16 => Some(Self::S16Le),
            24 => Some(Self::S24Le),
            _ => None,
        }
    }

    /// Bytes per sample (one channel).
    pub const fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16Le => 2,
            Self::S24Le => 3,
        }
    }

    /// Decode one sample to `[-1.0, 1.0)`.
    ///
    /// `raw` must hold at least [`bytes`](Self::bytes) bytes.
    pub fn to_f32(self, raw: &[u8]) -> f32 {
        match self {
            Self::U8 => (f32::from(raw[0]) - 128.0) / 128.0,
            Self::S16Le => f32::from(i16::from_le_bytes([raw[0], raw[1]])) / 32_768.0,
            Self::S24Le => {
                let v = i32::from_le_bytes([0, raw[0], raw[1], raw[2]]) >> 8;
                v as f32 / 8_388_608.0
            }
        }
    }

    /// Decode interleaved samples, appending to `out`. A trailing partial sample is ignored.
    pub fn decode_into(self, bytes: &[u8], out: &mut Vec<f32>) {
        let width = self.bytes();
        out.reserve(bytes.len() / width);
        out.extend(bytes.chunks_exact(width).map(|raw| self.to_f32(raw)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bits_per_sample_accepts_8_16_24_only() {
        assert_eq!(SampleFormat::from_bits_per_sample(8), Some(SampleFormat::U8));
        assert_eq!(SampleFormat::from_bits_per_sample(16), Some(SampleFormat::S16Le));
        assert_eq!(SampleFormat::from_bits_per_sample(24), Some(SampleFormat::S24Le));
        for bits in [0, 4, 12, 20, 32, 64] {
            assert_eq!(SampleFormat::from_bits_per_sample(bits), None, "bits {bits}");
        }
    }

    #[test]
    fn u8_midpoint_is_silence() {
        assert_eq!(SampleFormat::U8.to_f32(&[128]), 0.0);
        assert_eq!(SampleFormat::U8.to_f32(&[0]), -1.0);
    }

    #[test]
    fn s16_extremes() {
        assert_eq!(SampleFormat::S16Le.to_f32(&i16::MIN.to_le_bytes()), -1.0);
        assert_eq!(SampleFormat::S16Le.to_f32(&[0, 0]), 0.0);
        assert!(SampleFormat::S16Le.to_f32(&i16::MAX.to_le_bytes()) < 1.0);
    }

    #[test]
    fn s24_sign_extends() {
        assert_eq!(SampleFormat::S24Le.to_f32(&[0x00, 0x00, 0x80]), -1.0);
        assert_eq!(SampleFormat::S24Le.to_f32(&[0xFF, 0xFF, 0xFF]), -1.0 / 8_388_608.0);
        assert_eq!(SampleFormat::S24Le.to_f32(&[0x00, 0x00, 0x40]), 0.5);
    }

    #[test]
    fn decode_into_drops_partial_tail() {
        let mut out = Vec::new();
        SampleFormat::S16Le.decode_into(&[0, 0, 0, 0x40, 0xAA], &mut out);
        assert_eq!(out, vec![0.0, 0.5]);
    }
}
