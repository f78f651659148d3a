//! 16-bit PCM RIFF/WAVE encoding.
//!
//! [`encode_wav`] is a pure function producing the canonical 44-byte header
//! followed by little-endian `i16` samples.  No chunks other than `fmt ` and
//! `data` are written.
//!
//! ```text
//! 0  "RIFF"  4  chunk size (file length - 8)  8  "WAVE"
//! 12 "fmt "  16 16  20 1 (PCM)  22 channels  24 sample rate
//! 28 byte rate  32 block align  34 16 (bits per sample)
//! 36 "data"  40 data size  44.. samples
//! ```

use super::buffer::MergedPcm;

/// Size of the RIFF/WAVE header written by [`encode_wav`].
pub const WAV_HEADER_LEN: usize = 44;

/// MIME tag attached to every encoded artifact.
pub const WAV_MIME: &str = "audio/wav";

const BYTES_PER_SAMPLE: usize = 2;

// ---------------------------------------------------------------------------
// Sample conversion
// ---------------------------------------------------------------------------

/// Convert one float sample to signed 16-bit PCM.
///
/// The sample is clamped to `[-1.0, 1.0]`; negative values scale by 32768 and
/// non-negative values by 32767, so `-1.0 → -32768` and `1.0 → 32767`.
/// NaN maps to silence.
pub fn sample_to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).round() as i16
    }
}

// ---------------------------------------------------------------------------
// encode_wav
// ---------------------------------------------------------------------------

/// Encode `samples` (interleaved when `channels > 1`) as a 16-bit PCM WAV
/// byte buffer.
///
/// The output is exactly `44 + samples.len() * 2` bytes, i.e.
/// `44 + frames * channels * 2`.  Zero samples produce a valid, silent,
/// header-only file.
///
/// ```rust
/// use voice_emotion::audio::encode_wav;
///
/// let bytes = encode_wav(&[0.0, 0.5, -0.5], 16_000, 1);
/// assert_eq!(bytes.len(), 44 + 3 * 2);
/// assert_eq!(&bytes[0..4], b"RIFF");
/// assert_eq!(&bytes[36..40], b"data");
/// ```
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<u8> {
    let data_len = samples.len() * BYTES_PER_SAMPLE;
    let data_size = u32::try_from(data_len).unwrap_or(u32::MAX);
    let chunk_size = data_size.saturating_add((WAV_HEADER_LEN - 8) as u32);
    let block_align = channels.saturating_mul(BYTES_PER_SAMPLE as u16);
    let byte_rate = sample_rate.saturating_mul(block_align as u32);

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&chunk_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    for &s in samples {
        out.extend_from_slice(&sample_to_i16(s).to_le_bytes());
    }

    out
}

// ---------------------------------------------------------------------------
// WavArtifact
// ---------------------------------------------------------------------------

/// An encoded WAV file ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct WavArtifact {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime: String,
}

impl WavArtifact {
    /// Encode `samples` and tag the result with `filename` and `audio/wav`.
    pub fn encode(
        samples: &[f32],
        sample_rate: u32,
        channels: u16,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            bytes: encode_wav(samples, sample_rate, channels),
            filename: filename.into(),
            mime: WAV_MIME.to_string(),
        }
    }

    /// Encode a finished capture session.
    pub fn from_pcm(pcm: &MergedPcm, filename: impl Into<String>) -> Self {
        Self::encode(&pcm.samples, pcm.sample_rate, pcm.channels, filename)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Swap the extension of `original` for `.wav` (`voice.mp3` → `voice.wav`).
///
/// Names without an extension get `.wav` appended; an empty name becomes
/// `audio.wav`.
pub fn wav_filename(original: &str) -> String {
    let stem = match original.rfind('.') {
        Some(0) | None => original,
        Some(idx) => &original[..idx],
    };
    if stem.is_empty() {
        "audio.wav".to_string()
    } else {
        format!("{stem}.wav")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test]
    fn header_fields_are_bit_exact() {
        let bytes = encode_wav(&[0.0; 100], 44_100, 1);

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4), bytes.len() as u32 - 8);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u32_at(&bytes, 16), 16);
        assert_eq!(u16_at(&bytes, 20), 1);
        assert_eq!(u16_at(&bytes, 22), 1);
        assert_eq!(u32_at(&bytes, 24), 44_100);
        assert_eq!(u32_at(&bytes, 28), 88_200);
        assert_eq!(u16_at(&bytes, 32), 2);
        assert_eq!(u16_at(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), 200);
    }

    #[test]
    fn stereo_header_rates() {
        let bytes = encode_wav(&[0.0; 8], 48_000, 2);
        assert_eq!(u16_at(&bytes, 22), 2);
        assert_eq!(u32_at(&bytes, 28), 48_000 * 2 * 2);
        assert_eq!(u16_at(&bytes, 32), 4);
        assert_eq!(bytes.len(), 44 + 8 * 2);
    }

    #[test]
    fn zero_samples_is_header_only() {
        let bytes = encode_wav(&[], 16_000, 1);
        assert_eq!(bytes.len(), WAV_HEADER_LEN);
        assert_eq!(u32_at(&bytes, 4), 36);
        assert_eq!(u32_at(&bytes, 40), 0);
    }

    #[test]
    fn asymmetric_full_scale_mapping() {
        assert_eq!(sample_to_i16(1.0), 32_767);
        assert_eq!(sample_to_i16(-1.0), -32_768);
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(sample_to_i16(0.5), 16_384);
        assert_eq!(sample_to_i16(-0.5), -16_384);
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        assert_eq!(sample_to_i16(1.7), 32_767);
        assert_eq!(sample_to_i16(-3.0), -32_768);
        assert_eq!(sample_to_i16(f32::NAN), 0);
    }

    #[test]
    fn ten_thousand_sample_capture_is_20524_bytes() {
        let samples = vec![0.25_f32; 10_240];
        let bytes = encode_wav(&samples, 44_100, 1);
        assert_eq!(bytes.len(), 20_524);
    }

    #[test]
    fn hound_reads_back_the_quantised_samples() {
        let input = [0.0_f32, 1.0, -1.0, 0.5, -0.25];
        let bytes = encode_wav(&input, 22_050, 1);

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).expect("valid wav");
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 22_050);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);

        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        let expected: Vec<i16> = input.iter().map(|&s| sample_to_i16(s)).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn artifact_from_pcm_carries_name_and_mime() {
        let pcm = MergedPcm::mono(vec![0.1; 16], 16_000);
        let artifact = WavArtifact::from_pcm(&pcm, "recording.wav");
        assert_eq!(artifact.filename, "recording.wav");
        assert_eq!(artifact.mime, "audio/wav");
        assert_eq!(artifact.len(), 44 + 32);
    }

    #[test]
    fn wav_filename_replaces_extension() {
        assert_eq!(wav_filename("voice.mp3"), "voice.wav");
        assert_eq!(wav_filename("take.two.m4a"), "take.two.wav");
        assert_eq!(wav_filename("clip"), "clip.wav");
        assert_eq!(wav_filename(".hidden"), ".hidden.wav");
        assert_eq!(wav_filename(""), "audio.wav");
    }
}
