//! Container decoding and duration measurement using Symphonia.
//!
//! Uploaded files can arrive in any container the platform knows about
//! (WAV, MP3, AAC/M4A, FLAC, Ogg Vorbis).  [`decode_audio`] turns the raw
//! bytes into interleaved `f32` PCM; [`measure_duration`] reports how long
//! that PCM is.  Neither rejects long audio; the duration ceiling is the
//! ingest coordinator's policy.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    /// The bytes are not a container/codec combination we can decode.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

// ---------------------------------------------------------------------------
// DecodedAudio
// ---------------------------------------------------------------------------

/// Fully decoded PCM from an input file.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// `frames / sample_rate`, in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

// ---------------------------------------------------------------------------
// decode_audio / measure_duration
// ---------------------------------------------------------------------------

/// Decode every packet of the default audio track in `bytes`.
///
/// `extension_hint` (e.g. `"mp3"`) speeds up probing but is not required.
///
/// # Errors
///
/// [`DecodeError::UnsupportedFormat`] when the container cannot be probed,
/// has no audio track, uses an unknown codec, or fails mid-stream with
/// anything other than a recoverable packet error.
pub fn decode_audio(bytes: &[u8], extension_hint: Option<&str>) -> Result<DecodedAudio, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnsupportedFormat(format!("probe failed: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::UnsupportedFormat("no audio track found".into()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(format!("no decoder: {e}")))?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channels = codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::UnsupportedFormat(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("decode: skipping corrupt packet: {e}");
            }
            Err(e) => return Err(DecodeError::UnsupportedFormat(e.to_string())),
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err(DecodeError::UnsupportedFormat(
            "stream does not declare a sample rate or channel layout".into(),
        ));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Decode `bytes` and return its duration in seconds.
pub fn measure_duration(bytes: &[u8], extension_hint: Option<&str>) -> Result<f64, DecodeError> {
    Ok(decode_audio(bytes, extension_hint)?.duration_secs())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::encode_wav;

    fn sine(len: usize, sample_rate: u32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn encoded_wav_round_trips_to_the_same_duration() {
        let samples = sine(10_240, 44_100);
        let bytes = encode_wav(&samples, 44_100, 1);

        let secs = measure_duration(&bytes, Some("wav")).expect("decodable");
        assert!((secs - 10_240.0 / 44_100.0).abs() < 1e-9, "secs = {secs}");
    }

    #[test]
    fn decoded_samples_match_within_quantisation_error() {
        let samples = sine(2_000, 16_000);
        let bytes = encode_wav(&samples, 16_000, 1);

        let decoded = decode_audio(&bytes, None).expect("decodable");
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), samples.len());
        for (a, b) in decoded.samples.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn stereo_duration_counts_frames_not_samples() {
        let interleaved = vec![0.1_f32; 2 * 8_000];
        let bytes = encode_wav(&interleaved, 8_000, 2);

        let decoded = decode_audio(&bytes, Some("wav")).expect("decodable");
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.frames(), 8_000);
        assert!((decoded.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn garbage_is_unsupported() {
        let junk = b"definitely not an audio container, just some text".to_vec();
        let err = decode_audio(&junk, None).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(_)));
    }

    #[test]
    fn empty_input_is_unsupported() {
        assert!(matches!(
            measure_duration(&[], Some("mp3")),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn zero_rate_duration_is_zero() {
        let audio = DecodedAudio {
            samples: vec![0.0; 10],
            sample_rate: 0,
            channels: 1,
        };
        assert_eq!(audio.duration_secs(), 0.0);
    }
}
