//! Channel downmixing for the capture path.
//!
//! Input hardware frequently opens in stereo even when a single microphone is
//! attached.  Captured sessions are always mono, so the cpal callback folds
//! every interleaved frame into one sample before the chunk is published.

/// Average each interleaved frame of `samples` into a single mono sample.
///
/// A trailing partial frame (fewer than `channels` samples) is discarded.
///
/// ```rust
/// use voice_emotion::audio::downmix_to_mono;
///
/// let stereo = [0.5_f32, 0.1, -0.4, 0.0];
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.3).abs() < 1e-6);
/// assert!((mono[1] + 0.2).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => samples
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_input_is_copied_verbatim() {
        let input = [0.25_f32, -0.75, 1.0];
        assert_eq!(downmix_to_mono(&input, 1), input.to_vec());
    }

    #[test]
    fn zero_channels_yields_nothing() {
        assert!(downmix_to_mono(&[0.1, 0.2], 0).is_empty());
    }

    #[test]
    fn four_channel_frames_are_averaged() {
        let quad = [1.0_f32, 0.0, 0.0, 0.0, 0.4, 0.4, 0.4, 0.4];
        let mono = downmix_to_mono(&quad, 4);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.25).abs() < 1e-6);
        assert!((mono[1] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn partial_trailing_frame_is_dropped() {
        let odd = [0.2_f32, 0.4, 0.6];
        assert_eq!(downmix_to_mono(&odd, 2).len(), 1);
    }
}
