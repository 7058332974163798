//! Snippet encoding (16-bit PCM WAV)

use std::io::Cursor;

use super::decode::DecodedAudio;
use super::error::Result;

/// Size of the canonical RIFF/WAVE header hound writes for mono or stereo
/// 16-bit PCM
///
/// More than two channels get a `WAVE_FORMAT_EXTENSIBLE` header, which is
/// longer; see [`wav_header_len`].
pub const WAV_HEADER_LEN: usize = 44;

/// Extra `fmt ` bytes of the extensible header used above two channels
const EXTENSIBLE_EXTRA_LEN: usize = 24;

/// Header size hound writes for 16-bit PCM with `channels` channels
pub fn wav_header_len(channels: u16) -> usize {
    if channels > 2 {
        WAV_HEADER_LEN + EXTENSIBLE_EXTRA_LEN
    } else {
        WAV_HEADER_LEN
    }
}

/// Quantize a float sample to signed 16-bit
///
/// Clamps to `[-1.0, 1.0]` first; negative values scale by 32768 and positive
/// values by 32767 so both extremes map onto the full i16 range.
#[inline]
pub fn quantize_i16(sample: f32) -> i16 {
    let clamped = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

/// Encode interleaved audio as an uncompressed 16-bit little-endian WAV file
pub fn encode_wav(audio: &DecodedAudio) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let frames = audio.frame_count();
    let mut bytes = Vec::with_capacity(wav_header_len(audio.channels) + frames * audio.channels as usize * 2);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
        let mut i16_writer = writer.get_i16_writer((frames * audio.channels as usize) as u32);
        for &sample in &audio.samples[..frames * audio.channels as usize] {
            i16_writer.write_sample(quantize_i16(sample));
        }
        i16_writer.flush()?;
        writer.finalize()?;
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_clamps_and_scales() {
        assert_eq!(quantize_i16(1.0), i16::MAX);
        assert_eq!(quantize_i16(-1.0), i16::MIN);
        assert_eq!(quantize_i16(3.5), i16::MAX);
        assert_eq!(quantize_i16(-7.0), i16::MIN);
        assert_eq!(quantize_i16(0.0), 0);
        assert_eq!(quantize_i16(f32::NAN), 0);
    }

    #[test]
    fn test_header_and_data_length() {
        let audio = DecodedAudio {
            sample_rate: 44_100,
            channels: 2,
            samples: vec![0.5; 2 * 441],
        };
        let bytes = encode_wav(&audio).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[36..40], b"data");
        let data_len = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]);
        assert_eq!(data_len as usize, 441 * 2 * 2);
        assert_eq!(bytes.len(), WAV_HEADER_LEN + 441 * 2 * 2);
        // First sample, little endian
        let first = i16::from_le_bytes([bytes[44], bytes[45]]);
        assert_eq!(first, quantize_i16(0.5));
    }

    #[test]
    fn test_surround_uses_extensible_header() {
        let audio = DecodedAudio {
            sample_rate: 48_000,
            channels: 6,
            samples: vec![0.0; 6 * 10],
        };
        let bytes = encode_wav(&audio).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(bytes.len(), wav_header_len(6) + 6 * 10 * 2);
        assert!(wav_header_len(6) > WAV_HEADER_LEN);
        assert_eq!(wav_header_len(2), WAV_HEADER_LEN);
    }
}
