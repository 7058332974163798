//! Audio decoding (Symphonia)
//!
//! Decodes an in-memory source file into interleaved `f32` samples, keeping the
//! source channel count and sample rate.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::error::{Result, SnippetError};

/// Decoded PCM audio
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Interleaved samples in `[-1.0, 1.0]` (nominally)
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    /// Number of sample frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frame_count() as f64 / self.sample_rate as f64
        }
    }

    /// Keep only the first `frames` frames
    pub fn truncate_frames(&mut self, frames: usize) {
        let len = frames.saturating_mul(self.channels as usize);
        self.samples.truncate(len);
    }
}

/// Guess a probe hint from the extension at the end of a URL path
fn hint_for(url: &str) -> Hint {
    let mut hint = Hint::new();
    let path = url.split(|c| c == '?' || c == '#').next().unwrap_or(url);
    if let Some((_, ext)) = path.rsplit_once('.') {
        if !ext.is_empty() && !ext.contains('/') {
            hint.with_extension(&ext.to_ascii_lowercase());
        }
    }
    hint
}

/// Decode a complete audio file held in memory
///
/// `url` is only used for the format hint and error messages.
pub fn decode_audio(bytes: Vec<u8>, url: &str) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &hint_for(url),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| SnippetError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SnippetError::UnsupportedFormat("No audio track found".to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SnippetError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                log::warn!("decode_audio: Error reading packet from {}: {}", url, e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("decode_audio: Skipping corrupt packet in {}: {}", url, e);
                continue;
            }
            Err(e) => return Err(SnippetError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count() as u16);

        let buf = sample_buf.get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
        if buf.capacity() < decoded.capacity() * spec.channels.count() {
            *buf = SampleBuffer::new(decoded.capacity() as u64, spec);
        }
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    let sample_rate = sample_rate
        .filter(|&rate| rate > 0)
        .ok_or_else(|| SnippetError::Decode("Unknown sample rate".to_string()))?;
    let channels = channels
        .filter(|&count| count > 0)
        .ok_or_else(|| SnippetError::Decode("Unknown channel layout".to_string()))?;

    Ok(DecodedAudio {
        sample_rate,
        channels,
        samples,
    })
}
