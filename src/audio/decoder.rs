//! Audio decoding using symphonia
//!
//! Decodes stem files to mono f32 samples at their native sample rate.
//! No resampling: the feature extractor sees the file's own rate.

use crate::error::{Result, StemsimError};
use crate::types::AudioBuffer;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Maximum file size we'll attempt to decode (2GB)
/// Prevents OOM on extremely large files
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Decode an audio file to a mono AudioBuffer at its native sample rate
pub fn decode(path: &Path) -> Result<AudioBuffer> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| StemsimError::unreadable(path, format!("Failed to read file metadata: {}", e)))?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(StemsimError::unreadable(
            path,
            format!(
                "File too large ({:.1} GB). Maximum supported size is 2 GB.",
                metadata.len() as f64 / (1024.0 * 1024.0 * 1024.0)
            ),
        ));
    }

    let file = std::fs::File::open(path)
        .map_err(|e| StemsimError::unreadable(path, format!("Failed to open file: {}", e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Provide a hint based on file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| StemsimError::unreadable(path, format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    // Find the first audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| StemsimError::unreadable(path, "No audio tracks found"))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sample_rate = codec_params.sample_rate;

    debug!(
        "Decoding: {} @ {:?}Hz, {:?} channels",
        path.display(),
        sample_rate,
        codec_params.channels.map(|c| c.count())
    );

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| StemsimError::unreadable(path, format!("Failed to create decoder: {}", e)))?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break; // End of stream
            }
            Err(e) => {
                return Err(StemsimError::unreadable(
                    path,
                    format!("Failed to read packet: {}", e),
                ));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                trace!("Skipping corrupted frame: {}", e);
                continue;
            }
            Err(e) => {
                return Err(StemsimError::unreadable(path, format!("Decode error: {}", e)));
            }
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        sample_rate.get_or_insert(spec.rate);

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        all_samples.extend(to_mono(sample_buf.samples(), channels));
    }

    let sample_rate = sample_rate
        .filter(|&rate| rate > 0)
        .ok_or_else(|| StemsimError::unreadable(path, "Unknown sample rate"))?;

    if all_samples.is_empty() {
        return Err(StemsimError::unreadable(path, "No audio samples decoded"));
    }

    let buffer = AudioBuffer::new(all_samples, sample_rate);
    debug!(
        "Decoded {} samples ({:.2}s @ {}Hz)",
        buffer.len(),
        buffer.duration,
        buffer.sample_rate
    );

    Ok(buffer)
}

/// Convert interleaved multi-channel audio to mono by averaging channels
fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mono_stereo() {
        let stereo = vec![0.5, 0.3, 0.8, 0.2, 1.0, 0.0];
        let mono = to_mono(&stereo, 2);
        assert_eq!(mono.len(), 3);
        assert!((mono[0] - 0.4).abs() < 0.001);
        assert!((mono[1] - 0.5).abs() < 0.001);
        assert!((mono[2] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_to_mono_already_mono() {
        let mono = vec![0.5, 0.8, 1.0];
        assert_eq!(to_mono(&mono, 1), mono);
    }

    #[test]
    fn test_decode_missing_file_is_unreadable() {
        let err = decode(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, StemsimError::UnreadableAudio { .. }));
    }

    #[test]
    fn test_decode_garbage_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocals.wav");
        std::fs::write(&path, b"this is not a wav file").unwrap();
        let err = decode(&path).unwrap_err();
        assert!(matches!(err, StemsimError::UnreadableAudio { .. }));
    }
}
