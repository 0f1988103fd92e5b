//! File and byte-buffer decoding into [`AudioSignal`].
//!
//! WAV goes through `hound` (cheap, exact integer scaling). Everything else,
//! and any RIFF file `hound` refuses, goes through `symphonia`'s probe.

use std::io::{Cursor, Read};
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::AudioSignal;
use crate::error::{GenreError, Result};

/// Decode an audio file from disk.
///
/// The file extension, if any, is passed to the format probe as a hint.
pub fn decode_file(path: &Path) -> Result<AudioSignal> {
    let data = std::fs::read(path)?;
    let extension = path.extension().and_then(|e| e.to_str());
    decode_bytes(&data, extension)
}

/// Decode an in-memory audio file.
///
/// # Errors
/// - `GenreError::Decode` for unrecognised or corrupt data.
/// - `GenreError::EmptyAudio` when the stream decodes to zero samples.
pub fn decode_bytes(data: &[u8], extension: Option<&str>) -> Result<AudioSignal> {
    if data.is_empty() {
        return Err(GenreError::EmptyAudio);
    }

    let signal = if is_riff_wave(data) {
        match decode_wav(Cursor::new(data)) {
            Ok(signal) => signal,
            Err(e) => {
                debug!(error = %e, "hound rejected RIFF/WAVE data; retrying with symphonia");
                decode_symphonia(data, extension)?
            }
        }
    } else {
        decode_symphonia(data, extension)?
    };

    if signal.is_empty() {
        return Err(GenreError::EmptyAudio);
    }
    debug!(
        samples = signal.len(),
        sample_rate = signal.sample_rate(),
        duration_secs = signal.duration_secs(),
        "decoded audio"
    );
    Ok(signal)
}

fn is_riff_wave(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE"
}

fn decode_wav<R: Read>(source: R) -> Result<AudioSignal> {
    let reader = hound::WavReader::new(source)
        .map_err(|e| GenreError::Decode(format!("failed to parse WAV header: {e}")))?;

    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| GenreError::Decode(format!("failed to read float samples: {e}")))?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| GenreError::Decode(format!("failed to read int samples: {e}")))?
        }
    };

    AudioSignal::from_interleaved(&interleaved, spec.channels as usize, spec.sample_rate)
}

fn decode_symphonia(data: &[u8], extension: Option<&str>) -> Result<AudioSignal> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| GenreError::Decode(format!("unrecognised audio format: {e}")))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| GenreError::Decode("no audio track found".into()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| GenreError::Decode(format!("unsupported codec: {e}")))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(GenreError::Decode(format!("failed to read packet: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                skipped_packets += 1;
                debug!(error = %e, "skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(GenreError::Decode(format!("failed to decode packet: {e}"))),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count();

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(sample_buf.samples());
    }

    if skipped_packets > 0 {
        warn!(skipped_packets, "some packets could not be decoded");
    }
    if interleaved.is_empty() {
        return if skipped_packets > 0 {
            Err(GenreError::Decode("no decodable packets in stream".into()))
        } else {
            Err(GenreError::EmptyAudio)
        };
    }

    AudioSignal::from_interleaved(&interleaved, channels, sample_rate)
}
