//! PCM and WAV conversion helpers plus fixed-size frame chunking.
//!
//! Everything inside the bridge carries audio as 16-bit little-endian mono PCM
//! at [`DEVICE_SAMPLE_RATE`]. WAV framing only exists at the HTTP provider
//! boundary and on disk, so the helpers here are the single place where the
//! container is added or stripped.

use bytes::Bytes;
use thiserror::Error;

/// Sample rate the devices capture and play back at.
pub const DEVICE_SAMPLE_RATE: u32 = 16_000;

/// Devices are mono.
pub const DEVICE_CHANNELS: u16 = 1;

/// Bit depth of the canonical PCM form.
pub const DEVICE_BIT_DEPTH: u16 = 16;

/// Duration of one device playback frame.
pub const FRAME_DURATION_MS: u64 = 60;

/// Samples in one frame at the device sample rate.
pub const FRAME_SAMPLES: usize = (DEVICE_SAMPLE_RATE as usize * FRAME_DURATION_MS as usize) / 1000;

/// Bytes in one frame of 16-bit mono PCM (960 samples).
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

const WAV_HEADER_LEN: usize = 44;

/// Errors raised while unwrapping a WAV container.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("Input is not a RIFF/WAVE container")]
    NotWav,

    #[error("Malformed WAV container: {0}")]
    Malformed(String),

    #[error("Unsupported WAV encoding: {0}")]
    Unsupported(String),
}

pub type AudioResult<T> = Result<T, AudioError>;

/// Audio extracted from a WAV container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavAudio {
    pub pcm: Bytes,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// Returns true when the buffer starts with the `RIFF....WAVE` magic.
pub fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Walks the RIFF chunks and returns the `data` payload with its format.
///
/// A `data` chunk that declares more bytes than the buffer holds yields the
/// remaining bytes; streamed WAV responses commonly carry a placeholder size.
pub fn parse_wav(bytes: &[u8]) -> AudioResult<WavAudio> {
    if !is_wav(bytes) {
        return Err(AudioError::NotWav);
    }

    let mut format: Option<(u16, u32, u16)> = None;
    let mut offset = 12;

    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let declared = u32::from_le_bytes([
            bytes[offset + 4],
            bytes[offset + 5],
            bytes[offset + 6],
            bytes[offset + 7],
        ]) as usize;
        let body_start = offset + 8;

        match id {
            b"fmt " => {
                if declared < 16 || body_start + 16 > bytes.len() {
                    return Err(AudioError::Malformed("fmt chunk too short".to_string()));
                }
                let body = &bytes[body_start..body_start + 16];
                let audio_format = u16::from_le_bytes([body[0], body[1]]);
                // 1 = integer PCM, 0xFFFE = WAVE_FORMAT_EXTENSIBLE
                if audio_format != 1 && audio_format != 0xFFFE {
                    return Err(AudioError::Unsupported(format!(
                        "audio format tag {audio_format}"
                    )));
                }
                let channels = u16::from_le_bytes([body[2], body[3]]);
                let sample_rate = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
                let bits = u16::from_le_bytes([body[14], body[15]]);
                frame_layout(sample_rate, channels, bits)?;
                format = Some((channels, sample_rate, bits));
            }
            b"data" => {
                let (channels, sample_rate, bits_per_sample) = format
                    .ok_or_else(|| AudioError::Malformed("data chunk before fmt".to_string()))?;
                let end = body_start.saturating_add(declared).min(bytes.len());
                return Ok(WavAudio {
                    pcm: Bytes::copy_from_slice(&bytes[body_start..end]),
                    sample_rate,
                    channels,
                    bits_per_sample,
                });
            }
            _ => {}
        }

        // Chunks are padded to an even length.
        let padded = declared + (declared & 1);
        offset = match body_start.checked_add(padded) {
            Some(next) => next,
            None => break,
        };
    }

    Err(AudioError::Malformed("missing data chunk".to_string()))
}

/// Strips the WAV container and returns the raw samples.
pub fn wav_to_pcm(bytes: &[u8]) -> AudioResult<Bytes> {
    parse_wav(bytes).map(|wav| wav.pcm)
}

/// Block alignment and byte rate for a PCM layout.
///
/// Rejects layouts whose header fields would not fit their on-disk widths.
fn frame_layout(sample_rate: u32, channels: u16, bit_depth: u16) -> AudioResult<(u16, u32)> {
    if channels == 0 {
        return Err(AudioError::Unsupported("zero channels".to_string()));
    }
    if !matches!(bit_depth, 8 | 16 | 24 | 32) {
        return Err(AudioError::Unsupported(format!("{bit_depth}-bit samples")));
    }
    let block_align = channels
        .checked_mul(bit_depth / 8)
        .ok_or_else(|| AudioError::Unsupported(format!("{channels} channels")))?;
    let byte_rate = sample_rate
        .checked_mul(u32::from(block_align))
        .ok_or_else(|| AudioError::Unsupported(format!("sample rate {sample_rate}")))?;
    Ok((block_align, byte_rate))
}

/// Builds the canonical 44-byte PCM WAV header.
pub fn wav_header(
    data_len: u32,
    sample_rate: u32,
    channels: u16,
    bit_depth: u16,
) -> AudioResult<[u8; WAV_HEADER_LEN]> {
    let (block_align, byte_rate) = frame_layout(sample_rate, channels, bit_depth)?;
    let riff_len = data_len
        .checked_add(36)
        .ok_or_else(|| AudioError::Unsupported(format!("{data_len} data bytes")))?;

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_len.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    Ok(header)
}

/// Wraps raw samples in a WAV container.
pub fn pcm_to_wav(
    pcm: &[u8],
    sample_rate: u32,
    channels: u16,
    bit_depth: u16,
) -> AudioResult<Vec<u8>> {
    let data_len = u32::try_from(pcm.len())
        .map_err(|_| AudioError::Unsupported(format!("{} data bytes", pcm.len())))?;
    let header = wav_header(data_len, sample_rate, channels, bit_depth)?;
    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    wav.extend_from_slice(&header);
    wav.extend_from_slice(pcm);
    Ok(wav)
}

/// Passes WAV input through untouched and wraps anything else as 16-bit PCM.
pub fn ensure_wav(bytes: &[u8], sample_rate: u32, channels: u16) -> AudioResult<Vec<u8>> {
    if is_wav(bytes) {
        Ok(bytes.to_vec())
    } else {
        pcm_to_wav(bytes, sample_rate, channels, DEVICE_BIT_DEPTH)
    }
}

/// Splits `bytes` into `frame_size` slices; the last one may be shorter.
///
/// The slices share the input allocation. A zero `frame_size` returns the
/// whole input as one chunk.
pub fn chunk(bytes: &Bytes, frame_size: usize) -> Vec<Bytes> {
    if bytes.is_empty() {
        return Vec::new();
    }
    if frame_size == 0 {
        return vec![bytes.clone()];
    }

    let mut chunks = Vec::with_capacity(bytes.len().div_ceil(frame_size));
    let mut start = 0;
    while start < bytes.len() {
        let end = (start + frame_size).min(bytes.len());
        chunks.push(bytes.slice(start..end));
        start = end;
    }
    chunks
}
