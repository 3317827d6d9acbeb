//! Minimal WAV container handling for the fixed capture format.
//!
//! The recorder produces raw 16-bit little-endian mono PCM at 16 kHz;
//! [`encode_wav`] wraps it in a 44-byte RIFF header so the transcription
//! gateway receives a self-describing buffer.  [`wav_sample_rate`] reads the
//! header back so the gateway can reject anything that is not 16 kHz.

/// Fixed capture sample rate in Hz.
pub const SAMPLE_RATE: u32 = 16_000;
/// Mono capture.
pub const CHANNELS: u16 = 1;
/// 16-bit signed little-endian samples.
pub const BITS_PER_SAMPLE: u16 = 16;

const PCM_FORMAT: u16 = 1;

/// Wrap raw PCM bytes in a standard 44-byte RIFF/WAVE header.
///
/// Returns an empty buffer when `pcm` is empty — an empty recording has no
/// meaningful WAV representation and downstream code treats it as "no audio".
pub fn encode_wav(pcm: &[u8]) -> Vec<u8> {
    if pcm.is_empty() {
        return Vec::new();
    }

    let data_size = pcm.len() as u32;
    let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);
    let byte_rate = SAMPLE_RATE * block_align as u32;

    let mut out = Vec::with_capacity(44 + pcm.len());

    // RIFF chunk
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_size).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt subchunk
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&PCM_FORMAT.to_le_bytes());
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data subchunk
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(pcm);

    out
}

/// Read the sample rate field out of a WAV header.
///
/// Returns `None` when the buffer is too short or the RIFF/WAVE magic does
/// not match.  Only the canonical 44-byte layout produced by [`encode_wav`]
/// (fmt chunk directly after the RIFF header) is recognised, which is all the
/// gateway needs for its 16 kHz check.
pub fn wav_sample_rate(wav: &[u8]) -> Option<u32> {
    if wav.len() < 44 || &wav[0..4] != b"RIFF" || &wav[8..12] != b"WAVE" || &wav[12..16] != b"fmt "
    {
        return None;
    }
    Some(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
