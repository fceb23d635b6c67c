//! G.711 mu-law companding and sample-rate conversion.
//!
//! Telephony audio arrives as 8 kHz mono mu-law bytes. The upstream session
//! speaks 16-bit little-endian PCM at 24 kHz, so audio crossing the bridge is
//! expanded/compressed here and resampled with linear interpolation.
//!
//! Decoding goes through a 256-entry table built on first use; encoding is a
//! handful of integer operations per sample.

use once_cell::sync::Lazy;
use tracing::warn;

/// Bias added to the magnitude before segment search.
pub const MULAW_BIAS: i32 = 0x84;

/// Largest magnitude representable before the bias is applied.
pub const MULAW_CLIP: i32 = 32635;

/// Sample rate of the telephony leg.
pub const TELEPHONY_SAMPLE_RATE: u32 = 8000;

static DECODE_TABLE: Lazy<[i16; 256]> = Lazy::new(|| {
    let mut table = [0i16; 256];
    for (byte, slot) in table.iter_mut().enumerate() {
        *slot = expand(byte as u8);
    }
    table
});

fn expand(byte: u8) -> i16 {
    let complement = !byte as i32;
    let sign = complement & 0x80;
    let exponent = (complement >> 4) & 0x07;
    let mantissa = complement & 0x0F;
    let magnitude = (((mantissa << 3) + MULAW_BIAS) << exponent) - MULAW_BIAS;

    if sign != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Segment (exponent) for a biased magnitude: the position of its highest set
/// bit between 0x80 and 0x4000.
#[inline]
fn segment(biased: i32) -> i32 {
    let mut exponent = 7;
    let mut mask = 0x4000;
    while exponent > 0 && biased & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }
    exponent
}

/// Compress one linear sample to a mu-law byte.
#[inline]
pub fn encode_sample(sample: i16) -> u8 {
    let sample = sample as i32;
    let sign = if sample < 0 { 0x80 } else { 0x00 };
    let biased = sample.abs().min(MULAW_CLIP) + MULAW_BIAS;
    let exponent = segment(biased);
    let mantissa = (biased >> (exponent + 3)) & 0x0F;

    !((sign | (exponent << 4) | mantissa) as u8)
}

/// Expand one mu-law byte to a linear sample.
#[inline]
pub fn decode_sample(byte: u8) -> i16 {
    DECODE_TABLE[byte as usize]
}

/// Expand a buffer of mu-law bytes into linear samples.
pub fn decode(mulaw: &[u8]) -> Vec<i16> {
    mulaw.iter().map(|&b| decode_sample(b)).collect()
}

/// Compress linear samples into mu-law bytes.
pub fn encode(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| encode_sample(s)).collect()
}

/// Expand mu-law bytes into 16-bit little-endian PCM bytes.
pub fn mulaw_to_pcm16_le(mulaw: &[u8]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(mulaw.len() * 2);
    for &byte in mulaw {
        pcm.extend_from_slice(&decode_sample(byte).to_le_bytes());
    }
    pcm
}

/// Compress 16-bit little-endian PCM bytes into mu-law.
///
/// A trailing odd byte is dropped.
pub fn pcm16_le_to_mulaw(pcm: &[u8]) -> Vec<u8> {
    if pcm.len() % 2 != 0 {
        warn!(len = pcm.len(), "PCM buffer has odd length, dropping trailing byte");
    }
    pcm.chunks_exact(2)
        .map(|pair| encode_sample(i16::from_le_bytes([pair[0], pair[1]])))
        .collect()
}

/// Reinterpret 16-bit little-endian PCM bytes as samples.
pub fn pcm16_le_samples(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Serialize samples as 16-bit little-endian PCM bytes.
pub fn samples_to_pcm16_le(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Linear-interpolation resampler.
///
/// Output length is `len * to / from`, rounded down. Equal rates return the
/// input unchanged.
pub fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let out_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let position = i as f64 * step;
            let index = position as usize;
            if index >= last {
                return samples[last];
            }
            let frac = position - index as f64;
            let a = samples[index] as f64;
            let b = samples[index + 1] as f64;
            (a + (b - a) * frac).round() as i16
        })
        .collect()
}

/// Resample 16-bit little-endian PCM bytes.
pub fn resample_pcm16_le(pcm: &[u8], from_rate: u32, to_rate: u32) -> Vec<u8> {
    if from_rate == to_rate {
        return pcm.to_vec();
    }
    samples_to_pcm16_le(&resample_linear(&pcm16_le_samples(pcm), from_rate, to_rate))
}
