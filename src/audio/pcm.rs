//! Sample format conversion between normalized floats and 16-bit PCM.

/// Full-scale value used when scaling normalized samples.
pub const I16_FULL_SCALE: f32 = i16::MAX as f32;

/// Convert a normalized sample to signed 16-bit PCM.
///
/// Values outside [-1.0, 1.0] are clamped first so loud input saturates
/// instead of wrapping around. The scaled value is truncated toward zero.
pub fn sample_to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * I16_FULL_SCALE) as i16
}

/// Convert a 16-bit PCM sample back to a normalized float.
pub fn i16_to_sample(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Rescale a signed integer sample of `bits` width to 16 bits.
pub fn int_to_i16(sample: i32, bits: u16) -> i16 {
    match bits {
        0..=16 => (sample << (16 - bits)) as i16,
        _ => (sample >> (bits - 16)) as i16,
    }
}
