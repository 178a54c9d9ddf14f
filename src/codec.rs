//! Conversion between IEEE-754 single precision floats and pairs of
//! big-endian Modbus register words.

/// Decodes the byte sequence `[hi(word0), lo(word0), hi(word1), lo(word1)]`
/// as a big-endian float32. Pure bit reinterpretation, no rounding.
#[must_use]
pub fn decode_f32(word0: u16, word1: u16) -> f32 {
    f32::from_bits((u32::from(word0) << 16) | u32::from(word1))
}

/// Inverse of [`decode_f32`].
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn encode_f32(value: f32) -> (u16, u16) {
    let bits = value.to_bits();
    ((bits >> 16) as u16, bits as u16)
}

/// Decodes the first two words of a register response, or `None` when the
/// response is too short to hold a float.
#[must_use]
pub fn decode_f32_words(words: &[u16]) -> Option<f32> {
    match words {
        [word0, word1, ..] => Some(decode_f32(*word0, *word1)),
        _ => None,
    }
}
