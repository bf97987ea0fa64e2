//! BER/DER length and TLV helpers for Global Platform payloads.


/// Encode an ASN.1 BER primitive value length in its shortest definite form.
pub fn encode_primitive_length(output: &mut Vec<u8>, length: usize) {
    if length < 128 {
        // single-byte encoding
        output.push(length as u8);
    } else {
        // 0b1nnn_nnnn and then n additional bytes that actually specify the length
        // (big-endian)
        let length_bytes = length.to_be_bytes();
        let leading_zeroes = length_bytes.iter().take_while(|b| **b == 0x00).count();
        let trimmed_length_slice = &length_bytes[leading_zeroes..];
        output.push(0b1000_0000 | trimmed_length_slice.len() as u8);
        output.extend(trimmed_length_slice);
    }
}


/// Decode an ASN.1 BER primitive value length.
///
/// The length must be at the beginning of the input slice.
///
/// Returns a tuple `(length, rest)` where `rest` is the rest of the input slice once the length has
/// been removed.
pub fn try_decode_primitive_length(input: &[u8]) -> Option<(usize, &[u8])> {
    let (&start_byte, rest) = input.split_first()?;
    let start_lower_bits = start_byte & 0b0111_1111;
    if start_byte & 0b1000_0000 != 0 {
        // multiple bytes
        let length_byte_count: usize = start_lower_bits.into();
        if length_byte_count == 0 || length_byte_count > rest.len() {
            return None;
        }
        let mut length: usize = 0;
        for length_byte in &rest[..length_byte_count] {
            length = length.checked_mul(256)?.checked_add(usize::from(*length_byte))?;
        }
        Some((length, &rest[length_byte_count..]))
    } else {
        Some((start_lower_bits.into(), rest))
    }
}


/// Appends a length-prefixed value with a single length byte, as used by the INSTALL commands.
///
/// Values longer than 255 bytes cannot be represented and yield `None`.
pub fn push_lv(output: &mut Vec<u8>, value: &[u8]) -> Option<()> {
    let length = u8::try_from(value.len()).ok()?;
    output.push(length);
    output.extend_from_slice(value);
    Some(())
}


/// Appends a primitive TLV with a BER-encoded length.
pub fn push_tlv(output: &mut Vec<u8>, tag: u8, value: &[u8]) {
    output.push(tag);
    encode_primitive_length(output, value.len());
    output.extend_from_slice(value);
}
