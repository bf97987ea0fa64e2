//! Cryptographic primitives of the secure channel.
//!
//! All ciphering is triple DES in EDE mode with an 8-byte block. Long-term keys are double length
//! (16 bytes) and are extended to triple length by repeating the first sub-key (`K3 = K1`).


pub mod kdf;


use std::fmt;

use block_padding::{Iso7816, NoPadding, RawPadding};
use cbc::{Decryptor as CbcDec, Encryptor as CbcEnc};
use cipher::{BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use cipher::generic_array::GenericArray;
use des::TdesEde3;
use zeroize::Zeroizing;

use crate::buffer::ByteBuffer;


pub const BLOCK_SIZE: usize = 8;

/// An all-zero IV/ICV.
pub const ZERO_BLOCK: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Error {
    InvalidKeyLength { obtained: usize },
    InvalidBlockLength { obtained: usize },
    InvalidPadding,
    LengthPrefixMismatch { declared: usize, obtained: usize },
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyLength { obtained }
                => write!(f, "key has length {}, expected 16 or 24", obtained),
            Self::InvalidBlockLength { obtained }
                => write!(f, "data has length {}, expected a multiple of {}", obtained, BLOCK_SIZE),
            Self::InvalidPadding
                => write!(f, "data has invalid padding"),
            Self::LengthPrefixMismatch { declared, obtained }
                => write!(f, "length prefix declares {} bytes, obtained {}", declared, obtained),
        }
    }
}
impl std::error::Error for Error {
}


/// Extends a 16-byte key to 24 bytes by appending its first 8 bytes. 24-byte keys are returned
/// unchanged.
pub fn extend_key(key: &[u8]) -> Result<Zeroizing<[u8; 24]>, Error> {
    let mut extended = Zeroizing::new([0u8; 24]);
    match key.len() {
        16 => {
            extended[0..16].copy_from_slice(key);
            extended[16..24].copy_from_slice(&key[0..8]);
        },
        24 => {
            extended.copy_from_slice(key);
        },
        other => return Err(Error::InvalidKeyLength { obtained: other }),
    }
    Ok(extended)
}


fn tdes(key: &[u8]) -> Result<TdesEde3, Error> {
    let extended = extend_key(key)?;
    TdesEde3::new_from_slice(&extended[..])
        .map_err(|_| Error::InvalidKeyLength { obtained: key.len() })
}


fn check_block_length(data: &[u8]) -> Result<(), Error> {
    if data.len() % BLOCK_SIZE != 0 {
        Err(Error::InvalidBlockLength { obtained: data.len() })
    } else {
        Ok(())
    }
}


/// Encrypts block-aligned data in place in ECB mode.
pub fn encrypt_ecb(key: &[u8], data: &mut [u8]) -> Result<(), Error> {
    check_block_length(data)?;
    let cipher = tdes(key)?;
    for block in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(())
}


/// Decrypts block-aligned data in place in ECB mode.
pub fn decrypt_ecb(key: &[u8], data: &mut [u8]) -> Result<(), Error> {
    check_block_length(data)?;
    let cipher = tdes(key)?;
    for block in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(())
}


/// Encrypts block-aligned data in place in CBC mode.
pub fn encrypt_cbc(key: &[u8], iv: &[u8; BLOCK_SIZE], data: &mut [u8]) -> Result<(), Error> {
    check_block_length(data)?;
    let extended = extend_key(key)?;
    let block_mode = CbcEnc::<TdesEde3>::new_from_slices(&extended[..], iv)
        .map_err(|_| Error::InvalidKeyLength { obtained: key.len() })?;
    let len = data.len();
    block_mode.encrypt_padded_mut::<NoPadding>(data, len)
        .map_err(|_| Error::InvalidBlockLength { obtained: len })?;
    Ok(())
}


/// Decrypts block-aligned data in place in CBC mode.
pub fn decrypt_cbc(key: &[u8], iv: &[u8; BLOCK_SIZE], data: &mut [u8]) -> Result<(), Error> {
    check_block_length(data)?;
    let extended = extend_key(key)?;
    let block_mode = CbcDec::<TdesEde3>::new_from_slices(&extended[..], iv)
        .map_err(|_| Error::InvalidKeyLength { obtained: key.len() })?;
    let len = data.len();
    block_mode.decrypt_padded_mut::<NoPadding>(data)
        .map_err(|_| Error::InvalidBlockLength { obtained: len })?;
    Ok(())
}


/// Pads data according to ISO/IEC 7816-4 (ISO/IEC 9797-1 method 2).
///
/// A `0x80` byte is always appended, followed by as many `0x00` bytes as needed to reach a multiple
/// of the block size. Aligned input therefore gains a whole block.
pub fn pad_iso7816(data: &[u8]) -> ByteBuffer {
    let padded_len = (data.len() / BLOCK_SIZE + 1) * BLOCK_SIZE;
    let mut padded = ByteBuffer::with_capacity(padded_len);
    padded += data;
    padded.resize(padded_len);
    let last_block_start = padded_len - BLOCK_SIZE;
    Iso7816::raw_pad(&mut padded[last_block_start..], data.len() - last_block_start);
    padded
}


/// Pads data to the next block boundary with `0x80` and zeroes; aligned input is left as it is.
pub fn pad_to_block_boundary(data: &[u8]) -> ByteBuffer {
    if data.len() % BLOCK_SIZE == 0 {
        return ByteBuffer::from(data);
    }
    pad_iso7816(data)
}


/// Strips ISO/IEC 7816-4 padding from the final block.
pub fn unpad_iso7816(data: &[u8]) -> Result<&[u8], Error> {
    if data.is_empty() {
        return Err(Error::InvalidPadding);
    }
    check_block_length(data)?;
    let last_block_start = data.len() - BLOCK_SIZE;
    let kept = Iso7816::raw_unpad(&data[last_block_start..])
        .map_err(|_| Error::InvalidPadding)?
        .len();
    Ok(&data[..last_block_start + kept])
}


/// Full triple-DES CBC-MAC over ISO/IEC 7816-4 padded data, chained from `icv`.
///
/// Every block is XORed into the running value, which is then encrypted under the whole key. The
/// last running value is the MAC.
pub fn cbc_mac(key: &[u8], icv: &[u8; BLOCK_SIZE], data: &[u8]) -> Result<[u8; BLOCK_SIZE], Error> {
    let cipher = tdes(key)?;
    let padded = pad_iso7816(data);
    let mut state = *icv;
    for block in padded.chunks_exact(BLOCK_SIZE) {
        for (s, b) in state.iter_mut().zip(block) {
            *s ^= *b;
        }
        cipher.encrypt_block((&mut state).into());
    }
    Ok(state)
}


/// The key check value: the first three bytes of eight zero bytes encrypted under the key.
pub fn key_check_value(key: &[u8]) -> Result<[u8; 3], Error> {
    let mut block = ZERO_BLOCK;
    encrypt_ecb(key, &mut block)?;
    Ok([block[0], block[1], block[2]])
}
