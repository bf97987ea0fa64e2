//! Long-term and session key material.
//!
//! Every key type here wipes itself when dropped and keeps its bytes out of `Debug` output.


use std::fmt;

use zeroize_derive::ZeroizeOnDrop;

use crate::buffer::ByteBuffer;
use crate::crypt;


/// Length of a long-term (double-length 3DES) key.
pub const STATIC_KEY_LENGTH: usize = 16;

/// Length of a session key after extension to triple length.
pub const SESSION_KEY_LENGTH: usize = 24;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum KeyRole {
    Auth,
    Mac,
    Kek,
}
impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => write!(f, "authentication key"),
            Self::Mac => write!(f, "MAC key"),
            Self::Kek => write!(f, "key encryption key"),
        }
    }
}


#[derive(Debug)]
pub enum KeyError {
    InvalidLength { expected: usize, obtained: usize },
    Unavailable { role: KeyRole },
}
impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength { expected, obtained }
                => write!(f, "key has length {}, expected {}", obtained, expected),
            Self::Unavailable { role }
                => write!(f, "{} is not available", role),
        }
    }
}
impl std::error::Error for KeyError {
}


/// Version and index of the key set used to open a channel, as reported by INITIALIZE UPDATE.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct KeyInfo {
    pub version: u8,
    pub index: u8,
}
impl KeyInfo {
    pub const fn new(version: u8, index: u8) -> Self {
        Self {
            version,
            index,
        }
    }
}


/// A long-term 16-byte 3DES key (K1 ‖ K2).
#[derive(Clone, Eq, PartialEq, ZeroizeOnDrop)]
pub struct StaticKey([u8; STATIC_KEY_LENGTH]);
impl StaticKey {
    pub const fn new(bytes: [u8; STATIC_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let array: [u8; STATIC_KEY_LENGTH] = bytes.try_into()
            .map_err(|_| KeyError::InvalidLength { expected: STATIC_KEY_LENGTH, obtained: bytes.len() })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; STATIC_KEY_LENGTH] { &self.0 }
}
impl fmt::Debug for StaticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StaticKey([redacted])")
    }
}


/// A derived 24-byte session key (K1 ‖ K2 ‖ K1).
#[derive(Clone, Eq, PartialEq, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LENGTH]);
impl SessionKey {
    /// Builds a session key from the 16 bytes produced by derivation, repeating K1 as K3.
    pub fn from_double_length(bytes: &[u8; STATIC_KEY_LENGTH]) -> Self {
        let mut key = [0u8; SESSION_KEY_LENGTH];
        key[0..16].copy_from_slice(bytes);
        key[16..24].copy_from_slice(&bytes[0..8]);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LENGTH] { &self.0 }
}
impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey([redacted])")
    }
}


/// Source of the card's long-term keys.
///
/// Each call hands out an owned copy; the channel drops it as soon as the session keys exist.
pub trait KeyProvider {
    fn auth_key(&self) -> Result<StaticKey, KeyError>;
    fn mac_key(&self) -> Result<StaticKey, KeyError>;
    fn kek_key(&self) -> Result<StaticKey, KeyError>;

    fn key(&self, role: KeyRole) -> Result<StaticKey, KeyError> {
        match role {
            KeyRole::Auth => self.auth_key(),
            KeyRole::Mac => self.mac_key(),
            KeyRole::Kek => self.kek_key(),
        }
    }
}


/// An in-memory Auth/MAC/KEK key set.
#[derive(Clone, Debug, Eq, PartialEq, ZeroizeOnDrop)]
pub struct StaticKeySet {
    auth: StaticKey,
    mac: StaticKey,
    kek: StaticKey,
}
impl StaticKeySet {
    pub fn new(auth: StaticKey, mac: StaticKey, kek: StaticKey) -> Self {
        Self {
            auth,
            mac,
            kek,
        }
    }

    /// A key set for cards personalised with the same value in all three roles.
    pub fn from_single_key(key: StaticKey) -> Self {
        Self {
            auth: key.clone(),
            mac: key.clone(),
            kek: key,
        }
    }

    pub fn auth(&self) -> &StaticKey { &self.auth }
    pub fn mac(&self) -> &StaticKey { &self.mac }
    pub fn kek(&self) -> &StaticKey { &self.kek }
}
impl KeyProvider for StaticKeySet {
    fn auth_key(&self) -> Result<StaticKey, KeyError> { Ok(self.auth.clone()) }
    fn mac_key(&self) -> Result<StaticKey, KeyError> { Ok(self.mac.clone()) }
    fn kek_key(&self) -> Result<StaticKey, KeyError> { Ok(self.kek.clone()) }
}


/// Builds the key-set data carried by PUT KEY.
///
/// ```plain
/// newVersion
/// 81 10 ECB(currentKek, newAuth) 03 KCV(newAuth)
/// 81 10 ECB(currentKek, newMac)  03 KCV(newMac)
/// 81 10 ECB(currentKek, newKek)  03 KCV(newKek)
/// ```
pub fn put_key_data(new_version: u8, new_keys: &StaticKeySet, current_kek: &StaticKey) -> Result<ByteBuffer, crypt::Error> {
    let mut data = ByteBuffer::with_capacity(1 + 3 * 22);
    data += new_version;
    for key in [&new_keys.auth, &new_keys.mac, &new_keys.kek] {
        let mut wrapped = ByteBuffer::from(&key.as_bytes()[..]);
        crypt::encrypt_ecb(current_kek.as_bytes(), &mut wrapped)?;
        let check_value = crypt::key_check_value(key.as_bytes())?;

        data += &[0x81, 0x10][..];
        data += &wrapped;
        data += 0x03;
        data += &check_value[..];
    }
    Ok(data)
}


#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::{put_key_data, KeyError, KeyProvider, KeyRole, SessionKey, StaticKey, StaticKeySet};

    #[test]
    fn test_from_slice_length() {
        assert!(StaticKey::from_slice(&[0u8; 16]).is_ok());
        match StaticKey::from_slice(&[0u8; 24]) {
            Err(KeyError::InvalidLength { expected: 16, obtained: 24 }) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_session_key_extension() {
        let key = SessionKey::from_double_length(&hex!("00112233445566778899AABBCCDDEEFF"));
        assert_eq!(key.as_bytes(), &hex!("00112233445566778899AABBCCDDEEFF0011223344556677"));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = StaticKey::new(hex!("404142434445464748494A4B4C4D4E4F"));
        let rendered = format!("{:?}", StaticKeySet::from_single_key(key));
        assert!(!rendered.contains("40"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn test_provider_roles() {
        let keys = StaticKeySet::new(
            StaticKey::new([1; 16]),
            StaticKey::new([2; 16]),
            StaticKey::new([3; 16]),
        );
        assert_eq!(keys.key(KeyRole::Auth).unwrap().as_bytes(), &[1; 16]);
        assert_eq!(keys.key(KeyRole::Mac).unwrap().as_bytes(), &[2; 16]);
        assert_eq!(keys.key(KeyRole::Kek).unwrap().as_bytes(), &[3; 16]);
    }

    #[test]
    fn test_put_key_data_layout() {
        let new_key = StaticKey::new(hex!("0102030405060708090A0B0C0D0E0F10"));
        let new_keys = StaticKeySet::from_single_key(new_key);
        let current_kek = StaticKey::new(hex!("606162636465666768696A6B6C6D6E6F"));

        let data = put_key_data(0x02, &new_keys, &current_kek).unwrap();
        assert_eq!(data.len(), 1 + 3 * 22);
        assert_eq!(data[0], 0x02);
        for i in 0..3 {
            let entry = &data[1 + 22 * i..1 + 22 * (i + 1)];
            assert_eq!(
                entry,
                &hex!("8110 A218A08E53ACA57EB9E47DCEF0F4465D 03 AD17A7"),
            );
        }
    }
}
