//! Payload records returned by the card.
//!
//! All parsing goes through [`Reader`], a bounds-checked cursor, so truncated replies surface as
//! [`ParseError`] instead of reading past the end of the buffer.


use std::fmt;

use crate::der_util;
use crate::keys::KeyInfo;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ParseError {
    TooShort { needed: usize, obtained: usize },
    UnexpectedLength { expected: usize, obtained: usize },
    UnexpectedTag { expected: u16, obtained: u16 },
}
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { needed, obtained }
                => write!(f, "payload too short: needed {} bytes, obtained {}", needed, obtained),
            Self::UnexpectedLength { expected, obtained }
                => write!(f, "payload has length {}, expected {}", obtained, expected),
            Self::UnexpectedTag { expected, obtained }
                => write!(f, "payload has tag 0x{:04X}, expected 0x{:04X}", obtained, expected),
        }
    }
}
impl std::error::Error for ParseError {
}


/// A forward-only cursor over a response payload.
#[derive(Clone, Debug)]
pub struct Reader<'d> {
    data: &'d [u8],
    position: usize,
}
impl<'d> Reader<'d> {
    pub fn new(data: &'d [u8]) -> Self {
        Self {
            data,
            position: 0,
        }
    }

    /// Fails unless the payload is exactly `expected` bytes long.
    pub fn exact(data: &'d [u8], expected: usize) -> Result<Self, ParseError> {
        if data.len() != expected {
            return Err(ParseError::UnexpectedLength { expected, obtained: data.len() });
        }
        Ok(Self::new(data))
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn take(&mut self, count: usize) -> Result<&'d [u8], ParseError> {
        let end = self.position.checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or(ParseError::TooShort { needed: self.position.saturating_add(count), obtained: self.data.len() })?;
        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let mut ret = [0u8; N];
        ret.copy_from_slice(self.take(N)?);
        Ok(ret)
    }

    pub fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16_be(&mut self) -> Result<u16, ParseError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn u32_be(&mut self) -> Result<u32, ParseError> {
        Ok(u32::from_be_bytes(self.array()?))
    }
}


/// Reply to INITIALIZE UPDATE.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct InitializeUpdateResponse {
    pub diversification_data: [u8; 10],
    pub key_info: KeyInfo,
    pub card_challenge: [u8; 8],
    pub card_cryptogram: [u8; 8],
}
impl InitializeUpdateResponse {
    pub const LENGTH: usize = 28;

    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::exact(data, Self::LENGTH)?;
        let diversification_data = reader.array()?;
        let version = reader.u8()?;
        let index = reader.u8()?;
        let card_challenge = reader.array()?;
        let card_cryptogram = reader.array()?;
        Ok(Self {
            diversification_data,
            key_info: KeyInfo::new(version, index),
            card_challenge,
            card_cryptogram,
        })
    }
}


/// Reply to GET STATUS.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct AppletStatus {
    pub protocol_major: u8,
    pub protocol_minor: u8,
    pub applet_major: u8,
    pub applet_minor: u8,
    pub total_object_memory: u32,
    pub free_object_memory: u32,
    pub pins_in_use: u8,
    pub keys_in_use: u8,
    pub logged_in_identities: u16,
}
impl AppletStatus {
    pub const LENGTH: usize = 16;

    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::exact(data, Self::LENGTH)?;
        Ok(Self {
            protocol_major: reader.u8()?,
            protocol_minor: reader.u8()?,
            applet_major: reader.u8()?,
            applet_minor: reader.u8()?,
            total_object_memory: reader.u32_be()?,
            free_object_memory: reader.u32_be()?,
            pins_in_use: reader.u8()?,
            keys_in_use: reader.u8()?,
            logged_in_identities: reader.u16_be()?,
        })
    }
}


/// Reply to GET VERSION.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AppletVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u16,
}
impl AppletVersion {
    pub const LENGTH: usize = 4;

    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::exact(data, Self::LENGTH)?;
        Ok(Self {
            major: reader.u8()?,
            minor: reader.u8()?,
            build: reader.u16_be()?,
        })
    }
}
impl fmt::Display for AppletVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}


/// Reply to GENERATE KEY; the key blob itself stays in the card's output buffer.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GeneratedKey {
    pub key_length: u16,
}
impl GeneratedKey {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::new(data);
        Ok(Self {
            key_length: reader.u16_be()?,
        })
    }
}


/// Reply to LIST PINS: bit `n` is set if PIN `n` exists.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PinList {
    pub mask: u16,
}
impl PinList {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::exact(data, 2)?;
        Ok(Self {
            mask: reader.u16_be()?,
        })
    }

    pub fn contains(&self, pin_number: u8) -> bool {
        pin_number < 16 && self.mask & (1 << pin_number) != 0
    }

    pub fn pins(&self) -> impl Iterator<Item = u8> + '_ {
        (0..16).filter(move |pin| self.contains(*pin))
    }
}


/// One entry of LIST OBJECTS.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ObjectInfo {
    pub object_id: [u8; 4],
    pub size: u32,
    pub acl: [u8; 6],
}
impl ObjectInfo {
    pub const LENGTH: usize = 14;

    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::exact(data, Self::LENGTH)?;
        Ok(Self {
            object_id: reader.array()?,
            size: reader.u32_be()?,
            acl: reader.array()?,
        })
    }
}


/// The card production life cycle record returned by GET DATA (tag `9F 7F`).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TokenDescriptor {
    raw: [u8; Self::LENGTH],
}
impl TokenDescriptor {
    pub const LENGTH: usize = 0x2D;
    pub const TAG: u16 = 0x9F7F;

    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::exact(data, Self::LENGTH)?;
        let tag = reader.u16_be()?;
        if tag != Self::TAG {
            return Err(ParseError::UnexpectedTag { expected: Self::TAG, obtained: tag });
        }
        let body = &data[2..];
        let (length, value) = der_util::try_decode_primitive_length(body)
            .ok_or(ParseError::TooShort { needed: 3, obtained: data.len() })?;
        if length != value.len() {
            return Err(ParseError::UnexpectedLength { expected: length, obtained: value.len() });
        }
        let mut raw = [0u8; Self::LENGTH];
        raw.copy_from_slice(data);
        Ok(Self { raw })
    }

    pub fn as_bytes(&self) -> &[u8; Self::LENGTH] { &self.raw }

    /// Card unique identifier: fabricator and IC type, batch identifier, then serial number.
    pub fn cuid(&self) -> [u8; 10] {
        let mut cuid = [0u8; 10];
        cuid[0..4].copy_from_slice(&self.raw[3..7]);
        cuid[4..6].copy_from_slice(&self.raw[19..21]);
        cuid[6..10].copy_from_slice(&self.raw[15..19]);
        cuid
    }

    /// Manufacturer serial number.
    pub fn msn(&self) -> [u8; 4] {
        let mut msn = [0u8; 4];
        msn.copy_from_slice(&self.raw[41..45]);
        msn
    }
}


#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::{
        AppletStatus, AppletVersion, GeneratedKey, InitializeUpdateResponse, ObjectInfo, ParseError,
        PinList, Reader, TokenDescriptor,
    };

    #[test]
    fn test_reader_bounds() {
        let mut reader = Reader::new(&[1, 2, 3]);
        assert_eq!(reader.u16_be(), Ok(0x0102));
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.u16_be(), Err(ParseError::TooShort { needed: 4, obtained: 3 }));
        assert_eq!(reader.u8(), Ok(3));
        assert_eq!(reader.take(usize::MAX).err(), Some(ParseError::TooShort { needed: usize::MAX, obtained: 3 }));
    }

    #[test]
    fn test_initialize_update_response() {
        let data = hex!("00112233445566778899 0101 1122334455667788 0B6C51D99749F55F");
        let parsed = InitializeUpdateResponse::parse(&data).unwrap();
        assert_eq!(parsed.key_info.version, 0x01);
        assert_eq!(parsed.key_info.index, 0x01);
        assert_eq!(parsed.card_challenge, hex!("1122334455667788"));
        assert_eq!(parsed.card_cryptogram, hex!("0B6C51D99749F55F"));

        assert_eq!(
            InitializeUpdateResponse::parse(&data[..27]),
            Err(ParseError::UnexpectedLength { expected: 28, obtained: 27 }),
        );
    }

    #[test]
    fn test_status_and_version() {
        let status = AppletStatus::parse(&hex!("0101 0106 00008000 00004000 03 02 0001")).unwrap();
        assert_eq!(status.applet_minor, 0x06);
        assert_eq!(status.total_object_memory, 0x8000);
        assert_eq!(status.free_object_memory, 0x4000);
        assert_eq!(status.pins_in_use, 3);
        assert_eq!(status.logged_in_identities, 1);

        let version = AppletVersion::parse(&hex!("0106 0102")).unwrap();
        assert_eq!(version.to_string(), "1.6.258");
        assert!(AppletVersion::parse(&hex!("0106")).is_err());
    }

    #[test]
    fn test_generated_key_length() {
        assert_eq!(GeneratedKey::parse(&hex!("0104 AABB")).unwrap().key_length, 0x0104);
        assert!(GeneratedKey::parse(&hex!("01")).is_err());
    }

    #[test]
    fn test_pin_list() {
        let pins = PinList::parse(&hex!("0083")).unwrap();
        assert_eq!(pins.pins().collect::<Vec<u8>>(), vec![0, 1, 7]);
        assert!(!pins.contains(2));
        assert!(!pins.contains(200));
    }

    #[test]
    fn test_object_info() {
        let info = ObjectInfo::parse(&hex!("43300000 00000100 FFFF40004000")).unwrap();
        assert_eq!(&info.object_id, b"C0\x00\x00");
        assert_eq!(info.size, 256);
        assert_eq!(info.acl, hex!("FFFF40004000"));
    }

    #[test]
    fn test_token_descriptor() {
        let mut data = [0u8; TokenDescriptor::LENGTH];
        data[0..3].copy_from_slice(&hex!("9F7F2A"));
        data[3..7].copy_from_slice(&hex!("40906671"));
        data[15..19].copy_from_slice(&hex!("01020304"));
        data[19..21].copy_from_slice(&hex!("AABB"));
        data[41..45].copy_from_slice(&hex!("DEADBEEF"));

        let descriptor = TokenDescriptor::parse(&data).unwrap();
        assert_eq!(descriptor.cuid(), hex!("40906671 AABB 01020304"));
        assert_eq!(descriptor.msn(), hex!("DEADBEEF"));

        data[0] = 0x00;
        assert_eq!(
            TokenDescriptor::parse(&data),
            Err(ParseError::UnexpectedTag { expected: 0x9F7F, obtained: 0x007F }),
        );

        data[0] = 0x9F;
        data[2] = 0x2B;
        assert_eq!(
            TokenDescriptor::parse(&data),
            Err(ParseError::UnexpectedLength { expected: 0x2B, obtained: 0x2A }),
        );
    }
}
