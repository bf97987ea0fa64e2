//! Structures related to application protocol data units (APDUs).
//!
//! Command APDUs use the short single-length-byte form expected by the card applet:
//! ```plain
//! CLA INS P1 P2 Lc DATA [MAC]
//! ```
//! where `Lc = len(DATA) + len(MAC)` unless the command pins the length byte to a constant.


use std::fmt;
use std::io::{self, Write};

use crate::buffer::ByteBuffer;


/// Length of the MAC trailer appended by secure messaging.
pub const MAC_LENGTH: usize = 8;


#[derive(Debug)]
pub enum WriteError {
    Io(io::Error),
    DataTooLong { maximum: usize, obtained: usize },
    ParameterOutOfRange { parameter: &'static str, value: usize, maximum: usize },
}
impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::DataTooLong { maximum, obtained } => write!(f, "too much data: obtained {} bytes, expected maximum {} bytes", obtained, maximum),
            Self::ParameterOutOfRange { parameter, value, maximum } => write!(f, "{} is 0x{:02X}, expected maximum 0x{:02X}", parameter, value, maximum),
        }
    }
}
impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::DataTooLong { .. } => None,
            Self::ParameterOutOfRange { .. } => None,
        }
    }
}
impl From<io::Error> for WriteError {
    fn from(value: io::Error) -> Self { Self::Io(value) }
}


#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CommandHeader {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
}
impl CommandHeader {
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
        }
    }

    pub const fn to_bytes(&self) -> [u8; 4] {
        [self.cla, self.ins, self.p1, self.p2]
    }

    /// Reads the header and the length byte from the start of an encoded command APDU.
    pub fn parse_encoded(encoded: &[u8]) -> Option<(Self, u8)> {
        match encoded {
            [cla, ins, p1, p2, lc, ..] => Some((Self::new(*cla, *ins, *p1, *p2), *lc)),
            _ => None,
        }
    }

    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<(), WriteError> {
        let bytes = self.to_bytes();
        writer.write_all(&bytes)?;
        Ok(())
    }
}
impl fmt::Debug for CommandHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CommandHeader {} cla: 0x{:02X}, ins: 0x{:02X}, p1: 0x{:02X}, p2: 0x{:02X} {}",
            '{', self.cla, self.ins, self.p1, self.p2, '}',
        )
    }
}


/// How the length byte at offset 4 is produced.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum LengthField {
    /// `len(DATA) + len(MAC)`.
    #[default]
    Computed,

    /// A constant dictated by the card firmware. Such commands are never MACed.
    Fixed(u8),
}


#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Apdu {
    pub header: CommandHeader,
    pub data: ByteBuffer,
    pub mac: Option<[u8; MAC_LENGTH]>,
    pub length: LengthField,
}
impl Apdu {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            header: CommandHeader::new(cla, ins, p1, p2),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: impl Into<ByteBuffer>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_fixed_length(mut self, length: u8) -> Self {
        self.length = LengthField::Fixed(length);
        self
    }

    pub fn is_fixed_length(&self) -> bool {
        matches!(self.length, LengthField::Fixed(_))
    }

    fn mac_len(&self) -> usize {
        if self.mac.is_some() { MAC_LENGTH } else { 0 }
    }

    /// The value of the length byte as it will appear on the wire.
    pub fn length_byte(&self) -> Result<u8, WriteError> {
        match self.length {
            LengthField::Fixed(length) => Ok(length),
            LengthField::Computed => {
                let total = self.data.len() + self.mac_len();
                u8::try_from(total)
                    .map_err(|_| WriteError::DataTooLong { maximum: 255, obtained: total })
            },
        }
    }

    /// Number of bytes produced by [`Apdu::encode`].
    pub fn encoded_len(&self) -> usize {
        match self.length {
            LengthField::Fixed(_) => 5 + self.data.len(),
            LengthField::Computed => 5 + self.data.len() + self.mac_len(),
        }
    }

    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<(), WriteError> {
        let length_byte = self.length_byte()?;
        self.header.write_bytes(writer)?;
        writer.write_all(&[length_byte])?;
        writer.write_all(&self.data)?;
        if let (LengthField::Computed, Some(mac)) = (self.length, &self.mac) {
            writer.write_all(mac)?;
        }
        Ok(())
    }

    /// The final wire encoding.
    pub fn encode(&self) -> Result<ByteBuffer, WriteError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write_bytes(&mut out)?;
        Ok(ByteBuffer::from(out))
    }

    /// The representation covered by the MAC: `CLA INS P1 P2 Lc' DATA`, where `Lc'` already
    /// accounts for the MAC that will be appended.
    pub fn data_to_mac(&self) -> Result<ByteBuffer, WriteError> {
        let total = self.data.len() + MAC_LENGTH;
        let lc = u8::try_from(total)
            .map_err(|_| WriteError::DataTooLong { maximum: 255, obtained: total })?;
        let mut out = ByteBuffer::with_capacity(5 + self.data.len());
        out += &self.header.to_bytes()[..];
        out += lc;
        out += &self.data;
        Ok(out)
    }
}


#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ResponseTrailer {
    pub sw1: u8,
    pub sw2: u8,
}
impl ResponseTrailer {
    pub const SUCCESS: ResponseTrailer = ResponseTrailer::new(0x90, 0x00);

    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self {
            sw1,
            sw2,
        }
    }

    pub const fn to_bytes(&self) -> [u8; 2] {
        [self.sw1, self.sw2]
    }

    pub const fn to_word(&self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }

    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }
}
impl fmt::Debug for ResponseTrailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResponseTrailer {} sw1: 0x{:02X}, sw2: 0x{:02X} {}", '{', self.sw1, self.sw2, '}')
    }
}


/// A reply from the card: payload followed by the status word.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Response {
    pub data: ByteBuffer,
    pub trailer: ResponseTrailer,
    complete: bool,
}
impl Response {
    pub fn new(data: impl Into<ByteBuffer>, trailer: ResponseTrailer) -> Self {
        Self {
            data: data.into(),
            trailer,
            complete: true,
        }
    }

    /// Splits raw reply bytes into payload and status word.
    ///
    /// A reply shorter than two bytes has no payload and reports the status word `00 00`; use
    /// [`Response::is_complete`] to tell it apart from a genuine reply.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match bytes {
            [data @ .., sw1, sw2] => Self {
                data: ByteBuffer::from(data),
                trailer: ResponseTrailer::new(*sw1, *sw2),
                complete: true,
            },
            _ => Self {
                data: ByteBuffer::new(),
                trailer: ResponseTrailer::default(),
                complete: false,
            },
        }
    }

    pub fn sw1(&self) -> u8 { self.trailer.sw1 }
    pub fn sw2(&self) -> u8 { self.trailer.sw2 }

    /// The payload without the status word.
    pub fn data(&self) -> &[u8] { self.data.as_slice() }

    /// Whether the reply contained at least a status word.
    pub fn is_complete(&self) -> bool { self.complete }

    pub fn is_success(&self) -> bool {
        self.complete && self.trailer.is_success()
    }
}
