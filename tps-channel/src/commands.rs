//! The card instruction set.
//!
//! Each [`Command`] variant carries only its operation-specific parameters; [`Command::to_apdu`]
//! fixes CLA and INS, validates parameter ranges and lays out the data field.


use std::fmt;

use crate::buffer::ByteBuffer;
use crate::der_util;
use crate::iso7816::apdu::{Apdu, WriteError};
use crate::secure_messaging::SecurityLevel;


/// Largest chunk transferred by one object or buffer read/write.
pub const MAX_CHUNK_SIZE: usize = 0xD0;

/// Largest issuer information block.
pub const MAX_ISSUER_INFO_SIZE: usize = 0xE0;

/// Largest PIN number accepted by the applet.
pub const MAX_PIN_NUMBER: u8 = 0x07;

/// Largest key slot accepted by the applet.
pub const MAX_KEY_SLOT: u8 = 0x0F;

/// Status word reported by LIST OBJECTS once the sequence is exhausted.
pub const SW_SEQUENCE_END: u16 = 0x9C12;

/// Transport key expected by the Muscle applet when formatting.
pub const MUSCLE_TRANSPORT_KEY: [u8; 8] = *b"Muscle00";


const CLA_ISO: u8 = 0x00;
const CLA_GP: u8 = 0x80;
const CLA_SECURE: u8 = 0x84;
const CLA_APPLET: u8 = 0xB0;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Operation {
    Select,
    InitializeUpdate,
    ExternalAuthenticate,
    CreateObject,
    WriteObject,
    ReadObject,
    GenerateKey,
    PutKey,
    DeleteFile,
    InstallLoad,
    InstallApplet,
    LoadFile,
    SetPin,
    CreatePin,
    UnblockPin,
    ListPins,
    ListObjects,
    GetStatus,
    GetVersion,
    GetData,
    GetIssuerInfo,
    SetIssuerInfo,
    GetLifecycle,
    SetLifecycle,
    FormatMuscleApplet,
    ImportKey,
    ImportKeyEncrypted,
    ReadBuffer,
}
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Select => "SELECT",
            Self::InitializeUpdate => "INITIALIZE UPDATE",
            Self::ExternalAuthenticate => "EXTERNAL AUTHENTICATE",
            Self::CreateObject => "CREATE OBJECT",
            Self::WriteObject => "WRITE OBJECT",
            Self::ReadObject => "READ OBJECT",
            Self::GenerateKey => "GENERATE KEY",
            Self::PutKey => "PUT KEY",
            Self::DeleteFile => "DELETE",
            Self::InstallLoad => "INSTALL [for load]",
            Self::InstallApplet => "INSTALL [for install]",
            Self::LoadFile => "LOAD",
            Self::SetPin => "SET PIN",
            Self::CreatePin => "CREATE PIN",
            Self::UnblockPin => "UNBLOCK PIN",
            Self::ListPins => "LIST PINS",
            Self::ListObjects => "LIST OBJECTS",
            Self::GetStatus => "GET STATUS",
            Self::GetVersion => "GET VERSION",
            Self::GetData => "GET DATA",
            Self::GetIssuerInfo => "GET ISSUER INFO",
            Self::SetIssuerInfo => "SET ISSUER INFO",
            Self::GetLifecycle => "GET LIFECYCLE",
            Self::SetLifecycle => "SET LIFECYCLE",
            Self::FormatMuscleApplet => "FORMAT MUSCLE APPLET",
            Self::ImportKey => "IMPORT KEY",
            Self::ImportKeyEncrypted => "IMPORT KEY ENCRYPTED",
            Self::ReadBuffer => "READ BUFFER",
        };
        f.write_str(name)
    }
}


/// Where LIST OBJECTS continues from.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ObjectSequence {
    Reset = 0x00,
    Next = 0x01,
}


/// Which GENERATE KEY instruction to use.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum KeyFamily {
    Rsa,
    Ecc,
}


/// Parameters for GENERATE KEY.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct KeyGeneration {
    pub family: KeyFamily,
    pub private_key_slot: u8,
    pub public_key_slot: u8,
    pub algorithm: u8,
    pub key_size: u16,
    pub option: u8,
    pub key_type: u8,
    pub wrapped_challenge: ByteBuffer,
    pub key_check: ByteBuffer,
}


/// Parameters for FORMAT MUSCLE APPLET.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MuscleFormat {
    pub memory_size: u16,
    pub pin0: ByteBuffer,
    pub pin0_tries: u8,
    pub unblock_pin0: ByteBuffer,
    pub unblock0_tries: u8,
    pub pin1: ByteBuffer,
    pub pin1_tries: u8,
    pub unblock_pin1: ByteBuffer,
    pub unblock1_tries: u8,
    pub object_creation_acl: u8,
    pub key_creation_acl: u8,
    pub pin_creation_acl: u8,
}


#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Command {
    Select { aid: ByteBuffer },
    InitializeUpdate { key_version: u8, key_index: u8, host_challenge: [u8; 8] },
    ExternalAuthenticate { security_level: SecurityLevel, host_cryptogram: [u8; 8] },
    CreateObject { object_id: [u8; 4], size: u32, acl: [u8; 6] },
    WriteObject { object_id: [u8; 4], offset: u32, data: ByteBuffer },
    ReadObject { object_id: [u8; 4], offset: u32, length: u8 },
    GenerateKey(KeyGeneration),
    PutKey { current_key_version: u8, key_index: u8, key_data: ByteBuffer },
    DeleteFile { aid: ByteBuffer },
    InstallLoad { package_aid: ByteBuffer, security_domain_aid: ByteBuffer, file_length: u16 },
    InstallApplet {
        package_aid: ByteBuffer,
        applet_aid: ByteBuffer,
        privileges: u8,
        instance_size: u16,
        memory_size: u16,
    },
    LoadFile { last_block: bool, block_number: u8, block: ByteBuffer },
    SetPin { pin_number: u8, pin: ByteBuffer },
    CreatePin { pin_number: u8, max_retries: u8, pin: ByteBuffer },
    UnblockPin { pin_number: u8 },
    ListPins,
    ListObjects { sequence: ObjectSequence },
    GetStatus,
    GetVersion,
    GetData,
    GetIssuerInfo,
    SetIssuerInfo { issuer_info: ByteBuffer },
    GetLifecycle,
    SetLifecycle { state: u8 },
    FormatMuscleApplet(MuscleFormat),
    ImportKey { key_slot: u8, acl: [u8; 6] },
    ImportKeyEncrypted { private_key_slot: u8, public_key_slot: u8, wrapped_key: ByteBuffer, iv: ByteBuffer },
    ReadBuffer { length: u8, offset: u16 },
}
impl Command {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Select { .. } => Operation::Select,
            Self::InitializeUpdate { .. } => Operation::InitializeUpdate,
            Self::ExternalAuthenticate { .. } => Operation::ExternalAuthenticate,
            Self::CreateObject { .. } => Operation::CreateObject,
            Self::WriteObject { .. } => Operation::WriteObject,
            Self::ReadObject { .. } => Operation::ReadObject,
            Self::GenerateKey(_) => Operation::GenerateKey,
            Self::PutKey { .. } => Operation::PutKey,
            Self::DeleteFile { .. } => Operation::DeleteFile,
            Self::InstallLoad { .. } => Operation::InstallLoad,
            Self::InstallApplet { .. } => Operation::InstallApplet,
            Self::LoadFile { .. } => Operation::LoadFile,
            Self::SetPin { .. } => Operation::SetPin,
            Self::CreatePin { .. } => Operation::CreatePin,
            Self::UnblockPin { .. } => Operation::UnblockPin,
            Self::ListPins => Operation::ListPins,
            Self::ListObjects { .. } => Operation::ListObjects,
            Self::GetStatus => Operation::GetStatus,
            Self::GetVersion => Operation::GetVersion,
            Self::GetData => Operation::GetData,
            Self::GetIssuerInfo => Operation::GetIssuerInfo,
            Self::SetIssuerInfo { .. } => Operation::SetIssuerInfo,
            Self::GetLifecycle => Operation::GetLifecycle,
            Self::SetLifecycle { .. } => Operation::SetLifecycle,
            Self::FormatMuscleApplet(_) => Operation::FormatMuscleApplet,
            Self::ImportKey { .. } => Operation::ImportKey,
            Self::ImportKeyEncrypted { .. } => Operation::ImportKeyEncrypted,
            Self::ReadBuffer { .. } => Operation::ReadBuffer,
        }
    }

    /// Whether the data field holds PINs, keys or cryptograms and must stay out of logs.
    pub fn is_sensitive(&self) -> bool {
        matches!(
            self,
            Self::ExternalAuthenticate { .. }
            | Self::PutKey { .. }
            | Self::SetPin { .. }
            | Self::CreatePin { .. }
            | Self::FormatMuscleApplet(_)
            | Self::ImportKeyEncrypted { .. }
        )
    }

    /// Builds the unprotected APDU for this command.
    pub fn to_apdu(&self) -> Result<Apdu, WriteError> {
        let apdu = match self {
            Self::Select { aid } => {
                Apdu::new(CLA_ISO, 0xA4, 0x04, 0x00)
                    .with_data(aid.clone())
            },
            Self::InitializeUpdate { key_version, key_index, host_challenge } => {
                Apdu::new(CLA_GP, 0x50, *key_version, *key_index)
                    .with_data(*host_challenge)
            },
            Self::ExternalAuthenticate { security_level, host_cryptogram } => {
                Apdu::new(CLA_SECURE, 0x82, security_level.p1(), 0x00)
                    .with_data(*host_cryptogram)
            },
            Self::CreateObject { object_id, size, acl } => {
                let mut data = ByteBuffer::with_capacity(14);
                data += &object_id[..];
                data += &size.to_be_bytes()[..];
                data += &acl[..];
                Apdu::new(CLA_SECURE, 0x5A, 0x00, 0x00)
                    .with_data(data)
            },
            Self::WriteObject { object_id, offset, data: chunk } => {
                check_range("chunk length", chunk.len(), MAX_CHUNK_SIZE)?;
                let mut data = ByteBuffer::with_capacity(9 + chunk.len());
                data += &object_id[..];
                data += &offset.to_be_bytes()[..];
                data += chunk.len() as u8;
                data += chunk;
                Apdu::new(CLA_SECURE, 0x54, 0x00, 0x00)
                    .with_data(data)
            },
            Self::ReadObject { object_id, offset, length } => {
                check_range("chunk length", (*length).into(), MAX_CHUNK_SIZE)?;
                let mut data = ByteBuffer::with_capacity(9);
                data += &object_id[..];
                data += &offset.to_be_bytes()[..];
                data += *length;
                Apdu::new(CLA_SECURE, 0x56, 0x00, 0x00)
                    .with_data(data)
            },
            Self::GenerateKey(generation) => {
                check_range("private key slot", generation.private_key_slot.into(), MAX_KEY_SLOT.into())?;
                check_range("public key slot", generation.public_key_slot.into(), MAX_KEY_SLOT.into())?;
                let ins = match generation.family {
                    KeyFamily::Rsa => 0x0C,
                    KeyFamily::Ecc => 0x0D,
                };
                let mut data = ByteBuffer::new();
                data += generation.algorithm;
                data += &generation.key_size.to_be_bytes()[..];
                data += generation.option;
                data += generation.key_type;
                push_long_lv(&mut data, &generation.wrapped_challenge)?;
                push_long_lv(&mut data, &generation.key_check)?;
                Apdu::new(CLA_SECURE, ins, generation.private_key_slot, generation.public_key_slot)
                    .with_data(data)
            },
            Self::PutKey { current_key_version, key_index, key_data } => {
                Apdu::new(CLA_SECURE, 0xD8, *current_key_version, *key_index | 0x80)
                    .with_data(key_data.clone())
            },
            Self::DeleteFile { aid } => {
                let mut data = Vec::with_capacity(2 + aid.len());
                der_util::push_tlv(&mut data, 0x4F, aid);
                Apdu::new(CLA_SECURE, 0xE4, 0x00, 0x00)
                    .with_data(data)
            },
            Self::InstallLoad { package_aid, security_domain_aid, file_length } => {
                let mut data = Vec::new();
                push_lv(&mut data, package_aid)?;
                push_lv(&mut data, security_domain_aid)?;
                // no load file data block hash
                data.push(0x00);
                let mut params = vec![0xEF, 0x04, 0xC6, 0x02];
                params.extend_from_slice(&file_length.to_be_bytes());
                push_lv(&mut data, &params)?;
                // no load token
                data.push(0x00);
                Apdu::new(CLA_SECURE, 0xE6, 0x02, 0x00)
                    .with_data(data)
            },
            Self::InstallApplet { package_aid, applet_aid, privileges, instance_size, memory_size } => {
                let mut data = Vec::new();
                push_lv(&mut data, package_aid)?;
                push_lv(&mut data, applet_aid)?;
                // instance AID is the applet AID
                push_lv(&mut data, applet_aid)?;
                push_lv(&mut data, &[*privileges])?;
                let mut params = vec![0xC9, 0x00, 0xEF, 0x08, 0xC8, 0x02];
                params.extend_from_slice(&instance_size.to_be_bytes());
                params.extend_from_slice(&[0xC7, 0x02]);
                params.extend_from_slice(&memory_size.to_be_bytes());
                push_lv(&mut data, &params)?;
                // no install token
                data.push(0x00);
                Apdu::new(CLA_SECURE, 0xE6, 0x0C, 0x00)
                    .with_data(data)
            },
            Self::LoadFile { last_block, block_number, block } => {
                let p1 = if *last_block { 0x80 } else { 0x00 };
                Apdu::new(CLA_SECURE, 0xE8, p1, *block_number)
                    .with_data(block.clone())
            },
            Self::SetPin { pin_number, pin } => {
                check_range("PIN number", (*pin_number).into(), MAX_PIN_NUMBER.into())?;
                Apdu::new(CLA_SECURE, 0x04, *pin_number, 0x00)
                    .with_data(pin.clone())
            },
            Self::CreatePin { pin_number, max_retries, pin } => {
                check_range("PIN number", (*pin_number).into(), MAX_PIN_NUMBER.into())?;
                Apdu::new(CLA_SECURE, 0x40, *pin_number, *max_retries)
                    .with_data(pin.clone())
            },
            Self::UnblockPin { pin_number } => {
                check_range("PIN number", (*pin_number).into(), MAX_PIN_NUMBER.into())?;
                Apdu::new(CLA_SECURE, 0x02, *pin_number, 0x00)
            },
            Self::ListPins => {
                Apdu::new(CLA_APPLET, 0x48, 0x00, 0x00)
                    .with_fixed_length(0x02)
            },
            Self::ListObjects { sequence } => {
                Apdu::new(CLA_APPLET, 0x58, *sequence as u8, 0x00)
                    .with_fixed_length(0x0E)
            },
            Self::GetStatus => {
                Apdu::new(CLA_APPLET, 0x3C, 0x00, 0x00)
                    .with_fixed_length(0x10)
            },
            Self::GetVersion => {
                Apdu::new(CLA_APPLET, 0x70, 0x00, 0x00)
                    .with_fixed_length(0x04)
            },
            Self::GetData => {
                Apdu::new(CLA_GP, 0xCA, 0x9F, 0x7F)
                    .with_fixed_length(0x2D)
            },
            Self::GetIssuerInfo => {
                Apdu::new(CLA_SECURE, 0xF6, 0x00, 0x00)
            },
            Self::SetIssuerInfo { issuer_info } => {
                check_range("issuer info length", issuer_info.len(), MAX_ISSUER_INFO_SIZE)?;
                Apdu::new(CLA_SECURE, 0xF4, 0x00, 0x00)
                    .with_data(issuer_info.clone())
            },
            Self::GetLifecycle => {
                Apdu::new(CLA_APPLET, 0xF2, 0x00, 0x00)
                    .with_fixed_length(0x01)
            },
            Self::SetLifecycle { state } => {
                Apdu::new(CLA_SECURE, 0xF0, *state, 0x00)
            },
            Self::FormatMuscleApplet(format) => {
                let mut data = ByteBuffer::with_capacity(64);
                data += &MUSCLE_TRANSPORT_KEY[..];
                data += format.pin0_tries;
                data += format.unblock0_tries;
                push_secret_lv(&mut data, &format.pin0)?;
                push_secret_lv(&mut data, &format.unblock_pin0)?;
                data += format.pin1_tries;
                data += format.unblock1_tries;
                push_secret_lv(&mut data, &format.pin1)?;
                push_secret_lv(&mut data, &format.unblock_pin1)?;
                data += &[0x00, 0x00][..];
                data += &format.memory_size.to_be_bytes()[..];
                data += format.object_creation_acl;
                data += format.key_creation_acl;
                data += format.pin_creation_acl;
                Apdu::new(CLA_SECURE, 0x2A, 0x00, 0x00)
                    .with_data(data)
            },
            Self::ImportKey { key_slot, acl } => {
                check_range("key slot", (*key_slot).into(), MAX_KEY_SLOT.into())?;
                Apdu::new(CLA_SECURE, 0x32, *key_slot, 0x00)
                    .with_data(*acl)
            },
            Self::ImportKeyEncrypted { private_key_slot, public_key_slot, wrapped_key, iv } => {
                check_range("private key slot", (*private_key_slot).into(), MAX_KEY_SLOT.into())?;
                check_range("public key slot", (*public_key_slot).into(), MAX_KEY_SLOT.into())?;
                let mut data = ByteBuffer::new();
                push_long_lv(&mut data, wrapped_key)?;
                push_secret_lv(&mut data, iv)?;
                Apdu::new(CLA_SECURE, 0x0A, *private_key_slot, *public_key_slot)
                    .with_data(data)
            },
            Self::ReadBuffer { length, offset } => {
                check_range("chunk length", (*length).into(), MAX_CHUNK_SIZE)?;
                Apdu::new(CLA_SECURE, 0x08, *length, 0x00)
                    .with_data(offset.to_be_bytes())
            },
        };
        Ok(apdu)
    }
}


fn check_range(parameter: &'static str, value: usize, maximum: usize) -> Result<(), WriteError> {
    if value > maximum {
        Err(WriteError::ParameterOutOfRange { parameter, value, maximum })
    } else {
        Ok(())
    }
}


fn push_lv(output: &mut Vec<u8>, value: &[u8]) -> Result<(), WriteError> {
    der_util::push_lv(output, value)
        .ok_or(WriteError::DataTooLong { maximum: 255, obtained: value.len() })
}


/// Length byte and value, kept inside a wiping buffer.
fn push_secret_lv(output: &mut ByteBuffer, value: &[u8]) -> Result<(), WriteError> {
    let length = u8::try_from(value.len())
        .map_err(|_| WriteError::DataTooLong { maximum: 255, obtained: value.len() })?;
    *output += length;
    *output += value;
    Ok(())
}


/// Two-byte big-endian length and value.
fn push_long_lv(output: &mut ByteBuffer, value: &[u8]) -> Result<(), WriteError> {
    let length = u16::try_from(value.len())
        .map_err(|_| WriteError::DataTooLong { maximum: u16::MAX.into(), obtained: value.len() })?;
    *output += &length.to_be_bytes()[..];
    *output += value;
    Ok(())
}


#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::{Command, KeyFamily, KeyGeneration, MuscleFormat, ObjectSequence, Operation};
    use crate::buffer::ByteBuffer;
    use crate::iso7816::apdu::{LengthField, WriteError};
    use crate::secure_messaging::SecurityLevel;

    fn encode(command: Command) -> Vec<u8> {
        command.to_apdu().unwrap().encode().unwrap().into_vec()
    }

    #[test]
    fn test_create_object() {
        let command = Command::CreateObject {
            object_id: *b"C0\x00\x00",
            size: 256,
            acl: hex!("FFFF40004000"),
        };
        assert_eq!(encode(command), hex!("845A00000E 43300000 00000100 FFFF40004000").to_vec());
    }

    #[test]
    fn test_handshake_commands() {
        let iu = Command::InitializeUpdate { key_version: 0x01, key_index: 0x00, host_challenge: hex!("0001020304050607") };
        assert_eq!(encode(iu), hex!("8050010008 0001020304050607").to_vec());

        let ea = Command::ExternalAuthenticate { security_level: SecurityLevel::MacEncrypt, host_cryptogram: [0xAA; 8] };
        let apdu = ea.to_apdu().unwrap();
        assert_eq!(apdu.header.p1, 0x03);
        assert!(ea.is_sensitive());
    }

    #[test]
    fn test_fixed_length_queries() {
        let cases = [
            (Command::GetStatus, hex!("B03C000010")),
            (Command::GetVersion, hex!("B070000004")),
            (Command::ListObjects { sequence: ObjectSequence::Reset }, hex!("B05800000E")),
            (Command::ListObjects { sequence: ObjectSequence::Next }, hex!("B05801000E")),
            (Command::ListPins, hex!("B048000002")),
            (Command::GetLifecycle, hex!("B0F2000001")),
            (Command::GetData, hex!("80CA9F7F2D")),
        ];
        for (command, expected) in cases {
            let apdu = command.to_apdu().unwrap();
            assert!(matches!(apdu.length, LengthField::Fixed(_)), "{:?}", command);
            assert_eq!(apdu.encode().unwrap().as_slice(), &expected);
        }
    }

    #[test]
    fn test_object_io() {
        let write = Command::WriteObject { object_id: *b"c0\x00\x00", offset: 0x1234, data: ByteBuffer::from([0xAB, 0xCD]) };
        assert_eq!(encode(write), hex!("845400000B 63300000 00001234 02 ABCD").to_vec());

        let read = Command::ReadObject { object_id: *b"c0\x00\x00", offset: 0xD0, length: 0xD0 };
        assert_eq!(encode(read), hex!("8456000009 63300000 000000D0 D0").to_vec());
    }

    #[test]
    fn test_pin_number_range() {
        let ok = Command::SetPin { pin_number: 7, pin: ByteBuffer::from(b"1234") };
        assert_eq!(encode(ok), hex!("8404070004 31323334").to_vec());

        let bad = Command::UnblockPin { pin_number: 8 };
        match bad.to_apdu() {
            Err(WriteError::ParameterOutOfRange { parameter: "PIN number", value: 8, maximum: 7 }) => {},
            other => panic!("unexpected result {:?}", other),
        }
        let bad_create = Command::CreatePin { pin_number: 0x10, max_retries: 3, pin: ByteBuffer::new() };
        assert!(bad_create.to_apdu().is_err());
    }

    #[test]
    fn test_key_slot_and_chunk_ranges() {
        assert!(Command::ImportKey { key_slot: 0x0F, acl: [0; 6] }.to_apdu().is_ok());
        assert!(Command::ImportKey { key_slot: 0x10, acl: [0; 6] }.to_apdu().is_err());
        assert!(Command::ReadBuffer { length: 0xD1, offset: 0 }.to_apdu().is_err());
        let too_much = Command::WriteObject { object_id: [0; 4], offset: 0, data: ByteBuffer::filled(0, 0xD1) };
        assert!(too_much.to_apdu().is_err());
        let issuer = Command::SetIssuerInfo { issuer_info: ByteBuffer::filled(0x41, 0xE1) };
        assert!(issuer.to_apdu().is_err());
    }

    #[test]
    fn test_read_buffer() {
        assert_eq!(encode(Command::ReadBuffer { length: 0xD0, offset: 0x01A0 }), hex!("8408D00002 01A0").to_vec());
    }

    #[test]
    fn test_put_key_header() {
        let command = Command::PutKey { current_key_version: 0x01, key_index: 0x01, key_data: ByteBuffer::from([0x02]) };
        let apdu = command.to_apdu().unwrap();
        assert_eq!(apdu.header.to_bytes(), [0x84, 0xD8, 0x01, 0x81]);
    }

    #[test]
    fn test_generate_key() {
        let command = Command::GenerateKey(KeyGeneration {
            family: KeyFamily::Ecc,
            private_key_slot: 0x04,
            public_key_slot: 0x05,
            algorithm: 0x00,
            key_size: 256,
            option: 0x01,
            key_type: 0x00,
            wrapped_challenge: ByteBuffer::from([0x11; 2]),
            key_check: ByteBuffer::new(),
        });
        assert_eq!(
            encode(command),
            hex!("840D04050B 00 0100 01 00 0002 1111 0000").to_vec(),
        );
    }

    #[test]
    fn test_gp_card_management() {
        let delete = Command::DeleteFile { aid: ByteBuffer::from(hex!("A000000001")) };
        assert_eq!(encode(delete), hex!("84E4000007 4F05A000000001").to_vec());

        let load = Command::InstallLoad {
            package_aid: ByteBuffer::from(hex!("A00000000101")),
            security_domain_aid: ByteBuffer::from(hex!("A000000003000000")),
            file_length: 0x1234,
        };
        assert_eq!(
            encode(load),
            hex!("84E6020019 06A00000000101 08A000000003000000 00 06EF04C6021234 00").to_vec(),
        );

        let install = Command::InstallApplet {
            package_aid: ByteBuffer::from(hex!("A00000000101")),
            applet_aid: ByteBuffer::from(hex!("A0000000010101")),
            privileges: 0x00,
            instance_size: 0x0100,
            memory_size: 0x1000,
        };
        assert_eq!(
            encode(install),
            hex!("84E60C0027 06A00000000101 07A0000000010101 07A0000000010101 0100 0CC900EF08C8020100C7021000 00").to_vec(),
        );

        let block = Command::LoadFile { last_block: true, block_number: 3, block: ByteBuffer::from([0xC4]) };
        assert_eq!(encode(block), hex!("84E8800301 C4").to_vec());
    }

    #[test]
    fn test_format_muscle_applet() {
        let format = MuscleFormat {
            memory_size: 0x1000,
            pin0: ByteBuffer::from(b"0000"),
            pin0_tries: 3,
            unblock_pin0: ByteBuffer::from(b"11"),
            unblock0_tries: 5,
            pin1: ByteBuffer::new(),
            pin1_tries: 1,
            unblock_pin1: ByteBuffer::new(),
            unblock1_tries: 1,
            object_creation_acl: 0x01,
            key_creation_acl: 0x02,
            pin_creation_acl: 0x03,
        };
        let command = Command::FormatMuscleApplet(format);
        assert!(command.is_sensitive());
        assert_eq!(command.operation(), Operation::FormatMuscleApplet);
        assert_eq!(
            encode(command),
            hex!("842A00001D 4D7573636C653030 03 05 04 30303030 02 3131 01 01 00 00 0000 1000 010203").to_vec(),
        );
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::InitializeUpdate.to_string(), "INITIALIZE UPDATE");
        assert_eq!(Command::GetStatus.operation().to_string(), "GET STATUS");
        assert!(!Command::GetStatus.is_sensitive());
    }
}
