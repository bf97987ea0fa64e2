//! The secure channel state machine and the card operations issued over it.
//!
//! ```plain
//! Unconnected --INITIALIZE UPDATE--> KeysExchanged --EXTERNAL AUTHENTICATE--> Authenticated
//! Authenticated --first protected command--> Active
//! any --close or failed setup--> Closed
//! ```
//!
//! Commands are strictly sequential. A card-reported error leaves the MAC chain intact; the caller
//! decides whether to continue. Nothing is retried internally since resending a MACed command
//! changes the chain.


use std::fmt;

use rand::RngCore;
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use crate::buffer::ByteBuffer;
use crate::commands::{
    Command, KeyGeneration, MuscleFormat, ObjectSequence, Operation, SW_SEQUENCE_END,
};
use crate::config::{ChannelConfig, ConfigError};
use crate::crypt::{self, kdf};
use crate::der_util;
use crate::iso7816::apdu::{Apdu, Response, ResponseTrailer, WriteError, MAC_LENGTH};
use crate::iso7816::card::{transceive, CommunicationError, Transport};
use crate::keys::{self, KeyError, KeyInfo, KeyProvider, StaticKeySet};
use crate::response::{
    AppletStatus, AppletVersion, GeneratedKey, InitializeUpdateResponse, ObjectInfo, ParseError,
    PinList, Reader, TokenDescriptor,
};
use crate::secure_messaging::{self, cryptograms_match, SecureMessaging};


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ChannelState {
    Unconnected,
    KeysExchanged,
    Authenticated,
    Active,
    Closed,
}
impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconnected => write!(f, "unconnected"),
            Self::KeysExchanged => write!(f, "keys exchanged"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
        }
    }
}


/// Why the channel could not be established.
#[derive(Debug)]
pub enum SetupError {
    Keys(KeyError),
    Derivation(crypt::Error),
    CardCryptogramMismatch,
    Rejected { operation: Operation, trailer: ResponseTrailer },
    Malformed(ParseError),
}
impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keys(e) => write!(f, "long-term key error: {}", e),
            Self::Derivation(e) => write!(f, "session key derivation failed: {}", e),
            Self::CardCryptogramMismatch => write!(f, "card cryptogram does not match"),
            Self::Rejected { operation, trailer }
                => write!(f, "{} rejected with status 0x{:04X}", operation, trailer.to_word()),
            Self::Malformed(e) => write!(f, "malformed INITIALIZE UPDATE response: {}", e),
        }
    }
}
impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Keys(e) => Some(e),
            Self::Derivation(e) => Some(e),
            Self::CardCryptogramMismatch => None,
            Self::Rejected { .. } => None,
            Self::Malformed(e) => Some(e),
        }
    }
}


/// Coarse classification of [`Error`] for callers deciding how to proceed.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    /// The channel could not be established and is closed.
    Setup,

    /// No or malformed reply; the outcome of the command is unknown.
    Transport,

    /// The card answered with a status word other than `90 00`.
    Card,

    /// A host-side cryptographic operation failed; nothing was sent.
    HostCrypto,

    /// The caller passed invalid parameters or used the channel in the wrong state.
    Usage,
}


#[derive(Debug)]
pub enum Error {
    Setup(SetupError),
    Communication(CommunicationError),
    Card { operation: Operation, trailer: ResponseTrailer },
    Crypto(crypt::Error),
    Key(KeyError),
    Encoding(WriteError),
    Response { operation: Operation, error: ParseError },
    InvalidState { operation: Operation, state: ChannelState },
    NoSession { state: ChannelState },
    Config(ConfigError),
}
impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Setup(_) => ErrorKind::Setup,
            Self::Communication(CommunicationError::Write(_)) => ErrorKind::Usage,
            Self::Communication(_) => ErrorKind::Transport,
            Self::Card { .. } => ErrorKind::Card,
            Self::Crypto(_) => ErrorKind::HostCrypto,
            Self::Key(_) => ErrorKind::HostCrypto,
            Self::Encoding(_) => ErrorKind::Usage,
            Self::Response { .. } => ErrorKind::Transport,
            Self::InvalidState { .. } => ErrorKind::Usage,
            Self::NoSession { .. } => ErrorKind::Usage,
            Self::Config(_) => ErrorKind::Usage,
        }
    }

    /// The status word reported by the card, if the card rejected a command.
    pub fn status_word(&self) -> Option<u16> {
        match self {
            Self::Card { trailer, .. } => Some(trailer.to_word()),
            Self::Setup(SetupError::Rejected { trailer, .. }) => Some(trailer.to_word()),
            _ => None,
        }
    }
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup(e)
                => write!(f, "secure channel setup failed: {}", e),
            Self::Communication(e)
                => write!(f, "communication error: {}", e),
            Self::Card { operation, trailer }
                => write!(f, "{} failed with response code 0x{:04X}", operation, trailer.to_word()),
            Self::Crypto(e)
                => write!(f, "cryptographic error: {}", e),
            Self::Key(e)
                => write!(f, "key error: {}", e),
            Self::Encoding(e)
                => write!(f, "cannot encode command: {}", e),
            Self::Response { operation, error }
                => write!(f, "{} returned an invalid response: {}", operation, error),
            Self::InvalidState { operation, state }
                => write!(f, "{} is not allowed while the channel is {}", operation, state),
            Self::NoSession { state }
                => write!(f, "no session keys while the channel is {}", state),
            Self::Config(e)
                => write!(f, "invalid configuration: {}", e),
        }
    }
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Setup(e) => Some(e),
            Self::Communication(e) => Some(e),
            Self::Card { .. } => None,
            Self::Crypto(e) => Some(e),
            Self::Key(e) => Some(e),
            Self::Encoding(e) => Some(e),
            Self::Response { error, .. } => Some(error),
            Self::InvalidState { .. } => None,
            Self::NoSession { .. } => None,
            Self::Config(e) => Some(e),
        }
    }
}
impl From<SetupError> for Error {
    fn from(value: SetupError) -> Self { Self::Setup(value) }
}
impl From<CommunicationError> for Error {
    fn from(value: CommunicationError) -> Self { Self::Communication(value) }
}
impl From<crypt::Error> for Error {
    fn from(value: crypt::Error) -> Self { Self::Crypto(value) }
}
impl From<KeyError> for Error {
    fn from(value: KeyError) -> Self { Self::Key(value) }
}
impl From<WriteError> for Error {
    fn from(value: WriteError) -> Self { Self::Encoding(value) }
}
impl From<ConfigError> for Error {
    fn from(value: ConfigError) -> Self { Self::Config(value) }
}
impl From<secure_messaging::Error> for Error {
    fn from(value: secure_messaging::Error) -> Self {
        match value {
            secure_messaging::Error::Crypto(e) => Self::Crypto(e),
            secure_messaging::Error::Write(e) => Self::Encoding(e),
        }
    }
}


/// Applet queries that are sent in the clear and may be issued before the channel is open.
fn is_plain(command: &Command) -> bool {
    matches!(
        command,
        Command::Select { .. }
        | Command::ListPins
        | Command::ListObjects { .. }
        | Command::GetStatus
        | Command::GetVersion
        | Command::GetData
        | Command::GetLifecycle
    )
}


fn parse_payload<R>(
    operation: Operation,
    response: &Response,
    parse: impl FnOnce(&[u8]) -> Result<R, ParseError>,
) -> Result<R, Error> {
    parse(response.data())
        .map_err(|error| Error::Response { operation, error })
}


/// A secure channel to one card over one transport.
///
/// Session keys, challenges and the MAC chain live only as long as the channel and are wiped when
/// it is closed or dropped.
pub struct SecureChannel<T: Transport> {
    transport: T,
    config: ChannelConfig,
    state: ChannelState,
    host_challenge: Zeroizing<[u8; kdf::CHALLENGE_LENGTH]>,
    card_challenge: Zeroizing<[u8; kdf::CHALLENGE_LENGTH]>,
    key_info: Option<KeyInfo>,
    messaging: Option<SecureMessaging>,
}
impl<T: Transport> SecureChannel<T> {
    pub fn new(transport: T, config: ChannelConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            transport,
            config,
            state: ChannelState::Unconnected,
            host_challenge: Zeroizing::new([0u8; kdf::CHALLENGE_LENGTH]),
            card_challenge: Zeroizing::new([0u8; kdf::CHALLENGE_LENGTH]),
            key_info: None,
            messaging: None,
        })
    }

    pub fn state(&self) -> ChannelState { self.state }
    pub fn config(&self) -> &ChannelConfig { &self.config }
    pub fn transport(&self) -> &T { &self.transport }
    pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }

    /// Key set version and index reported by the card during INITIALIZE UPDATE.
    pub fn key_info(&self) -> Option<KeyInfo> { self.key_info }

    /// The current ICV, once session keys exist.
    pub fn icv(&self) -> Option<[u8; MAC_LENGTH]> {
        self.messaging.as_ref().map(|m| *m.icv())
    }

    fn require_state(&self, operation: Operation, allowed: &[ChannelState]) -> Result<(), Error> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState { operation, state: self.state })
        }
    }

    /// Wipes all session material and refuses further commands.
    #[instrument(skip(self))]
    pub fn close(&mut self) {
        self.messaging = None;
        self.host_challenge.fill(0x00);
        self.card_challenge.fill(0x00);
        self.key_info = None;
        self.state = ChannelState::Closed;
        debug!("secure channel closed");
    }

    /// Sends INITIALIZE UPDATE with a fresh host challenge, derives the session keys and verifies
    /// the card cryptogram.
    pub fn initialize_update<R: RngCore + ?Sized>(
        &mut self,
        keys: &dyn KeyProvider,
        rng: &mut R,
    ) -> Result<InitializeUpdateResponse, Error> {
        let mut host_challenge = Zeroizing::new([0u8; kdf::CHALLENGE_LENGTH]);
        rng.fill_bytes(&mut host_challenge[..]);
        self.initialize_update_with_challenge(keys, &host_challenge)
    }

    /// [`SecureChannel::initialize_update`] with a caller-chosen host challenge.
    #[instrument(skip_all)]
    pub fn initialize_update_with_challenge(
        &mut self,
        keys: &dyn KeyProvider,
        host_challenge: &[u8; kdf::CHALLENGE_LENGTH],
    ) -> Result<InitializeUpdateResponse, Error> {
        self.require_state(Operation::InitializeUpdate, &[ChannelState::Unconnected])?;
        let result = self.do_initialize_update(keys, host_challenge);
        if let Err(e) = &result {
            warn!("INITIALIZE UPDATE failed: {}", e);
            self.close();
        }
        result
    }

    fn do_initialize_update(
        &mut self,
        keys: &dyn KeyProvider,
        host_challenge: &[u8; kdf::CHALLENGE_LENGTH],
    ) -> Result<InitializeUpdateResponse, Error> {
        let command = Command::InitializeUpdate {
            key_version: self.config.key_version,
            key_index: self.config.key_index,
            host_challenge: *host_challenge,
        };
        let response = self.round_trip(&command.to_apdu()?, false)?;
        if !response.is_success() {
            return Err(SetupError::Rejected { operation: Operation::InitializeUpdate, trailer: response.trailer }.into());
        }
        let parsed = InitializeUpdateResponse::parse(response.data())
            .map_err(SetupError::Malformed)?;
        debug!(key_version = parsed.key_info.version, key_index = parsed.key_info.index, "card answered INITIALIZE UPDATE");

        let auth_key = keys.auth_key().map_err(SetupError::Keys)?;
        let enc_key = kdf::derive_session_key(&auth_key, host_challenge, &parsed.card_challenge)
            .map_err(SetupError::Derivation)?;
        let expected = secure_messaging::card_cryptogram(&enc_key, host_challenge, &parsed.card_challenge)
            .map_err(SetupError::Derivation)?;
        if !cryptograms_match(&expected, &parsed.card_cryptogram) {
            return Err(SetupError::CardCryptogramMismatch.into());
        }

        let mac_key = keys.mac_key().map_err(SetupError::Keys)?;
        let mac_session_key = kdf::derive_session_key(&mac_key, host_challenge, &parsed.card_challenge)
            .map_err(SetupError::Derivation)?;

        *self.host_challenge = *host_challenge;
        *self.card_challenge = parsed.card_challenge;
        self.key_info = Some(parsed.key_info);
        self.messaging = Some(SecureMessaging::new(enc_key, mac_session_key, self.config.security_level));
        self.state = ChannelState::KeysExchanged;
        Ok(parsed)
    }

    /// Sends EXTERNAL AUTHENTICATE with the host cryptogram, MACed from a fresh ICV.
    #[instrument(skip(self))]
    pub fn external_authenticate(&mut self) -> Result<(), Error> {
        self.require_state(Operation::ExternalAuthenticate, &[ChannelState::KeysExchanged])?;
        let result = self.do_external_authenticate();
        if let Err(e) = &result {
            warn!("EXTERNAL AUTHENTICATE failed: {}", e);
            self.close();
        }
        result
    }

    fn do_external_authenticate(&mut self) -> Result<(), Error> {
        let messaging = self.messaging.as_mut()
            .ok_or(Error::NoSession { state: self.state })?;
        let host_cryptogram = secure_messaging::host_cryptogram(
            messaging.enc_key(),
            &self.host_challenge,
            &self.card_challenge,
        ).map_err(SetupError::Derivation)?;

        let command = Command::ExternalAuthenticate {
            security_level: messaging.level(),
            host_cryptogram,
        };
        messaging.reset_icv();
        let apdu = messaging.attach_mac(command.to_apdu()?)?;

        let response = self.round_trip(&apdu, true)?;
        if !response.is_success() {
            return Err(SetupError::Rejected { operation: Operation::ExternalAuthenticate, trailer: response.trailer }.into());
        }
        self.state = ChannelState::Authenticated;
        debug!(level = %self.config.security_level, "secure channel established");
        Ok(())
    }

    /// INITIALIZE UPDATE followed by EXTERNAL AUTHENTICATE.
    pub fn open<R: RngCore + ?Sized>(&mut self, keys: &dyn KeyProvider, rng: &mut R) -> Result<(), Error> {
        self.initialize_update(keys, rng)?;
        self.external_authenticate()
    }

    /// Advances the MAC chain over `apdu` and returns the MAC.
    pub fn compute_mac(&mut self, apdu: &Apdu) -> Result<[u8; MAC_LENGTH], Error> {
        let messaging = self.messaging.as_mut()
            .ok_or(Error::NoSession { state: self.state })?;
        Ok(messaging.compute_mac(apdu)?)
    }

    fn round_trip(&mut self, apdu: &Apdu, sensitive: bool) -> Result<Response, Error> {
        Ok(transceive(&mut self.transport, apdu, sensitive)?)
    }

    /// Protects and sends a command, returning the reply whatever its status word.
    pub fn transmit(&mut self, command: &Command) -> Result<Response, Error> {
        let operation = command.operation();
        if is_plain(command) {
            if self.state == ChannelState::Closed {
                return Err(Error::InvalidState { operation, state: self.state });
            }
            return self.round_trip(&command.to_apdu()?, command.is_sensitive());
        }

        self.require_state(operation, &[ChannelState::Authenticated, ChannelState::Active])?;
        let apdu = command.to_apdu()?;
        let messaging = self.messaging.as_mut()
            .ok_or(Error::NoSession { state: self.state })?;
        let apdu = messaging.protect(apdu)?;
        self.state = ChannelState::Active;
        self.round_trip(&apdu, command.is_sensitive())
    }

    /// [`SecureChannel::transmit`], requiring `90 00`.
    pub fn execute(&mut self, command: &Command) -> Result<Response, Error> {
        let response = self.transmit(command)?;
        if !response.is_success() {
            let operation = command.operation();
            warn!("{} failed with response code 0x{:04X}", operation, response.trailer.to_word());
            return Err(Error::Card { operation, trailer: response.trailer });
        }
        Ok(response)
    }

    #[instrument(skip(self))]
    pub fn select(&mut self, aid: &[u8]) -> Result<(), Error> {
        self.execute(&Command::Select { aid: ByteBuffer::from(aid) })?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn create_object(&mut self, object_id: [u8; 4], size: u32, acl: [u8; 6]) -> Result<(), Error> {
        self.execute(&Command::CreateObject { object_id, size, acl })?;
        Ok(())
    }

    /// Writes `data` to an object in chunks of at most the configured chunk size.
    #[instrument(skip(self, data), fields(length = data.len()))]
    pub fn write_object(&mut self, object_id: [u8; 4], offset: u32, data: &[u8]) -> Result<(), Error> {
        let mut chunk_offset = offset;
        for chunk in data.chunks(self.config.max_chunk_size) {
            self.execute(&Command::WriteObject {
                object_id,
                offset: chunk_offset,
                data: ByteBuffer::from(chunk),
            })?;
            chunk_offset = advance_offset(chunk_offset, chunk.len())?;
        }
        Ok(())
    }

    /// Reads `length` bytes of an object in chunks, stopping early if the card returns no data.
    #[instrument(skip(self))]
    pub fn read_object(&mut self, object_id: [u8; 4], offset: u32, length: usize) -> Result<ByteBuffer, Error> {
        let mut ret = ByteBuffer::with_capacity(length);
        let mut chunk_offset = offset;
        while ret.len() < length {
            let chunk_length = (length - ret.len()).min(self.config.max_chunk_size);
            let response = self.execute(&Command::ReadObject {
                object_id,
                offset: chunk_offset,
                length: chunk_u8(chunk_length)?,
            })?;
            if response.data().is_empty() {
                break;
            }
            ret += response.data();
            chunk_offset = advance_offset(chunk_offset, response.data().len())?;
        }
        Ok(ret)
    }

    /// Reads the card's output buffer (e.g. a generated public key) until the card returns no data
    /// or `length` bytes were read.
    #[instrument(skip(self))]
    pub fn read_buffer(&mut self, length: usize) -> Result<ByteBuffer, Error> {
        let mut ret = ByteBuffer::with_capacity(length);
        while ret.len() < length {
            let chunk_length = (length - ret.len()).min(self.config.max_chunk_size);
            let offset = u16::try_from(ret.len())
                .map_err(|_| WriteError::ParameterOutOfRange { parameter: "buffer offset", value: ret.len(), maximum: u16::MAX.into() })?;
            let response = self.execute(&Command::ReadBuffer {
                length: chunk_u8(chunk_length)?,
                offset,
            })?;
            if response.data().is_empty() {
                break;
            }
            ret += response.data();
        }
        Ok(ret)
    }

    #[instrument(skip_all, fields(family = ?generation.family, key_size = generation.key_size))]
    pub fn generate_key(&mut self, generation: KeyGeneration) -> Result<GeneratedKey, Error> {
        let response = self.execute(&Command::GenerateKey(generation))?;
        parse_payload(Operation::GenerateKey, &response, GeneratedKey::parse)
    }

    /// Replaces the card's key set with `new_keys`, wrapped under the current KEK.
    #[instrument(skip(self, new_keys, current_keys))]
    pub fn put_keys(&mut self, new_version: u8, new_keys: &StaticKeySet, current_keys: &dyn KeyProvider) -> Result<(), Error> {
        let key_info = self.key_info
            .ok_or(Error::InvalidState { operation: Operation::PutKey, state: self.state })?;
        let current_kek = current_keys.kek_key()?;
        let key_data = keys::put_key_data(new_version, new_keys, &current_kek)?;
        self.execute(&Command::PutKey {
            current_key_version: key_info.version,
            key_index: key_info.index,
            key_data,
        })?;
        Ok(())
    }

    /// Sets a new value for a PIN.
    #[instrument(skip(self, new_pin))]
    pub fn reset_pin(&mut self, pin_number: u8, new_pin: &[u8]) -> Result<(), Error> {
        self.execute(&Command::SetPin { pin_number, pin: ByteBuffer::from(new_pin) })?;
        Ok(())
    }

    #[instrument(skip(self, pin))]
    pub fn create_pin(&mut self, pin_number: u8, max_retries: u8, pin: &[u8]) -> Result<(), Error> {
        self.execute(&Command::CreatePin { pin_number, max_retries, pin: ByteBuffer::from(pin) })?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn unblock_pin(&mut self, pin_number: u8) -> Result<(), Error> {
        self.execute(&Command::UnblockPin { pin_number })?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn list_pins(&mut self) -> Result<PinList, Error> {
        let response = self.execute(&Command::ListPins)?;
        parse_payload(Operation::ListPins, &response, PinList::parse)
    }

    /// Enumerates the applet's objects until the card reports the end of the sequence.
    #[instrument(skip(self))]
    pub fn list_objects(&mut self) -> Result<Vec<ObjectInfo>, Error> {
        let mut ret = Vec::new();
        let mut sequence = ObjectSequence::Reset;
        loop {
            let command = Command::ListObjects { sequence };
            let response = self.transmit(&command)?;
            if response.trailer.to_word() == SW_SEQUENCE_END {
                break;
            }
            if !response.is_success() {
                return Err(Error::Card { operation: Operation::ListObjects, trailer: response.trailer });
            }
            ret.push(parse_payload(Operation::ListObjects, &response, ObjectInfo::parse)?);
            sequence = ObjectSequence::Next;
        }
        debug!(count = ret.len(), "objects listed");
        Ok(ret)
    }

    #[instrument(skip(self))]
    pub fn get_status(&mut self) -> Result<AppletStatus, Error> {
        let response = self.execute(&Command::GetStatus)?;
        parse_payload(Operation::GetStatus, &response, AppletStatus::parse)
    }

    #[instrument(skip(self))]
    pub fn get_version(&mut self) -> Result<AppletVersion, Error> {
        let response = self.execute(&Command::GetVersion)?;
        parse_payload(Operation::GetVersion, &response, AppletVersion::parse)
    }

    /// Reads the card production life cycle data (CUID and MSN).
    #[instrument(skip(self))]
    pub fn get_data(&mut self) -> Result<TokenDescriptor, Error> {
        let response = self.execute(&Command::GetData)?;
        parse_payload(Operation::GetData, &response, TokenDescriptor::parse)
    }

    #[instrument(skip(self))]
    pub fn get_issuer_info(&mut self) -> Result<ByteBuffer, Error> {
        let response = self.execute(&Command::GetIssuerInfo)?;
        Ok(response.data.clone())
    }

    #[instrument(skip(self))]
    pub fn set_issuer_info(&mut self, issuer_info: &[u8]) -> Result<(), Error> {
        self.execute(&Command::SetIssuerInfo { issuer_info: ByteBuffer::from(issuer_info) })?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn get_lifecycle(&mut self) -> Result<u8, Error> {
        let response = self.execute(&Command::GetLifecycle)?;
        parse_payload(Operation::GetLifecycle, &response, |data| Reader::exact(data, 1)?.u8())
    }

    #[instrument(skip(self))]
    pub fn set_lifecycle(&mut self, state: u8) -> Result<(), Error> {
        self.execute(&Command::SetLifecycle { state })?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn import_key(&mut self, key_slot: u8, acl: [u8; 6]) -> Result<(), Error> {
        self.execute(&Command::ImportKey { key_slot, acl })?;
        Ok(())
    }

    #[instrument(skip(self, wrapped_key, iv))]
    pub fn import_key_encrypted(
        &mut self,
        private_key_slot: u8,
        public_key_slot: u8,
        wrapped_key: &[u8],
        iv: &[u8],
    ) -> Result<(), Error> {
        self.execute(&Command::ImportKeyEncrypted {
            private_key_slot,
            public_key_slot,
            wrapped_key: ByteBuffer::from(wrapped_key),
            iv: ByteBuffer::from(iv),
        })?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub fn format_muscle_applet(&mut self, format: MuscleFormat) -> Result<(), Error> {
        self.execute(&Command::FormatMuscleApplet(format))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete_file(&mut self, aid: &[u8]) -> Result<(), Error> {
        self.execute(&Command::DeleteFile { aid: ByteBuffer::from(aid) })?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn install_load(&mut self, package_aid: &[u8], security_domain_aid: &[u8], file_length: u16) -> Result<(), Error> {
        self.execute(&Command::InstallLoad {
            package_aid: ByteBuffer::from(package_aid),
            security_domain_aid: ByteBuffer::from(security_domain_aid),
            file_length,
        })?;
        Ok(())
    }

    /// Sends a load file as `C4 <length> file`, split into numbered LOAD blocks.
    #[instrument(skip(self, load_file), fields(length = load_file.len()))]
    pub fn load_file(&mut self, load_file: &[u8]) -> Result<(), Error> {
        let mut wrapped = Vec::with_capacity(load_file.len() + 4);
        der_util::push_tlv(&mut wrapped, 0xC4, load_file);

        let block_count = wrapped.len().div_ceil(self.config.max_chunk_size);
        if block_count > 256 {
            return Err(WriteError::ParameterOutOfRange { parameter: "LOAD block count", value: block_count, maximum: 256 }.into());
        }
        for (number, block) in wrapped.chunks(self.config.max_chunk_size).enumerate() {
            self.execute(&Command::LoadFile {
                last_block: number + 1 == block_count,
                block_number: number as u8,
                block: ByteBuffer::from(block),
            })?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn install_applet(
        &mut self,
        package_aid: &[u8],
        applet_aid: &[u8],
        privileges: u8,
        instance_size: u16,
        memory_size: u16,
    ) -> Result<(), Error> {
        self.execute(&Command::InstallApplet {
            package_aid: ByteBuffer::from(package_aid),
            applet_aid: ByteBuffer::from(applet_aid),
            privileges,
            instance_size,
            memory_size,
        })?;
        Ok(())
    }
}
impl<T: Transport> fmt::Debug for SecureChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannel")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("key_info", &self.key_info)
            .finish_non_exhaustive()
    }
}


fn chunk_u8(length: usize) -> Result<u8, WriteError> {
    u8::try_from(length)
        .map_err(|_| WriteError::ParameterOutOfRange { parameter: "chunk length", value: length, maximum: 0xFF })
}


fn advance_offset(offset: u32, by: usize) -> Result<u32, WriteError> {
    u32::try_from(by).ok()
        .and_then(|by| offset.checked_add(by))
        .ok_or(WriteError::ParameterOutOfRange { parameter: "object offset", value: by, maximum: u32::MAX as usize })
}
