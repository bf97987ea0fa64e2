//! Secure Messaging for the SCP01-style secure channel.
//!
//! Every protected command is MACed over `CLA INS P1 P2 Lc' DATA`, where `Lc'` already counts the
//! MAC. The MAC is chained: the MAC of one command is the ICV (initial chaining vector) of the next.
//! With encryption enabled, the MAC is computed first and the data is encrypted afterwards.


use std::fmt;

use subtle::ConstantTimeEq;
use tracing::trace;
use zeroize::Zeroizing;
use zeroize_derive::ZeroizeOnDrop;

use crate::buffer::ByteBuffer;
use crate::crypt::{self, kdf::CHALLENGE_LENGTH, BLOCK_SIZE, ZERO_BLOCK};
use crate::iso7816::apdu::{Apdu, WriteError, MAC_LENGTH};
use crate::keys::SessionKey;


/// The protection applied to commands after EXTERNAL AUTHENTICATE.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SecurityLevel {
    /// Commands are sent as-is.
    None,

    /// Commands carry a chained MAC.
    #[default]
    Mac,

    /// Commands carry a chained MAC and their data is encrypted.
    MacEncrypt,
}
impl SecurityLevel {
    /// The value sent in P1 of EXTERNAL AUTHENTICATE.
    pub const fn p1(&self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Mac => 0x01,
            Self::MacEncrypt => 0x03,
        }
    }

    pub const fn from_p1(p1: u8) -> Option<Self> {
        match p1 {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Mac),
            0x03 => Some(Self::MacEncrypt),
            _ => None,
        }
    }

    pub const fn requires_mac(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub const fn requires_encryption(&self) -> bool {
        matches!(self, Self::MacEncrypt)
    }
}
impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Mac => write!(f, "MAC"),
            Self::MacEncrypt => write!(f, "MAC and encryption"),
        }
    }
}


#[derive(Debug)]
pub enum Error {
    Crypto(crypt::Error),
    Write(WriteError),
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crypto(e) => write!(f, "cryptographic error: {}", e),
            Self::Write(e) => write!(f, "encoding error: {}", e),
        }
    }
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Crypto(e) => Some(e),
            Self::Write(e) => Some(e),
        }
    }
}
impl From<crypt::Error> for Error {
    fn from(value: crypt::Error) -> Self { Self::Crypto(value) }
}
impl From<WriteError> for Error {
    fn from(value: WriteError) -> Self { Self::Write(value) }
}


/// The card cryptogram: MAC under the encryption session key over `hostChallenge ‖ cardChallenge`.
pub fn card_cryptogram(
    enc_key: &SessionKey,
    host_challenge: &[u8; CHALLENGE_LENGTH],
    card_challenge: &[u8; CHALLENGE_LENGTH],
) -> Result<[u8; MAC_LENGTH], crypt::Error> {
    let mut data = Zeroizing::new([0u8; 2 * CHALLENGE_LENGTH]);
    data[..CHALLENGE_LENGTH].copy_from_slice(host_challenge);
    data[CHALLENGE_LENGTH..].copy_from_slice(card_challenge);
    crypt::cbc_mac(enc_key.as_bytes(), &ZERO_BLOCK, &data[..])
}


/// The host cryptogram: MAC under the encryption session key over `cardChallenge ‖ hostChallenge`.
pub fn host_cryptogram(
    enc_key: &SessionKey,
    host_challenge: &[u8; CHALLENGE_LENGTH],
    card_challenge: &[u8; CHALLENGE_LENGTH],
) -> Result<[u8; MAC_LENGTH], crypt::Error> {
    card_cryptogram(enc_key, card_challenge, host_challenge)
}


/// Compares cryptograms in constant time.
pub fn cryptograms_match(expected: &[u8], obtained: &[u8]) -> bool {
    expected.ct_eq(obtained).into()
}


/// Session keys and MAC chain state of one secure channel.
#[derive(ZeroizeOnDrop)]
pub struct SecureMessaging {
    enc_key: SessionKey,
    mac_key: SessionKey,
    icv: [u8; MAC_LENGTH],
    #[zeroize(skip)]
    level: SecurityLevel,
}
impl SecureMessaging {
    /// Starts a chain with an all-zero ICV.
    pub fn new(enc_key: SessionKey, mac_key: SessionKey, level: SecurityLevel) -> Self {
        Self {
            enc_key,
            mac_key,
            icv: ZERO_BLOCK,
            level,
        }
    }

    pub fn level(&self) -> SecurityLevel { self.level }
    pub fn icv(&self) -> &[u8; MAC_LENGTH] { &self.icv }
    pub fn enc_key(&self) -> &SessionKey { &self.enc_key }

    pub fn reset_icv(&mut self) {
        self.icv = ZERO_BLOCK;
    }

    /// Computes the MAC of `apdu` from the current ICV and makes it the new ICV.
    ///
    /// Each call advances the chain, so every MAC must be computed exactly once and in the order
    /// the commands are sent.
    pub fn compute_mac(&mut self, apdu: &Apdu) -> Result<[u8; MAC_LENGTH], Error> {
        let data_to_mac = apdu.data_to_mac()?;
        let mac = crypt::cbc_mac(self.mac_key.as_bytes(), &self.icv, &data_to_mac)?;
        self.icv = mac;
        trace!(icv = ?self.icv, "MAC chain advanced");
        Ok(mac)
    }

    /// Attaches a chained MAC without touching the data.
    pub fn attach_mac(&mut self, mut apdu: Apdu) -> Result<Apdu, Error> {
        let mac = self.compute_mac(&apdu)?;
        apdu.mac = Some(mac);
        Ok(apdu)
    }

    /// Applies the negotiated protection to a command.
    ///
    /// Fixed-length commands and commands at [`SecurityLevel::None`] are returned unchanged and do
    /// not advance the chain.
    pub fn protect(&mut self, apdu: Apdu) -> Result<Apdu, Error> {
        if apdu.is_fixed_length() || !self.level.requires_mac() {
            return Ok(apdu);
        }
        if !self.level.requires_encryption() {
            return self.attach_mac(apdu);
        }

        // check before the chain advances
        let encrypted_len = encrypted_length(apdu.data.len());
        if encrypted_len + MAC_LENGTH > 255 {
            return Err(WriteError::DataTooLong { maximum: 255, obtained: encrypted_len + MAC_LENGTH }.into());
        }

        let mut apdu = self.attach_mac(apdu)?;
        apdu.data = self.encrypt_data(&apdu.data)?;
        Ok(apdu)
    }

    /// Encrypts `[len] data` in CBC mode under a zero IV.
    ///
    /// Unaligned plaintext is padded to the block boundary with `0x80` and zeroes; aligned plaintext
    /// gains no padding block.
    pub fn encrypt_data(&self, data: &[u8]) -> Result<ByteBuffer, Error> {
        let length = u8::try_from(data.len())
            .map_err(|_| WriteError::DataTooLong { maximum: 255, obtained: data.len() })?;
        let mut plain = ByteBuffer::with_capacity(encrypted_length(data.len()));
        plain += length;
        plain += data;
        let mut padded = crypt::pad_to_block_boundary(&plain);
        crypt::encrypt_cbc(self.enc_key.as_bytes(), &ZERO_BLOCK, &mut padded)?;
        Ok(padded)
    }

    /// Reverses [`SecureMessaging::encrypt_data`], checking the length prefix.
    pub fn decrypt_data(&self, data: &[u8]) -> Result<ByteBuffer, Error> {
        let mut plain = ByteBuffer::from(data);
        crypt::decrypt_cbc(self.enc_key.as_bytes(), &ZERO_BLOCK, &mut plain)?;
        let aligned = matches!(plain.first(), Some(declared) if usize::from(*declared) + 1 == plain.len());
        let unpadded = if aligned {
            plain.as_slice()
        } else {
            crypt::unpad_iso7816(&plain)?
        };
        let (&declared, rest) = unpadded.split_first()
            .ok_or(crypt::Error::InvalidPadding)?;
        if usize::from(declared) != rest.len() {
            return Err(crypt::Error::LengthPrefixMismatch { declared: declared.into(), obtained: rest.len() }.into());
        }
        Ok(ByteBuffer::from(rest))
    }
}
impl fmt::Debug for SecureMessaging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureMessaging")
            .field("icv", &self.icv)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}


/// Length of the ciphertext produced for `data_len` bytes of data.
pub const fn encrypted_length(data_len: usize) -> usize {
    (1 + data_len + BLOCK_SIZE - 1) / BLOCK_SIZE * BLOCK_SIZE
}


#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::{card_cryptogram, encrypted_length, host_cryptogram, Error, SecureMessaging, SecurityLevel};
    use crate::crypt;
    use crate::iso7816::apdu::Apdu;
    use crate::keys::SessionKey;

    const HOST: [u8; 8] = hex!("0001020304050607");
    const CARD: [u8; 8] = hex!("1122334455667788");

    fn session(level: SecurityLevel) -> SecureMessaging {
        SecureMessaging::new(
            SessionKey::from_double_length(&hex!("E5C73B9901753A708167AB115C445B81")),
            SessionKey::from_double_length(&hex!("CAF51BA293969ED8F3A9375083B9BA86")),
            level,
        )
    }

    #[test]
    fn test_security_level_encoding() {
        assert_eq!(SecurityLevel::default(), SecurityLevel::Mac);
        assert_eq!(SecurityLevel::None.p1(), 0x00);
        assert_eq!(SecurityLevel::Mac.p1(), 0x01);
        assert_eq!(SecurityLevel::MacEncrypt.p1(), 0x03);
        assert_eq!(SecurityLevel::from_p1(0x02), None);
    }

    #[test]
    fn test_cryptograms() {
        let sm = session(SecurityLevel::Mac);
        assert_eq!(card_cryptogram(sm.enc_key(), &HOST, &CARD).unwrap(), hex!("0B6C51D99749F55F"));
        assert_eq!(host_cryptogram(sm.enc_key(), &HOST, &CARD).unwrap(), hex!("FE0B567D172AA801"));
    }

    #[test]
    fn test_chain_advances() {
        let mut sm = session(SecurityLevel::Mac);
        let ea = Apdu::new(0x84, 0x82, 0x01, 0x00).with_data(hex!("FE0B567D172AA801"));
        let ea = sm.attach_mac(ea).unwrap();
        assert_eq!(ea.mac, Some(hex!("7E1632AD4EF02096")));
        assert_eq!(sm.icv(), &hex!("7E1632AD4EF02096"));
        assert_eq!(
            ea.encode().unwrap().as_slice(),
            &hex!("8482010010 FE0B567D172AA801 7E1632AD4EF02096"),
        );

        let create = Apdu::new(0x84, 0x5A, 0x00, 0x00).with_data(hex!("43300000 00000100 FFFF40004000"));
        let create = sm.protect(create).unwrap();
        assert_eq!(create.mac, Some(hex!("25AB0A6B4A4203A8")));

        sm.reset_icv();
        assert_eq!(sm.icv(), &[0u8; 8]);
    }

    #[test]
    fn test_unprotected_commands_leave_chain() {
        let mut sm = session(SecurityLevel::Mac);
        let status = Apdu::new(0xB0, 0x3C, 0x00, 0x00).with_fixed_length(0x10);
        let status = sm.protect(status).unwrap();
        assert_eq!(status.mac, None);
        assert_eq!(sm.icv(), &[0u8; 8]);

        let mut clear = session(SecurityLevel::None);
        let create = clear.protect(Apdu::new(0x84, 0x5A, 0x00, 0x00).with_data([0u8; 14])).unwrap();
        assert_eq!(create.mac, None);
        assert_eq!(clear.icv(), &[0u8; 8]);
    }

    #[test]
    fn test_mac_then_encrypt() {
        let mut sm = session(SecurityLevel::MacEncrypt);
        let ea = Apdu::new(0x84, 0x82, 0x03, 0x00).with_data(hex!("FE0B567D172AA801"));
        let ea = sm.attach_mac(ea).unwrap();
        assert_eq!(ea.mac, Some(hex!("E7F48192DD468583")));

        let set_pin = Apdu::new(0x84, 0x04, 0x00, 0x00).with_data(*b"1234");
        let set_pin = sm.protect(set_pin).unwrap();
        assert_eq!(
            set_pin.encode().unwrap().as_slice(),
            &hex!("8404000010 8028FD407A28C238 4F66831939F0693F"),
        );
    }

    #[test]
    fn test_decrypt_inverts_encrypt() {
        let sm = session(SecurityLevel::MacEncrypt);
        let encrypted = sm.encrypt_data(b"1234").unwrap();
        assert_eq!(encrypted.as_slice(), &hex!("8028FD407A28C238"));
        assert_eq!(sm.decrypt_data(&encrypted).unwrap().as_slice(), b"1234");
        assert_eq!(encrypted_length(0), 8);
        assert_eq!(encrypted_length(4), 8);
        assert_eq!(encrypted_length(7), 8);
        assert_eq!(encrypted_length(8), 16);
    }

    #[test]
    fn test_aligned_plaintext_is_not_padded() {
        let sm = session(SecurityLevel::MacEncrypt);
        let encrypted = sm.encrypt_data(b"1234567").unwrap();
        assert_eq!(encrypted.as_slice(), &hex!("6DCF36320F7B71AB"));
        assert_eq!(sm.decrypt_data(&encrypted).unwrap().as_slice(), b"1234567");

        let fifteen: Vec<u8> = (0..15).collect();
        let encrypted = sm.encrypt_data(&fifteen).unwrap();
        assert_eq!(encrypted.as_slice(), &hex!("DCD1BDBE4EED1C22 C99AF6543FFC1DA8"));
        assert_eq!(sm.decrypt_data(&encrypted).unwrap().as_slice(), fifteen.as_slice());
    }

    #[test]
    fn test_aligned_set_pin_after_authentication() {
        let mut sm = session(SecurityLevel::MacEncrypt);
        sm.attach_mac(Apdu::new(0x84, 0x82, 0x03, 0x00).with_data(hex!("FE0B567D172AA801"))).unwrap();

        let set_pin = sm.protect(Apdu::new(0x84, 0x04, 0x00, 0x00).with_data(*b"1234567")).unwrap();
        assert_eq!(
            set_pin.encode().unwrap().as_slice(),
            &hex!("8404000010 6DCF36320F7B71AB C82A131D308285B4"),
        );
    }

    #[test]
    fn test_decrypt_rejects_bad_prefix() {
        let sm = session(SecurityLevel::MacEncrypt);
        let mut forged = crypt::pad_iso7816(&hex!("05 31323334"));
        crypt::encrypt_cbc(sm.enc_key().as_bytes(), &[0u8; 8], &mut forged).unwrap();
        match sm.decrypt_data(&forged) {
            Err(Error::Crypto(crypt::Error::LengthPrefixMismatch { declared: 5, obtained: 4 })) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_oversized_encryption_keeps_chain() {
        let mut sm = session(SecurityLevel::MacEncrypt);
        let big = Apdu::new(0x84, 0x54, 0x00, 0x00).with_data(vec![0u8; 240]);
        assert!(sm.protect(big).is_err());
        assert_eq!(sm.icv(), &[0u8; 8]);

        let largest = Apdu::new(0x84, 0x54, 0x00, 0x00).with_data(vec![0u8; 239]);
        let largest = sm.protect(largest).unwrap();
        assert_eq!(largest.length_byte().unwrap(), 0xF8);
    }
}
