//! Session key derivation.


use tracing::instrument;
use zeroize::Zeroizing;

use crate::crypt::{encrypt_ecb, Error};
use crate::keys::{SessionKey, StaticKey, STATIC_KEY_LENGTH};


/// Length of the host and card challenges.
pub const CHALLENGE_LENGTH: usize = 8;


/// Interleaves the challenges into the derivation block:
/// ```plain
/// cardChallenge[4..8] ‖ hostChallenge[0..4] ‖ cardChallenge[0..4] ‖ hostChallenge[4..8]
/// ```
pub fn derivation_data(
    host_challenge: &[u8; CHALLENGE_LENGTH],
    card_challenge: &[u8; CHALLENGE_LENGTH],
) -> [u8; STATIC_KEY_LENGTH] {
    let mut data = [0u8; STATIC_KEY_LENGTH];
    data[0..4].copy_from_slice(&card_challenge[4..8]);
    data[4..8].copy_from_slice(&host_challenge[0..4]);
    data[8..12].copy_from_slice(&card_challenge[0..4]);
    data[12..16].copy_from_slice(&host_challenge[4..8]);
    data
}


/// Derives a session key by encrypting the derivation block in ECB mode under the long-term key.
#[instrument(skip_all)]
pub fn derive_session_key(
    static_key: &StaticKey,
    host_challenge: &[u8; CHALLENGE_LENGTH],
    card_challenge: &[u8; CHALLENGE_LENGTH],
) -> Result<SessionKey, Error> {
    let mut block = Zeroizing::new(derivation_data(host_challenge, card_challenge));
    encrypt_ecb(static_key.as_bytes(), &mut block[..])?;
    Ok(SessionKey::from_double_length(&block))
}


#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::{derivation_data, derive_session_key};
    use crate::keys::StaticKey;

    const HOST: [u8; 8] = hex!("0001020304050607");
    const CARD: [u8; 8] = hex!("1122334455667788");

    #[test]
    fn test_interleave_order() {
        assert_eq!(derivation_data(&HOST, &CARD), hex!("55667788000102031122334404050607"));
    }

    #[test]
    fn test_known_session_keys() {
        let auth = StaticKey::new(hex!("404142434445464748494A4B4C4D4E4F"));
        let mac = StaticKey::new(hex!("505152535455565758595A5B5C5D5E5F"));

        let s_enc = derive_session_key(&auth, &HOST, &CARD).unwrap();
        assert_eq!(s_enc.as_bytes(), &hex!("E5C73B9901753A708167AB115C445B81 E5C73B9901753A70"));

        let s_mac = derive_session_key(&mac, &HOST, &CARD).unwrap();
        assert_eq!(&s_mac.as_bytes()[..16], &hex!("CAF51BA293969ED8F3A9375083B9BA86"));
    }

    #[test]
    fn test_swapped_challenges_differ() {
        let auth = StaticKey::new(hex!("404142434445464748494A4B4C4D4E4F"));
        let a = derive_session_key(&auth, &HOST, &CARD).unwrap();
        let b = derive_session_key(&auth, &CARD, &HOST).unwrap();
        assert_ne!(a, b);
        assert_eq!(&b.as_bytes()[..16], &hex!("87EC122C1D7E606E8BDE2984B1C7A6DC"));
    }
}
