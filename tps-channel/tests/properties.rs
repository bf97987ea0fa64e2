use hex_literal::hex;
use proptest::prelude::*;
use tps_channel::channel::SecureChannel;
use tps_channel::config::ChannelConfig;
use tps_channel::iso7816::apdu::Apdu;
use tps_channel::iso7816::card::{CommunicationError, Transport};
use tps_channel::keys::{SessionKey, StaticKey, StaticKeySet};
use tps_channel::secure_messaging::{SecureMessaging, SecurityLevel};


const INITIALIZE_UPDATE_RESPONSE: [u8; 30] = hex!("00000000000000000000 0101 1122334455667788 0B6C51D99749F55F 9000");
const HOST_CHALLENGE: [u8; 8] = hex!("0001020304050607");


/// A fake card that accepts any MAC and serves objects out of a single backing store.
///
/// Writes land in the store, reads are answered from it.
struct ObjectStoreCard {
    store: Vec<u8>,
    write_chunks: Vec<usize>,
    read_chunks: Vec<usize>,
    pending: Option<Vec<u8>>,
}
impl ObjectStoreCard {
    fn new(store: Vec<u8>) -> Self {
        Self {
            store,
            write_chunks: Vec::new(),
            read_chunks: Vec::new(),
            pending: None,
        }
    }

    fn handle(&mut self, request: &[u8]) -> Vec<u8> {
        match request.get(1) {
            Some(0x50) => INITIALIZE_UPDATE_RESPONSE.to_vec(),
            Some(0x82) => hex!("9000").to_vec(),
            Some(0x54) if request.len() >= 14 => {
                let offset = u32::from_be_bytes(request[9..13].try_into().unwrap()) as usize;
                let length = usize::from(request[13]);
                let chunk = &request[14..14 + length];
                if self.store.len() < offset + length {
                    self.store.resize(offset + length, 0x00);
                }
                self.store[offset..offset + length].copy_from_slice(chunk);
                self.write_chunks.push(length);
                hex!("9000").to_vec()
            },
            Some(0x56) if request.len() >= 14 => {
                let offset = u32::from_be_bytes(request[9..13].try_into().unwrap()) as usize;
                let length = usize::from(request[13]);
                self.read_chunks.push(length);
                let end = (offset + length).min(self.store.len());
                let mut reply = self.store[offset.min(end)..end].to_vec();
                reply.extend_from_slice(&hex!("9000"));
                reply
            },
            _ => hex!("6988").to_vec(),
        }
    }
}
impl Transport for ObjectStoreCard {
    fn send(&mut self, request: &[u8]) -> Result<(), CommunicationError> {
        let reply = self.handle(request);
        self.pending = Some(reply);
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>, CommunicationError> {
        self.pending.take().ok_or(CommunicationError::NoResponse)
    }
}


fn open_channel(store: Vec<u8>, chunk_size: usize) -> SecureChannel<ObjectStoreCard> {
    let keys = StaticKeySet::new(
        StaticKey::new(hex!("404142434445464748494A4B4C4D4E4F")),
        StaticKey::new(hex!("505152535455565758595A5B5C5D5E5F")),
        StaticKey::new(hex!("606162636465666768696A6B6C6D6E6F")),
    );
    let config = ChannelConfig::default()
        .with_max_chunk_size(chunk_size);
    let mut channel = SecureChannel::new(ObjectStoreCard::new(store), config).unwrap();
    channel.initialize_update_with_challenge(&keys, &HOST_CHALLENGE).unwrap();
    channel.external_authenticate().unwrap();
    channel
}


fn session() -> SecureMessaging {
    SecureMessaging::new(
        SessionKey::from_double_length(&hex!("E5C73B9901753A708167AB115C445B81")),
        SessionKey::from_double_length(&hex!("CAF51BA293969ED8F3A9375083B9BA86")),
        SecurityLevel::Mac,
    )
}


proptest! {
    #[test]
    fn write_object_uses_ceil_chunks(data in prop::collection::vec(any::<u8>(), 0..1000), chunk_size in 1usize..=0xD0) {
        let mut channel = open_channel(Vec::new(), chunk_size);
        channel.write_object(*b"C0\x00\x00", 0, &data).unwrap();

        let card = channel.transport();
        prop_assert_eq!(card.write_chunks.len(), data.len().div_ceil(chunk_size));
        prop_assert!(card.write_chunks.iter().all(|&c| c <= chunk_size));
        prop_assert_eq!(&card.store, &data);
    }

    #[test]
    fn read_object_reassembles(data in prop::collection::vec(any::<u8>(), 1..1000), chunk_size in 1usize..=0xD0) {
        let mut channel = open_channel(data.clone(), chunk_size);
        let read = channel.read_object(*b"C0\x00\x00", 0, data.len()).unwrap();

        prop_assert_eq!(read.as_slice(), data.as_slice());
        prop_assert_eq!(channel.transport().read_chunks.len(), data.len().div_ceil(chunk_size));
    }

    #[test]
    fn mac_chain_depends_on_order(
        first in prop::collection::vec(any::<u8>(), 0..32),
        second in prop::collection::vec(any::<u8>(), 0..32),
        tail in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 0..4),
    ) {
        prop_assume!(first != second);
        let commands = |a: &[u8], b: &[u8]| {
            let mut ret = vec![
                Apdu::new(0x84, 0x54, 0x00, 0x00).with_data(a),
                Apdu::new(0x84, 0x54, 0x00, 0x00).with_data(b),
            ];
            ret.extend(tail.iter().map(|t| Apdu::new(0x84, 0x54, 0x00, 0x00).with_data(t.as_slice())));
            ret
        };

        let mut in_order = session();
        let mut swapped = session();
        for (a, b) in commands(&first, &second).iter().zip(commands(&second, &first).iter()) {
            let mac_a = in_order.compute_mac(a).unwrap();
            let mac_b = swapped.compute_mac(b).unwrap();
            prop_assert_ne!(mac_a, mac_b);
        }
    }
}
