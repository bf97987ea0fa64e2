//! Secure Channel and APDU engine for provisioning CoolKey-compatible smart cards.
//!
//! The engine establishes a Global-Platform-style (SCP01) secure channel with the card applet
//! (INITIALIZE UPDATE, EXTERNAL AUTHENTICATE), then issues card-management commands over it, each
//! protected by a chained triple-DES MAC and optionally by payload encryption.


pub mod buffer;
pub mod channel;
pub mod commands;
pub mod config;
pub mod crypt;
pub mod der_util;
pub mod iso7816;
pub mod keys;
pub mod response;
pub mod secure_messaging;


use std::fmt::Write;


/// Renders a buffer as a classic hexdump (offset, 16 hex bytes, printable ASCII).
pub fn hexdump(buf: &[u8]) -> String {
    let mut ret = String::new();
    let mut offset = 0;
    while offset < buf.len() {
        let _ = write!(ret, "{:08X}  ", offset);

        for i in 0..16 {
            if offset + i < buf.len() {
                let _ = write!(ret, " {:02X}", buf[offset + i]);
            } else {
                ret.push_str("   ");
            }
        }

        ret.push_str(" |");
        for i in 0..16 {
            if offset + i >= buf.len() {
                break;
            }

            let b = buf[offset + i];
            if b >= b' ' && b <= b'~' {
                ret.push(char::from(b));
            } else {
                ret.push('.');
            }
        }
        ret.push_str("|\n");

        offset += 16;
    }
    ret
}


#[cfg(test)]
mod tests {
    use super::hexdump;

    #[test]
    fn test_hexdump_layout() {
        let dump = hexdump(b"C0\x00\x01");
        assert_eq!(dump, format!("00000000   43 30 00 01{} |C0..|\n", "   ".repeat(12)));
    }

    #[test]
    fn test_hexdump_two_lines() {
        let dump = hexdump(&[0x41; 17]);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("00000010   41"));
    }
}
