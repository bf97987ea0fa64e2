//! Structures and collaborators from ISO/IEC 7816-4.


pub mod apdu;
pub mod card;
