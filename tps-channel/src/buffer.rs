//! Owned byte buffer used as the data-interchange type of the engine.


use std::fmt;
use std::ops::{Add, AddAssign, Deref, DerefMut};

use zeroize::Zeroize;
use zeroize_derive::ZeroizeOnDrop;


/// A variable-length, owned sequence of bytes.
///
/// The storage is wiped when the buffer is dropped and when [`ByteBuffer::resize`] shrinks it, since
/// buffers routinely carry PINs and key material.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd, ZeroizeOnDrop)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
}
impl ByteBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// A buffer of `len` copies of `value`.
    pub fn filled(value: u8, len: usize) -> Self {
        Self {
            bytes: vec![value; len],
        }
    }

    pub fn as_slice(&self) -> &[u8] { self.bytes.as_slice() }
    pub fn as_mut_slice(&mut self) -> &mut [u8] { self.bytes.as_mut_slice() }

    pub fn capacity(&self) -> usize { self.bytes.capacity() }

    /// Makes room for `additional` more bytes.
    ///
    /// When the storage has to grow, the contents are copied into a fresh allocation and the old
    /// one is wiped before it is released.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.bytes.len().saturating_add(additional);
        if required <= self.bytes.capacity() {
            return;
        }
        let new_capacity = required.max(self.bytes.capacity().saturating_mul(2));
        let mut grown = Vec::with_capacity(new_capacity);
        grown.extend_from_slice(&self.bytes);
        self.bytes.zeroize();
        self.bytes = grown;
    }

    pub fn push(&mut self, byte: u8) {
        self.reserve(1);
        self.bytes.push(byte);
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.bytes.extend_from_slice(bytes);
    }

    /// Returns a copy of `len` bytes starting at `offset`, or `None` if the range does not lie
    /// within the buffer.
    pub fn substr(&self, offset: usize, len: usize) -> Option<ByteBuffer> {
        let end = offset.checked_add(len)?;
        self.bytes.get(offset..end).map(ByteBuffer::from)
    }

    /// Changes the length of the buffer, appending zero bytes or wiping and discarding the tail.
    pub fn resize(&mut self, new_len: usize) {
        if new_len < self.bytes.len() {
            self.bytes[new_len..].zeroize();
        } else {
            self.reserve(new_len - self.bytes.len());
        }
        self.bytes.resize(new_len, 0x00);
    }

    /// Overwrites the contents with zeroes and empties the buffer.
    pub fn zeroize(&mut self) {
        self.bytes.zeroize();
    }

    /// Moves the bytes out of the buffer.
    ///
    /// The returned vector is no longer wiped automatically.
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }
}
impl Zeroize for ByteBuffer {
    fn zeroize(&mut self) {
        self.bytes.zeroize();
    }
}
impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteBuffer[")?;
        for b in &self.bytes {
            write!(f, "{:02X}", b)?;
        }
        write!(f, "]")
    }
}
impl Deref for ByteBuffer {
    type Target = [u8];
    fn deref(&self) -> &Self::Target { self.bytes.as_slice() }
}
impl DerefMut for ByteBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target { self.bytes.as_mut_slice() }
}
impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] { self.bytes.as_slice() }
}
impl From<Vec<u8>> for ByteBuffer {
    fn from(value: Vec<u8>) -> Self { Self { bytes: value } }
}
impl From<&[u8]> for ByteBuffer {
    fn from(value: &[u8]) -> Self { Self { bytes: value.to_vec() } }
}
impl<const N: usize> From<[u8; N]> for ByteBuffer {
    fn from(value: [u8; N]) -> Self { Self { bytes: value.to_vec() } }
}
impl<const N: usize> From<&[u8; N]> for ByteBuffer {
    fn from(value: &[u8; N]) -> Self { Self { bytes: value.to_vec() } }
}
impl FromIterator<u8> for ByteBuffer {
    fn from_iter<T: IntoIterator<Item = u8>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let mut ret = Self::with_capacity(iter.size_hint().0);
        for byte in iter {
            ret.push(byte);
        }
        ret
    }
}
impl AddAssign<&[u8]> for ByteBuffer {
    fn add_assign(&mut self, rhs: &[u8]) {
        self.extend_from_slice(rhs);
    }
}
impl AddAssign<&ByteBuffer> for ByteBuffer {
    fn add_assign(&mut self, rhs: &ByteBuffer) {
        self.extend_from_slice(rhs.as_slice());
    }
}
impl AddAssign<u8> for ByteBuffer {
    fn add_assign(&mut self, rhs: u8) {
        self.push(rhs);
    }
}
impl Add<&[u8]> for ByteBuffer {
    type Output = ByteBuffer;
    fn add(mut self, rhs: &[u8]) -> Self::Output {
        self += rhs;
        self
    }
}
impl Add<&ByteBuffer> for ByteBuffer {
    type Output = ByteBuffer;
    fn add(mut self, rhs: &ByteBuffer) -> Self::Output {
        self += rhs;
        self
    }
}
impl Add<ByteBuffer> for ByteBuffer {
    type Output = ByteBuffer;
    fn add(mut self, rhs: ByteBuffer) -> Self::Output {
        self += &rhs;
        self
    }
}
