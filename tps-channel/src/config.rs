//! Channel configuration.


use std::fmt;

use crate::commands::MAX_CHUNK_SIZE;
use crate::secure_messaging::SecurityLevel;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ConfigError {
    ChunkSizeOutOfRange { obtained: usize, maximum: usize },
}
impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChunkSizeOutOfRange { obtained, maximum }
                => write!(f, "maximum chunk size {} out of range 1..={}", obtained, maximum),
        }
    }
}
impl std::error::Error for ConfigError {
}


#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ChannelConfig {
    /// Protection negotiated in EXTERNAL AUTHENTICATE.
    pub security_level: SecurityLevel,

    /// Key set version sent in INITIALIZE UPDATE; `0x00` selects the card's default set.
    pub key_version: u8,

    /// Key index sent in INITIALIZE UPDATE.
    pub key_index: u8,

    /// Largest data chunk per object/buffer/load command.
    pub max_chunk_size: usize,
}
impl ChannelConfig {
    pub fn with_security_level(mut self, security_level: SecurityLevel) -> Self {
        self.security_level = security_level;
        self
    }

    pub fn with_key_version(mut self, key_version: u8) -> Self {
        self.key_version = key_version;
        self
    }

    pub fn with_key_index(mut self, key_index: u8) -> Self {
        self.key_index = key_index;
        self
    }

    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chunk_size == 0 || self.max_chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::ChunkSizeOutOfRange { obtained: self.max_chunk_size, maximum: MAX_CHUNK_SIZE });
        }
        Ok(())
    }
}
impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::Mac,
            key_version: 0x00,
            key_index: 0x00,
            max_chunk_size: MAX_CHUNK_SIZE,
        }
    }
}
