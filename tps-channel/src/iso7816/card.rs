use std::fmt;

use tracing::trace;

use crate::buffer::ByteBuffer;
use crate::iso7816::apdu::{self, Apdu, Response};


#[derive(Debug)]
pub enum CommunicationError {
    Write(apdu::WriteError),
    Transport(Box<dyn std::error::Error + Send + Sync>),
    NoResponse,
    ShortResponse { obtained: ByteBuffer },
}
impl fmt::Display for CommunicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write(e) => write!(f, "APDU write error: {}", e),
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::NoResponse => write!(f, "no response from card"),
            Self::ShortResponse { obtained } => write!(f, "response too short ({} bytes)", obtained.len()),
        }
    }
}
impl std::error::Error for CommunicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Write(e) => Some(e),
            Self::Transport(e) => Some(e.as_ref()),
            Self::NoResponse => None,
            Self::ShortResponse { .. } => None,
        }
    }
}
impl From<apdu::WriteError> for CommunicationError {
    fn from(value: apdu::WriteError) -> Self { Self::Write(value) }
}


/// The connection carrying APDUs to a card and replies back.
///
/// Implementations block until the operation completes; timeouts are their own concern.
pub trait Transport {
    /// Send one encoded command APDU.
    fn send(&mut self, request: &[u8]) -> Result<(), CommunicationError>;

    /// Receive the reply to the last command, including the trailing status word.
    fn receive(&mut self) -> Result<Vec<u8>, CommunicationError>;
}
impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, request: &[u8]) -> Result<(), CommunicationError> { (**self).send(request) }
    fn receive(&mut self) -> Result<Vec<u8>, CommunicationError> { (**self).receive() }
}
impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, request: &[u8]) -> Result<(), CommunicationError> { (**self).send(request) }
    fn receive(&mut self) -> Result<Vec<u8>, CommunicationError> { (**self).receive() }
}


/// Encodes `request`, performs one round trip and splits the reply.
///
/// For sensitive requests only the header and length byte are logged.
pub fn transceive<T: Transport + ?Sized>(
    transport: &mut T,
    request: &Apdu,
    sensitive: bool,
) -> Result<Response, CommunicationError> {
    let out_buf = request.encode()?;
    if sensitive {
        trace!(header = ?request.header, length = out_buf.len(), "sending sensitive APDU to card");
    } else {
        trace!("sending to card:\n{}", crate::hexdump(&out_buf));
    }
    transport.send(&out_buf)?;

    let in_buf = ByteBuffer::from(transport.receive()?);
    trace!("received from card:\n{}", crate::hexdump(&in_buf));
    let response = Response::from_bytes(&in_buf);
    if !response.is_complete() {
        return Err(CommunicationError::ShortResponse { obtained: in_buf });
    }
    Ok(response)
}
