//! Framing codec for the port 9999 protocol.
//!
//! Every message on the wire is a 4-byte big-endian signed length followed by
//! the payload run through an XOR autokey stream: the key starts at 171 and
//! each emitted ciphertext byte becomes the key for the next byte.
//!
//! This is obfuscation, not encryption. The keystream depends only on the
//! previous ciphertext byte and a fixed seed, so anyone who can see the
//! traffic can read it, and messages sharing a prefix share a ciphertext
//! prefix.

use crate::error::Error;

/// Initial key for the XOR autokey stream.
const INITIAL_KEY: u8 = 171;

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 4;

/// Largest payload the signed 32-bit length prefix can describe.
pub const MAX_PAYLOAD_LEN: usize = i32::MAX as usize;

/// Checks that a payload of `len` bytes fits the length prefix.
///
/// # Errors
///
/// [`Error::PayloadTooLarge`] above [`MAX_PAYLOAD_LEN`].
pub fn check_payload_len(len: usize) -> Result<(), Error> {
    if len > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLarge(len));
    }
    Ok(())
}

/// Frames a plaintext payload for the wire.
///
/// Payloads longer than [`MAX_PAYLOAD_LEN`] cannot be framed; callers
/// holding untrusted input should go through [`check_payload_len`] first.
///
/// # Example
///
/// ```
/// use plinky_core::codec::encode;
///
/// let command = br#"{"system":{"get_sysinfo":{}}}"#;
/// let framed = encode(command);
///
/// // First 4 bytes are the length header
/// assert_eq!(framed.len(), 4 + command.len());
/// assert_eq!(&framed[..4], &(command.len() as i32).to_be_bytes());
/// ```
pub fn encode(plaintext: &[u8]) -> Vec<u8> {
    debug_assert!(plaintext.len() <= MAX_PAYLOAD_LEN);
    let mut key = INITIAL_KEY;
    let len = i32::try_from(plaintext.len()).unwrap_or(i32::MAX);

    let mut result = Vec::with_capacity(HEADER_LEN + plaintext.len());
    result.extend_from_slice(&len.to_be_bytes());

    for &byte in plaintext {
        key ^= byte;
        result.push(key);
    }

    result
}

/// Unframes a wire buffer back into its plaintext payload.
///
/// The length prefix is consumed but not enforced; every byte after it is
/// deciphered. Use [`declared_len`] to inspect the prefix.
///
/// # Errors
///
/// Returns [`Error::FrameTooShort`] if `wire` is shorter than the prefix.
///
/// # Example
///
/// ```
/// use plinky_core::codec::{decode, encode};
///
/// let original = br#"{"system":{"get_sysinfo":{}}}"#;
/// let decoded = decode(&encode(original)).unwrap();
/// assert_eq!(decoded, original);
/// ```
pub fn decode(wire: &[u8]) -> Result<Vec<u8>, Error> {
    if wire.len() < HEADER_LEN {
        return Err(Error::FrameTooShort(wire.len()));
    }
    Ok(decipher(&wire[HEADER_LEN..]))
}

/// Returns the payload length declared by a frame's prefix.
pub fn declared_len(wire: &[u8]) -> Result<i32, Error> {
    let header: [u8; HEADER_LEN] = wire
        .get(..HEADER_LEN)
        .and_then(|h| h.try_into().ok())
        .ok_or(Error::FrameTooShort(wire.len()))?;
    Ok(i32::from_be_bytes(header))
}

/// Inverts the autokey stream over a bare payload (no length prefix).
pub(crate) fn decipher(ciphertext: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    let mut result = Vec::with_capacity(ciphertext.len());

    for &byte in ciphertext {
        result.push(key ^ byte);
        key = byte;
    }

    result
}
