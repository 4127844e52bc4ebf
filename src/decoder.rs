//! Stateful UTF-8 decoding of network chunks.
//!
//! Chunk boundaries are arbitrary, so a multi-byte character may arrive in
//! two pieces. [`decode`] emits every complete character it can and returns
//! the rest as a [`Carry`] to be fed back with the next chunk.

use std::mem;

/// Bytes held back between two [`decode`] calls.
///
/// `pending` is an incomplete trailing sequence that may still become a
/// character. `malformed` collects bytes that can never decode; they are kept
/// rather than dropped or substituted, and never hold back later text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Carry {
    pending: Vec<u8>,
    malformed: Vec<u8>,
}

impl Carry {
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.malformed.is_empty()
    }

    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    pub fn malformed(&self) -> &[u8] {
        &self.malformed
    }
}

/// Decode `chunk` after whatever `carry` held back from the previous call.
pub fn decode(chunk: &[u8], carry: Carry) -> (String, Carry) {
    let Carry {
        pending: mut bytes,
        mut malformed,
    } = carry;
    bytes.extend_from_slice(chunk);

    let mut text = String::with_capacity(bytes.len());
    let mut pending = Vec::new();
    let mut rest = bytes.as_slice();

    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                text.push_str(valid);
                break;
            }
            Err(err) => {
                let (valid, tail) = rest.split_at(err.valid_up_to());
                // the prefix up to valid_up_to() always validates
                text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match err.error_len() {
                    Some(len) => {
                        malformed.extend_from_slice(&tail[..len]);
                        rest = &tail[len..];
                    }
                    None => {
                        pending.extend_from_slice(tail);
                        break;
                    }
                }
            }
        }
    }

    (text, Carry { pending, malformed })
}

/// Owns the carry for one response body.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    carry: Carry,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        let (text, carry) = decode(chunk, mem::take(&mut self.carry));
        self.carry = carry;
        text
    }

    pub fn carry(&self) -> &Carry {
        &self.carry
    }

    /// End of body. Returns anything that never decoded.
    pub fn finish(self) -> Carry {
        self.carry
    }
}
