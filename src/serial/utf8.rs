//! Lossy, incremental UTF-8 decoding for byte-at-a-time serial reads.
//!
//! The link hands us one byte per read, so multi-byte characters arrive split
//! across reads. Bytes are held until they form a complete character; anything
//! that can never become valid UTF-8 is dropped instead of failing the read.

/// Longest UTF-8 encoding of a single scalar value.
const MAX_CHAR_BYTES: usize = 4;

#[derive(Debug, Default)]
pub(crate) struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed one byte and return whatever text it completed (often empty).
    pub(crate) fn push(&mut self, byte: u8) -> String {
        self.pending.push(byte);
        let mut decoded = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    decoded.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    if valid > 0 {
                        if let Ok(text) = std::str::from_utf8(&self.pending[..valid]) {
                            decoded.push_str(text);
                        }
                        self.pending.drain(..valid);
                        continue;
                    }
                    match err.error_len() {
                        Some(bad) => {
                            self.pending.drain(..bad.min(self.pending.len()));
                            if self.pending.is_empty() {
                                break;
                            }
                        }
                        None => {
                            // Incomplete sequence; wait for more bytes unless it can't fit.
                            if self.pending.len() >= MAX_CHAR_BYTES {
                                self.pending.remove(0);
                                continue;
                            }
                            break;
                        }
                    }
                }
            }
        }
        decoded
    }

    /// Bytes still waiting for the rest of their character.
    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> String {
        let mut acc = Utf8Accumulator::new();
        bytes.iter().map(|b| acc.push(*b)).collect()
    }

    #[test]
    fn ascii_passes_through_one_char_per_byte() {
        let mut acc = Utf8Accumulator::new();
        assert_eq!(acc.push(b'o'), "o");
        assert_eq!(acc.push(b'k'), "k");
        assert_eq!(acc.pending_len(), 0);
    }

    #[test]
    fn reassembles_multi_byte_characters() {
        let text = "héllo ✓";
        assert_eq!(decode_all(text.as_bytes()), text);
    }

    #[test]
    fn holds_partial_sequence_until_complete() {
        let mut acc = Utf8Accumulator::new();
        let bytes = "é".as_bytes();
        assert_eq!(acc.push(bytes[0]), "");
        assert_eq!(acc.pending_len(), 1);
        assert_eq!(acc.push(bytes[1]), "é");
    }

    #[test]
    fn drops_invalid_bytes() {
        assert_eq!(decode_all(&[b'a', 0xFF, b'b', 0xC3, b'c']), "abc");
    }

    #[test]
    fn truncated_sequence_keeps_following_character() {
        let mut bytes = vec![b'a', 0xE2, 0x9C];
        bytes.extend_from_slice("é".as_bytes());
        assert_eq!(decode_all(&bytes), "aé");
    }
}
