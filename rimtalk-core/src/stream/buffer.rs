//! Newline framing over an arbitrarily chunked byte stream

use std::mem;

/// Reassembles newline-delimited lines from deliveries whose boundaries
/// can fall anywhere, including inside a multi-byte UTF-8 sequence.
///
/// Bytes of an incomplete UTF-8 sequence and the text of an unterminated
/// line are carried over to the next [`push`](LineBuffer::push).
#[derive(Debug, Default)]
pub struct LineBuffer {
    /// Undecoded tail: the start of a UTF-8 sequence cut by a delivery
    utf8_tail: Vec<u8>,
    /// Decoded text after the last newline seen so far
    partial: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delivery and return every line it completed, in order.
    ///
    /// Empty lines are dropped. Lines are returned without the `\n` and
    /// without any other trimming.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        if data.is_empty() {
            return Vec::new();
        }

        self.decode_into_partial(data);

        let Some(last_newline) = self.partial.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.partial.split_off(last_newline + 1);
        let complete = mem::replace(&mut self.partial, rest);

        complete
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Flush whatever unterminated text remains once the stream has ended
    pub fn finish(&mut self) -> Option<String> {
        if !self.utf8_tail.is_empty() {
            let tail = mem::take(&mut self.utf8_tail);
            self.partial.push_str(&String::from_utf8_lossy(&tail));
        }

        let rest = mem::take(&mut self.partial);
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    /// Text held back waiting for a newline
    pub fn pending(&self) -> &str {
        &self.partial
    }

    fn decode_into_partial(&mut self, data: &[u8]) {
        self.utf8_tail.extend_from_slice(data);

        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.utf8_tail[consumed..]) {
                Ok(text) => {
                    self.partial.push_str(text);
                    consumed = self.utf8_tail.len();
                    break;
                }
                Err(e) => {
                    let valid_up_to = consumed + e.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&self.utf8_tail[consumed..valid_up_to]) {
                        self.partial.push_str(valid);
                    }

                    match e.error_len() {
                        // Invalid sequence: substitute and keep going
                        Some(len) => {
                            self.partial.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_up_to + len;
                        }
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            consumed = valid_up_to;
                            break;
                        }
                    }
                }
            }
        }

        self.utf8_tail.drain(..consumed);
    }
}
