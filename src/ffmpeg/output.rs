//! Bounded capture of a child's combined output
//!
//! Only the most recent `capacity` bytes are kept. ffmpeg runs with
//! `-loglevel error`, so anything captured at all is diagnostic, and the tail
//! is where the fatal message ends up.

use std::collections::VecDeque;

/// Marker prepended to a rendered tail that was cut
pub const ELLIPSIS: &str = "...";

#[derive(Debug)]
pub struct TailBuffer {
    bytes: VecDeque<u8>,
    capacity: usize,
}

impl TailBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: VecDeque::with_capacity(capacity.min(64 * 1024)),
            capacity,
        }
    }

    /// Append output, discarding the oldest bytes beyond capacity
    pub fn push(&mut self, data: &[u8]) {
        if self.capacity == 0 {
            return;
        }
        let data = if data.len() > self.capacity {
            &data[data.len() - self.capacity..]
        } else {
            data
        };
        let overflow = (self.bytes.len() + data.len()).saturating_sub(self.capacity);
        self.bytes.drain(..overflow);
        self.bytes.extend(data);
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Render at most `max` bytes of the retained output.
    ///
    /// Trailing whitespace is dropped first. When more than `max` bytes
    /// remain, the result is `...` followed by the last bytes, starting on a
    /// UTF-8 character boundary. Returns an empty string when nothing but
    /// whitespace was captured.
    pub fn tail(&self, max: usize) -> String {
        let (head, tail) = self.bytes.as_slices();
        let mut bytes = Vec::with_capacity(head.len() + tail.len());
        bytes.extend_from_slice(head);
        bytes.extend_from_slice(tail);

        let end = bytes
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map_or(0, |i| i + 1);
        let bytes = &bytes[..end];

        if bytes.len() <= max {
            return String::from_utf8_lossy(bytes).into_owned();
        }

        let mut start = bytes.len() - max;
        // skip UTF-8 continuation bytes so the cut lands on a char boundary
        while start < bytes.len() && (bytes[start] & 0b1100_0000) == 0b1000_0000 {
            start += 1;
        }
        format!("{}{}", ELLIPSIS, String::from_utf8_lossy(&bytes[start..]))
    }
}
