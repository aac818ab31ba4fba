//! Scattered byte buffers and the zero-copy parse reader.
//!
//! A [`Wire`] is an ordered sequence of [`Bytes`] segments that together
//! represent one logically contiguous byte stream. Decoding never copies
//! payload bytes: readers hand out `Bytes` views into the underlying
//! segments and only materialise a contiguous buffer when a caller asks
//! for one that spans a segment boundary.

use crate::error::Error;
use crate::Result;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// An immutable byte slice; the unit a [`Wire`] is scattered across.
pub type Buffer = Bytes;

/// A logically contiguous byte stream stored as zero or more segments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Wire(Vec<Bytes>);

impl Wire {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments(segments: Vec<Bytes>) -> Self {
        Self(segments.into_iter().filter(|s| !s.is_empty()).collect())
    }

    /// Total number of bytes across all segments.
    pub fn len(&self) -> usize {
        self.0.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, segment: Bytes) {
        if !segment.is_empty() {
            self.0.push(segment);
        }
    }

    /// Append all segments of `other`.
    pub fn extend(&mut self, other: Wire) {
        self.0.extend(other.0.into_iter().filter(|s| !s.is_empty()));
    }

    pub fn segments(&self) -> &[Bytes] {
        &self.0
    }

    /// Materialise the wire into one contiguous buffer.
    ///
    /// Free when the wire holds zero or one segment; copies otherwise.
    pub fn join(&self) -> Bytes {
        match self.0.len() {
            0 => Bytes::new(),
            1 => self.0[0].clone(),
            _ => {
                let mut out = BytesMut::with_capacity(self.len());
                for seg in &self.0 {
                    out.extend_from_slice(seg);
                }
                out.freeze()
            }
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.join().to_vec()
    }
}

impl PartialEq for Wire {
    /// Logical byte equality, independent of how the wires are segmented.
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let a = self.0.iter().flat_map(|s| s.iter());
        let b = other.0.iter().flat_map(|s| s.iter());
        a.eq(b)
    }
}

impl Eq for Wire {}

impl From<Bytes> for Wire {
    fn from(b: Bytes) -> Self {
        if b.is_empty() {
            Wire::new()
        } else {
            Wire(vec![b])
        }
    }
}

impl From<Vec<u8>> for Wire {
    fn from(v: Vec<u8>) -> Self {
        Wire::from(Bytes::from(v))
    }
}

impl From<&'static [u8]> for Wire {
    fn from(s: &'static [u8]) -> Self {
        Wire::from(Bytes::from_static(s))
    }
}

impl FromIterator<Bytes> for Wire {
    fn from_iter<I: IntoIterator<Item = Bytes>>(iter: I) -> Self {
        let mut w = Wire::new();
        for seg in iter {
            w.push(seg);
        }
        w
    }
}

/* ---------------------------------------------------------------- *
 * ParseReader
 * ---------------------------------------------------------------- */

/// A cursor over a window of a [`Wire`], supporting zero-copy slicing
/// and delegation to bounded sub-readers.
///
/// All offsets exposed by the reader ([`pos`](ParseReader::pos),
/// [`range`](ParseReader::range)) are relative to the reader's own
/// window, so a delegated sub-reader sees its slice as starting at 0.
pub struct ParseReader<'a> {
    wire: &'a Wire,
    start: usize,
    end: usize,
    pos: usize,
    seg: usize,
    off: usize,
}

impl<'a> ParseReader<'a> {
    pub fn new(wire: &'a Wire) -> Self {
        Self::window(wire, 0, wire.len())
    }

    fn window(wire: &'a Wire, start: usize, end: usize) -> Self {
        let mut r = Self {
            wire,
            start,
            end,
            pos: start,
            seg: 0,
            off: 0,
        };
        r.seek(start);
        r
    }

    /// Reposition the segment cursor at absolute offset `abs`.
    fn seek(&mut self, abs: usize) {
        self.pos = abs;
        let mut remaining = abs;
        for (i, seg) in self.wire.segments().iter().enumerate() {
            if remaining < seg.len() {
                self.seg = i;
                self.off = remaining;
                return;
            }
            remaining -= seg.len();
        }
        self.seg = self.wire.segments().len();
        self.off = 0;
    }

    /// Current position within the reader's window.
    pub fn pos(&self) -> usize {
        self.pos - self.start
    }

    /// Length of the reader's window.
    pub fn length(&self) -> usize {
        self.end - self.start
    }

    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        if self.pos >= self.end {
            return Err(Error::BufferOverflow);
        }
        let segs = self.wire.segments();
        while self.off >= segs[self.seg].len() {
            self.seg += 1;
            self.off = 0;
        }
        let b = segs[self.seg][self.off];
        self.off += 1;
        self.pos += 1;
        Ok(b)
    }

    /// Push the last read byte back; the next `read_byte` returns it again.
    pub fn unread_byte(&mut self) -> Result<()> {
        if self.pos == self.start {
            return Err(Error::Format("nothing to unread".into()));
        }
        self.seek(self.pos - 1);
        Ok(())
    }

    /// Read `n` bytes as a single buffer.
    ///
    /// Zero-copy when the span lies within one segment; otherwise the
    /// bytes are materialised into a fresh buffer.
    pub fn read(&mut self, n: usize) -> Result<Bytes> {
        if self.remaining() < n {
            return Err(Error::BufferOverflow);
        }
        let wire = self.read_wire(n)?;
        Ok(wire.join())
    }

    /// Read `n` bytes as a zero-copy wire view, advancing the cursor.
    pub fn read_wire(&mut self, n: usize) -> Result<Wire> {
        if self.remaining() < n {
            return Err(Error::BufferOverflow);
        }
        let mut out = Wire::new();
        let segs = self.wire.segments();
        let mut need = n;
        while need > 0 {
            while self.off >= segs[self.seg].len() {
                self.seg += 1;
                self.off = 0;
            }
            let seg = &segs[self.seg];
            let take = need.min(seg.len() - self.off);
            out.push(seg.slice(self.off..self.off + take));
            self.off += take;
            self.pos += take;
            need -= take;
        }
        Ok(out)
    }

    /// A zero-copy wire over window offsets `[a, b)`; the cursor is not
    /// moved. Out-of-window bounds are clamped.
    pub fn range(&self, a: usize, b: usize) -> Wire {
        let abs_a = (self.start + a).min(self.end);
        let abs_b = (self.start + b).min(self.end);
        if abs_a >= abs_b {
            return Wire::new();
        }
        let mut out = Wire::new();
        let mut seg_start = 0;
        for seg in self.wire.segments() {
            let seg_end = seg_start + seg.len();
            if seg_end > abs_a && seg_start < abs_b {
                let from = abs_a.saturating_sub(seg_start);
                let to = (abs_b - seg_start).min(seg.len());
                out.push(seg.slice(from..to));
            }
            seg_start = seg_end;
            if seg_start >= abs_b {
                break;
            }
        }
        out
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(Error::BufferOverflow);
        }
        self.seek(self.pos + n);
        Ok(())
    }

    /// Split off a sub-reader over the next `l` bytes and advance past
    /// them. The sub-reader's cursor is independent of this reader's.
    pub fn delegate(&mut self, l: usize) -> Result<ParseReader<'a>> {
        if self.remaining() < l {
            return Err(Error::BufferOverflow);
        }
        let child = ParseReader::window(self.wire, self.pos, self.pos + l);
        self.seek(self.pos + l);
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scattered() -> Wire {
        Wire::from_segments(vec![
            Bytes::from_static(b"abc"),
            Bytes::from_static(b"defg"),
            Bytes::from_static(b"hij"),
        ])
    }

    #[test]
    fn join_equals_concat() {
        let w = scattered();
        assert_eq!(w.len(), 10);
        assert_eq!(&w.join()[..], b"abcdefghij");
    }

    #[test]
    fn logical_equality_ignores_segmentation() {
        let a = scattered();
        let b = Wire::from(Bytes::from_static(b"abcdefghij"));
        assert_eq!(a, b);
        assert_ne!(a, Wire::from(Bytes::from_static(b"abcdefghix")));
    }

    #[test]
    fn range_join_is_slice_of_join() {
        let w = scattered();
        let joined = w.join();
        let reader = ParseReader::new(&w);
        for a in 0..w.len() {
            for b in a..=w.len() {
                assert_eq!(&reader.range(a, b).join()[..], &joined[a..b]);
            }
        }
    }

    #[test]
    fn read_across_segments() {
        let w = scattered();
        let mut reader = ParseReader::new(&w);
        assert_eq!(reader.read_byte().unwrap(), b'a');
        let chunk = reader.read(4).unwrap();
        assert_eq!(&chunk[..], b"bcde");
        assert_eq!(reader.pos(), 5);

        let rest = reader.read_wire(5).unwrap();
        assert_eq!(&rest.join()[..], b"fghij");
        assert!(matches!(reader.read_byte(), Err(Error::BufferOverflow)));
    }

    #[test]
    fn unread_byte_restores_cursor() {
        let w = scattered();
        let mut reader = ParseReader::new(&w);
        assert!(reader.unread_byte().is_err());
        assert_eq!(reader.read_byte().unwrap(), b'a');
        reader.unread_byte().unwrap();
        assert_eq!(reader.read_byte().unwrap(), b'a');
    }

    #[test]
    fn delegate_is_bounded_and_independent() {
        let w = scattered();
        let mut parent = ParseReader::new(&w);
        parent.skip(2).unwrap();

        let mut child = parent.delegate(5).unwrap();
        assert_eq!(parent.pos(), 7);
        assert_eq!(child.pos(), 0);
        assert_eq!(child.length(), 5);
        assert_eq!(&child.read(5).unwrap()[..], b"cdefg");
        assert!(matches!(child.read_byte(), Err(Error::BufferOverflow)));

        // Parent cursor was not affected by the child's reads.
        assert_eq!(parent.read_byte().unwrap(), b'h');
    }

    #[test]
    fn overflow_reported() {
        let w = scattered();
        let mut reader = ParseReader::new(&w);
        assert!(matches!(reader.read(11), Err(Error::BufferOverflow)));
        assert!(matches!(reader.skip(11), Err(Error::BufferOverflow)));
        assert!(matches!(reader.delegate(11), Err(Error::BufferOverflow)));
    }
}
