//! Incremental MJPEG frame delimiting.
//!
//! The stream is a plain concatenation of JPEG images; each frame runs
//! from a start-of-image marker (`FF D8`) to the next end-of-image marker
//! (`FF D9`) inclusive. Bytes outside a frame are discarded.

use bytes::{Buf, Bytes, BytesMut};
use tracing::warn;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Splits an arbitrary chunking of an MJPEG byte stream into whole frames.
#[derive(Debug)]
pub struct MjpegSplitter {
    buf: BytesMut,
    in_frame: bool,
    /// Where to resume the end-marker search inside `buf`.
    scan_from: usize,
    max_frame: usize,
}

impl MjpegSplitter {
    /// A frame larger than `max_frame` bytes is dropped and the splitter resyncs.
    pub fn new(max_frame: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(64 * 1024),
            in_frame: false,
            scan_from: 0,
            max_frame,
        }
    }

    /// Feed the next chunk; returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            if !self.in_frame {
                match find_marker(&self.buf, SOI, 0) {
                    Some(start) => {
                        self.buf.advance(start);
                        self.in_frame = true;
                        self.scan_from = SOI.len();
                    }
                    None => {
                        // A trailing FF may be the first half of the next SOI.
                        let keep = usize::from(self.buf.last() == Some(&0xFF));
                        let junk = self.buf.len() - keep;
                        self.buf.advance(junk);
                        break;
                    }
                }
            }

            match find_marker(&self.buf, EOI, self.scan_from) {
                Some(end) => {
                    frames.push(self.buf.split_to(end + EOI.len()).freeze());
                    self.in_frame = false;
                    self.scan_from = 0;
                }
                None => {
                    if self.buf.len() > self.max_frame {
                        warn!(bytes = self.buf.len(), "Oversized MJPEG frame dropped");
                        self.reset();
                    } else {
                        self.scan_from = self.buf.len().saturating_sub(1).max(SOI.len());
                    }
                    break;
                }
            }
        }

        frames
    }

    /// Forget any partial frame, e.g. after the producer was replaced.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.in_frame = false;
        self.scan_from = 0;
    }
}

fn find_marker(haystack: &[u8], marker: [u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == marker)
        .map(|p| p + from)
}
