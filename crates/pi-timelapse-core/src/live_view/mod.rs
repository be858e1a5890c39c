//! Shared live preview over a single streaming process.

mod mjpeg;
mod stream;
mod streamer;

pub use {
    mjpeg::MjpegSplitter,
    stream::{LiveStream, StreamEvent},
    streamer::LiveViewStreamer,
};
