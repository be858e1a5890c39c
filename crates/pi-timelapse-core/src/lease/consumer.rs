use std::fmt;

/// Parties that may hold the camera device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Consumer {
    /// The timed frame loop of a capture session.
    Capture,
    /// The shared MJPEG live-view process.
    LiveView,
    /// A one-off still capture.
    Still,
}

impl fmt::Display for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Consumer::Capture => "capture",
            Consumer::LiveView => "live-view",
            Consumer::Still => "still",
        };
        f.write_str(name)
    }
}
