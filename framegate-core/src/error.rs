//! Error taxonomy for the playback engine.
//!
//! End-of-stream is never an error here; it travels as a value
//! ([`crate::session::FrameEvent::EndOfStream`] and friends) so decode and
//! catch-up loops can terminate without unwinding.

use thiserror::Error;

use crate::media::PixelFormat;

/// Failures while opening a media source. Fatal: no partial session is
/// retained.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("no video stream found")]
    NoVideoStream,
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),
    #[error("invalid stream time base {num}/{den}")]
    BadTimeBase { num: i32, den: i32 },
    #[error("failed to open media source: {0}")]
    Source(String),
}

/// Failures reported by the external decoder/demuxer at its interface
/// boundary.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("packet read failed: {0}")]
    Read(String),
    #[error("decoder rejected input: {0}")]
    Decode(String),
    #[error("container refused seek: {0}")]
    Seek(String),
}

/// Failures during frame production or seeking.
///
/// `Decode` leaves the session unusable for further decode (it remains safely
/// disposable); `Seek` is recoverable and leaves the pre-seek state intact.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("unrecoverable decode failure: {0}")]
    Decode(String),
    #[error("seek failed: {0}")]
    Seek(String),
    #[error(transparent)]
    Scale(#[from] ScaleError),
}

/// Failures during pixel format conversion.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("unsupported conversion: {src:?} -> {dst:?}")]
    Unsupported { src: PixelFormat, dst: PixelFormat },
    #[error("source buffer too small: expected {expected} bytes, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },
}

/// Failures during a one-shot metadata query.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error("end-of-stream probe failed: {0}")]
    Probe(#[from] PlaybackError),
}
