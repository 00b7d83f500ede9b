//! One-shot media metadata queries.
//!
//! Opens a raw-passthrough session, probes to end-of-stream for the
//! ground-truth duration, and disposes the session before returning. Nothing
//! here is reused for playback.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MetadataError;
use crate::media::{rescale, MediaSource, SourceFactory, TimeBase};
use crate::session::VideoSession;

/// Read-only facts about a media source. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Stream start time in microseconds.
    pub start_time_us: i64,
    /// Effective duration in milliseconds, established by decoding to
    /// end-of-stream rather than trusting the container header.
    pub duration_ms: i64,
    /// Ticks per second of the stream time base.
    pub timescale: i64,
    pub width: u32,
    pub height: u32,
    pub stream_count: usize,
}

/// Query metadata for a path, opening and disposing an internal session.
pub fn query_metadata<F: SourceFactory + ?Sized>(
    factory: &F,
    path: &Path,
) -> Result<Metadata, MetadataError> {
    let source = factory.open(path)?;
    query_metadata_from(source)
}

/// Query metadata for an already-opened source. Consumes the source; the
/// end-of-stream probe leaves it useless for playback.
pub fn query_metadata_from(source: Box<dyn MediaSource>) -> Result<Metadata, MetadataError> {
    let mut session = VideoSession::open(source, None, 0, 0)?;
    let info = session.source_info().clone();
    let duration_ms = session.probe_end_timestamp()?;

    Ok(Metadata {
        start_time_us: rescale(info.start_time, info.time_base, TimeBase::MICROSECONDS),
        duration_ms,
        timescale: info.time_base.den as i64,
        width: info.width,
        height: info.height,
        stream_count: info.stream_count,
    })
}

// ============================================================================
// Tests
// ============================================================================
