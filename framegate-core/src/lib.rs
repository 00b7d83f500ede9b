//! # Framegate Core
//!
//! Frame synchronization and hand-off engine for video playback.
//!
//! Turns the irregular, bursty output of an external decoder into a steady,
//! host-consumable stream of display-ready frames: one decoded frame in
//! flight, one display frame in flight, nothing queued in between. Seeking
//! decodes forward from the nearest keyframe until the requested position is
//! reached, so the frame handed out after a seek is always the right one.

// ============================================================================
// External Collaborator Interfaces
// ============================================================================
pub mod media;

// ============================================================================
// Core Engine
// ============================================================================
pub mod clock;
pub mod session;
pub mod slot;

// Seek + end-of-stream probe (second `impl VideoSession` block)
mod seek;

// ============================================================================
// Support
// ============================================================================
pub mod convert;
pub mod error;
pub mod metadata;

#[cfg(test)]
pub(crate) mod fixtures;

pub use clock::SyncClock;
pub use convert::SoftwareScaler;
pub use error::{MetadataError, OpenError, PlaybackError, ScaleError, SourceError};
pub use media::{
    DecodePoll, MediaSource, Packet, PacketEvent, PixelFormat, RawFrame, ScaledFrame, Scaler,
    SourceFactory, SourceInfo, TimeBase,
};
pub use metadata::{query_metadata, Metadata};
pub use session::{FrameEvent, SeekOutcome, SlotConsumer, VideoSession};
pub use slot::{FrameMeta, FrameSlot, ReadyFrame};

// ============================================================================
// Version
// ============================================================================
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
