//! External collaborator interfaces: demuxing, decoding and scaling live
//! outside this crate. The engine consumes them through the traits below and
//! never assumes anything about the container or codec behind them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OpenError, ScaleError, SourceError};

// ============================================================================
// Time Base
// ============================================================================

/// Rational time base: an integer timestamp `t` in this base represents
/// `t * num / den` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    /// Fixed microsecond base used for host-facing delays.
    pub const MICROSECONDS: TimeBase = TimeBase::new(1, 1_000_000);
    /// Fixed millisecond base used for progress reporting.
    pub const MILLISECONDS: TimeBase = TimeBase::new(1, 1_000);

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }
}

/// Rescale `value` from one time base into another, rounding to nearest.
///
/// Intermediate math is done in i128 so pathological time bases cannot
/// overflow.
pub fn rescale(value: i64, from: TimeBase, to: TimeBase) -> i64 {
    let num = value as i128 * from.num as i128 * to.den as i128;
    let den = from.den as i128 * to.num as i128;
    let half = den / 2;
    let rounded = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };
    rounded as i64
}

// ============================================================================
// Pixel Formats
// ============================================================================

/// Host-facing pixel formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgba,
    Bgra,
    Argb,
    Abgr,
    Yuv420p,
    Gray8a,
    Gray16le,
}

impl PixelFormat {
    /// Byte size of one frame in this format.
    pub fn buffer_size(&self, width: u32, height: u32) -> usize {
        let w = width as usize;
        let h = height as usize;
        match self {
            Self::Rgba | Self::Bgra | Self::Argb | Self::Abgr => w * h * 4,
            Self::Yuv420p => w * h * 3 / 2,
            Self::Gray8a | Self::Gray16le => w * h * 2,
        }
    }

    pub fn is_packed_rgb(&self) -> bool {
        matches!(self, Self::Rgba | Self::Bgra | Self::Argb | Self::Abgr)
    }
}

// ============================================================================
// Packets and Frames
// ============================================================================

/// One compressed packet as read from the container.
#[derive(Debug, Clone)]
pub struct Packet {
    pub stream_index: usize,
    /// Presentation timestamp in stream time base units, if the container
    /// knows it.
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub keyframe: bool,
    pub data: Vec<u8>,
}

/// One raw decoded frame as produced by the external decoder.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Presentation timestamp in stream time base units. `None` when the
    /// decoder could not recover one.
    pub pts: Option<i64>,
    /// Decoder best-effort timestamp estimate; may be negative when the
    /// decoder has no estimate either.
    pub best_effort_pts: i64,
    /// Decode timestamp of the originating packet.
    pub dts: i64,
}

/// Result of reading one packet from the container.
#[derive(Debug)]
pub enum PacketEvent {
    Packet(Packet),
    EndOfStream,
}

/// Result of polling the decoder for a frame.
///
/// `Again` is the transient "need more input" condition and is distinct from
/// `EndOfStream`, which is terminal.
#[derive(Debug)]
pub enum DecodePoll {
    Frame(RawFrame),
    Again,
    EndOfStream,
}

/// Static facts a source publishes once on open.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub time_base: TimeBase,
    pub width: u32,
    pub height: u32,
    /// Index of the selected video stream; packets from other streams are
    /// discarded by the decode loop.
    pub video_stream: usize,
    /// Stream start time in stream time base units.
    pub start_time: i64,
    /// Container-reported duration in microseconds. Often wrong; the
    /// end-of-stream probe establishes ground truth.
    pub reported_duration_us: i64,
    pub stream_count: usize,
    /// Codec pipeline depth in frames, used for frame-jump estimation.
    pub decoder_delay: i64,
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Combined demuxer + decoder handle.
///
/// The engine drives this from a single logical actor, so implementations
/// need no internal locking. Send/receive follows the usual push-pull codec
/// shape: feed a packet, then drain zero or more frames.
pub trait MediaSource: Send {
    fn info(&self) -> &SourceInfo;

    /// Read the next packet from the container, any stream.
    fn read_packet(&mut self) -> Result<PacketEvent, SourceError>;

    /// Feed one video packet to the decoder.
    fn send_packet(&mut self, packet: &Packet) -> Result<(), SourceError>;

    /// Poll the decoder for the next decoded frame.
    fn receive_frame(&mut self) -> Result<DecodePoll, SourceError>;

    /// Container-level seek. `backward` selects the keyframe at/before the
    /// target rather than at/after it.
    fn seek(&mut self, stream_index: usize, target_pts: i64, backward: bool)
        -> Result<(), SourceError>;

    /// Drop all decoder-internal state (call after a container seek).
    fn flush(&mut self);
}

/// Opens sources by path, so hosts can plug in whatever demuxer/decoder
/// stack they carry.
pub trait SourceFactory {
    fn open(&self, path: &Path) -> Result<Box<dyn MediaSource>, OpenError>;
}

/// A converted, display-ready image.
#[derive(Debug, Clone)]
pub struct ScaledFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Pixel format / size converter. Implementations are expected to cache
/// whatever per-geometry state they need across calls.
pub trait Scaler: Send {
    fn convert(
        &mut self,
        frame: &RawFrame,
        dst_format: PixelFormat,
        dst_width: u32,
        dst_height: u32,
    ) -> Result<ScaledFrame, ScaleError>;
}

// ============================================================================
// Tests
// ============================================================================
