//! Video session: the unit of lifecycle.
//!
//! One session owns one decoder/demuxer handle, one optional scaler, the
//! sync clock and the frame slot. All decode and seek entry points take
//! `&mut self`, so the borrow checker enforces the single-producer rule
//! structurally; the consumer side goes through a cloned [`SlotConsumer`]
//! handle and may live on another thread.

use std::path::Path;
use std::sync::Arc;

use crate::clock::SyncClock;
use crate::convert::SoftwareScaler;
use crate::error::{OpenError, PlaybackError};
use crate::media::{
    rescale, DecodePoll, MediaSource, PacketEvent, PixelFormat, RawFrame, Scaler, SourceFactory,
    SourceInfo, TimeBase,
};
use crate::slot::{FrameMeta, FrameSlot, ReadyFrame};

/// Outcome of producing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// A frame was published; its corrected PTS in stream time base units.
    Published(i64),
    EndOfStream,
}

/// Outcome of a frame-accurate seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    /// The catch-up loop published a frame at this PTS.
    Positioned(i64),
    /// The stream ended before the target was reached.
    EndOfStream,
}

/// Internal result of one decode step. Carries the raw frame out of the
/// decoder together with its originating packet timestamp; publishing is a
/// separate step.
pub(crate) enum DecodeStep {
    Frame { frame: RawFrame, packet_pts: i64 },
    EndOfStream,
}

pub struct VideoSession {
    source: Box<dyn MediaSource>,
    scaler: Option<Box<dyn Scaler>>,
    clock: SyncClock,
    slot: Arc<FrameSlot>,
    time_base: TimeBase,
    video_stream: usize,
    output_format: Option<PixelFormat>,
    output_width: u32,
    output_height: u32,
    last_dts: i64,
    decoder_delay: i64,
}

impl VideoSession {
    /// Open a session over an already-opened source.
    ///
    /// `format = None` requests raw passthrough: frames are published as the
    /// decoder produced them, format left to the caller. Zero output
    /// dimensions mean "use the source dimensions".
    pub fn open(
        source: Box<dyn MediaSource>,
        format: Option<PixelFormat>,
        output_width: u32,
        output_height: u32,
    ) -> Result<Self, OpenError> {
        let scaler = format.map(|_| Box::new(SoftwareScaler::new()) as Box<dyn Scaler>);
        Self::open_inner(source, scaler, format, output_width, output_height)
    }

    /// Open with a host-provided scaler instead of the built-in software one.
    pub fn open_with_scaler(
        source: Box<dyn MediaSource>,
        scaler: Box<dyn Scaler>,
        format: PixelFormat,
        output_width: u32,
        output_height: u32,
    ) -> Result<Self, OpenError> {
        Self::open_inner(source, Some(scaler), Some(format), output_width, output_height)
    }

    /// Open a session by path through a [`SourceFactory`].
    pub fn open_path<F: SourceFactory + ?Sized>(
        factory: &F,
        path: &Path,
        format: Option<PixelFormat>,
        output_width: u32,
        output_height: u32,
    ) -> Result<Self, OpenError> {
        let source = factory.open(path)?;
        Self::open(source, format, output_width, output_height)
    }

    fn open_inner(
        source: Box<dyn MediaSource>,
        scaler: Option<Box<dyn Scaler>>,
        format: Option<PixelFormat>,
        output_width: u32,
        output_height: u32,
    ) -> Result<Self, OpenError> {
        let info = source.info().clone();
        if !info.time_base.is_valid() {
            return Err(OpenError::BadTimeBase {
                num: info.time_base.num,
                den: info.time_base.den,
            });
        }
        if info.width == 0 || info.height == 0 {
            return Err(OpenError::Source("source reports zero frame dimensions".into()));
        }

        let (output_width, output_height) = if output_width == 0 || output_height == 0 {
            (info.width, info.height)
        } else {
            (output_width, output_height)
        };

        tracing::debug!(
            width = info.width,
            height = info.height,
            output_width,
            output_height,
            ?format,
            "session opened"
        );

        Ok(Self {
            source,
            scaler,
            clock: SyncClock::new(info.time_base),
            slot: Arc::new(FrameSlot::new()),
            time_base: info.time_base,
            video_stream: info.video_stream,
            output_format: format,
            output_width,
            output_height,
            last_dts: 0,
            decoder_delay: info.decoder_delay,
        })
    }

    // ========================================================================
    // Decode Step
    // ========================================================================

    /// Decode the next video frame.
    ///
    /// Reads container packets, discarding any not belonging to the selected
    /// video stream, and drains the decoder. "Need more input" keeps the
    /// loop reading; end-of-stream terminates it. Does not touch the slot.
    pub(crate) fn decode_next(&mut self) -> Result<DecodeStep, PlaybackError> {
        loop {
            let packet = match self
                .source
                .read_packet()
                .map_err(|e| PlaybackError::Decode(e.to_string()))?
            {
                PacketEvent::Packet(packet) => packet,
                PacketEvent::EndOfStream => return Ok(DecodeStep::EndOfStream),
            };

            if packet.stream_index != self.video_stream {
                tracing::trace!(stream = packet.stream_index, "discarding non-video packet");
                continue;
            }
            let packet_pts = packet.pts.unwrap_or(0);

            self.source
                .send_packet(&packet)
                .map_err(|e| PlaybackError::Decode(e.to_string()))?;

            loop {
                match self
                    .source
                    .receive_frame()
                    .map_err(|e| PlaybackError::Decode(e.to_string()))?
                {
                    DecodePoll::Frame(frame) => {
                        self.last_dts = frame.dts;
                        return Ok(DecodeStep::Frame { frame, packet_pts });
                    }
                    DecodePoll::Again => break,
                    DecodePoll::EndOfStream => return Ok(DecodeStep::EndOfStream),
                }
            }
        }
    }

    /// Decode, timestamp, convert and publish the next frame.
    ///
    /// Blocks while the previous frame is still unreleased. Returns the
    /// published frame's corrected PTS.
    pub fn produce_next_frame(&mut self) -> Result<FrameEvent, PlaybackError> {
        match self.decode_next()? {
            DecodeStep::EndOfStream => {
                tracing::debug!("end of stream");
                Ok(FrameEvent::EndOfStream)
            }
            DecodeStep::Frame { frame, packet_pts } => {
                let pts = SyncClock::correct_pts(&frame, packet_pts);
                let delay_us = self.clock.observe(pts);
                self.publish_frame(&frame, pts, delay_us)?;
                Ok(FrameEvent::Published(pts))
            }
        }
    }

    /// Convert (if a scaler is attached) and publish one frame through the
    /// slot. Shared by normal playback and the seek catch-up loop.
    pub(crate) fn publish_frame(
        &mut self,
        frame: &RawFrame,
        pts: i64,
        delay_us: i64,
    ) -> Result<(), PlaybackError> {
        let dts = frame.dts;
        match (self.scaler.as_mut(), self.output_format) {
            (Some(scaler), Some(format)) => {
                let scaled = scaler.convert(frame, format, self.output_width, self.output_height)?;
                let meta = FrameMeta { format, pts, delay_us, dts };
                self.slot.publish(&scaled.data, scaled.width, scaled.height, meta);
            }
            _ => {
                let meta = FrameMeta { format: frame.format, pts, delay_us, dts };
                self.slot.publish(&frame.data, frame.width, frame.height, meta);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Retrieval Surface
    // ========================================================================

    /// Snapshot the current display frame. `None` until the first publish.
    pub fn retrieve_frame(&self) -> Option<ReadyFrame> {
        self.slot
            .snapshot()
            .map(|(frame, ready)| ReadyFrame::new(frame, ready, self.time_base))
    }

    /// Mark the current display frame consumed, unblocking the producer.
    pub fn release_frame(&self) {
        self.slot.release();
    }

    /// Detachable consumer handle for a renderer thread.
    pub fn consumer(&self) -> SlotConsumer {
        SlotConsumer {
            slot: self.slot.clone(),
            time_base: self.time_base,
        }
    }

    /// Change the target display dimensions for future frames only. A frame
    /// already in the slot keeps its dimensions until overwritten.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            tracing::warn!(width, height, "ignoring resize to zero dimensions");
            return;
        }
        self.output_width = width;
        self.output_height = height;
    }

    // ========================================================================
    // Timestamp Helpers
    // ========================================================================

    /// Convert milliseconds into stream time base units.
    pub fn timestamp_from_millis(&self, ms: i64) -> i64 {
        rescale(ms, TimeBase::MILLISECONDS, self.time_base)
    }

    /// Estimate the PTS reached by jumping `num_frames` forward, using the
    /// last known inter-frame delay and discounting the decoder pipeline
    /// depth.
    pub fn timestamp_from_frame_jump(&self, current_pts: i64, num_frames: i64) -> i64 {
        let delay = self.clock.last_delay();
        current_pts + num_frames * delay - self.decoder_delay * delay
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn source_info(&self) -> &SourceInfo {
        self.source.info()
    }

    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    pub fn output_dimensions(&self) -> (u32, u32) {
        (self.output_width, self.output_height)
    }

    /// DTS of the most recently decoded frame, for progress reporting.
    pub fn last_dts(&self) -> i64 {
        self.last_dts
    }

    pub(crate) fn clock(&self) -> &SyncClock {
        &self.clock
    }

    pub(crate) fn clock_mut(&mut self) -> &mut SyncClock {
        &mut self.clock
    }

    pub(crate) fn source_mut(&mut self) -> &mut dyn MediaSource {
        self.source.as_mut()
    }

    pub(crate) fn slot(&self) -> &FrameSlot {
        &self.slot
    }

    pub(crate) fn video_stream(&self) -> usize {
        self.video_stream
    }
}

impl Drop for VideoSession {
    // Dispose: drain the slot so a consumer holding only snapshots cannot
    // keep a stale ready flag alive, then drop owned handles exactly once.
    fn drop(&mut self) {
        self.slot.drain();
        tracing::debug!("session disposed");
    }
}

// ============================================================================
// Consumer Handle
// ============================================================================

/// Clonable consumer-side handle to the frame slot, safe to move to a
/// renderer thread while the session keeps producing.
#[derive(Clone)]
pub struct SlotConsumer {
    slot: Arc<FrameSlot>,
    time_base: TimeBase,
}

impl SlotConsumer {
    pub fn retrieve(&self) -> Option<ReadyFrame> {
        self.slot
            .snapshot()
            .map(|(frame, ready)| ReadyFrame::new(frame, ready, self.time_base))
    }

    pub fn release(&self) {
        self.slot.release();
    }

    pub fn is_ready(&self) -> bool {
        self.slot.is_ready()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ScriptedFrame, ScriptedSource, StubScaler};

    fn grid_session(count: usize) -> VideoSession {
        let source = ScriptedSource::grid(0, 40, count);
        VideoSession::open(Box::new(source), None, 0, 0).unwrap()
    }

    #[test]
    fn produces_frames_in_stream_order() {
        let mut session = grid_session(3);
        for expected in [0, 40, 80] {
            assert_eq!(
                session.produce_next_frame().unwrap(),
                FrameEvent::Published(expected)
            );
            let frame = session.retrieve_frame().unwrap();
            assert_eq!(frame.pts(), expected);
            assert!(frame.is_ready());
            session.release_frame();
        }
        assert_eq!(session.produce_next_frame().unwrap(), FrameEvent::EndOfStream);
    }

    #[test]
    fn discards_packets_from_other_streams() {
        let frames = vec![
            ScriptedFrame::audio(0),
            ScriptedFrame::video(0),
            ScriptedFrame::audio(10),
            ScriptedFrame::video(40),
        ];
        let source = ScriptedSource::new(frames);
        let mut session = VideoSession::open(Box::new(source), None, 0, 0).unwrap();

        assert_eq!(session.produce_next_frame().unwrap(), FrameEvent::Published(0));
        session.release_frame();
        assert_eq!(session.produce_next_frame().unwrap(), FrameEvent::Published(40));
        session.release_frame();
        assert_eq!(session.produce_next_frame().unwrap(), FrameEvent::EndOfStream);
    }

    #[test]
    fn retrieve_before_first_publish_is_none() {
        let session = grid_session(1);
        assert!(session.retrieve_frame().is_none());
    }

    #[test]
    fn progress_fields_derive_from_time_base() {
        // 1/12800 time base, pts 64000 -> 5000 ms
        let source = ScriptedSource::grid(64_000, 512, 1).with_time_base(TimeBase::new(1, 12_800));
        let mut session = VideoSession::open(Box::new(source), None, 0, 0).unwrap();
        session.produce_next_frame().unwrap();

        let frame = session.retrieve_frame().unwrap();
        assert_eq!(frame.progress_ms(), 5_000);
        assert_eq!(frame.dts_progress_ms(), 5_000);
        assert_eq!(session.last_dts(), 64_000);
    }

    #[test]
    fn millis_round_trip_through_progress() {
        let source = ScriptedSource::grid(0, 512, 1).with_time_base(TimeBase::new(1, 12_800));
        let session = VideoSession::open(Box::new(source), None, 0, 0).unwrap();
        let pts = session.timestamp_from_millis(5_000);
        assert_eq!(rescale(pts, session.time_base(), TimeBase::MILLISECONDS), 5_000);
    }

    #[test]
    fn resize_affects_only_future_frames() {
        let source = ScriptedSource::grid(0, 40, 2);
        let mut session = VideoSession::open_with_scaler(
            Box::new(source),
            Box::new(StubScaler),
            PixelFormat::Rgba,
            4,
            4,
        )
        .unwrap();

        session.produce_next_frame().unwrap();
        session.resize(8, 8);

        // the frame published before resize keeps its dimensions
        let before = session.retrieve_frame().unwrap();
        assert_eq!((before.width(), before.height()), (4, 4));
        drop(before);
        session.release_frame();

        session.produce_next_frame().unwrap();
        let after = session.retrieve_frame().unwrap();
        assert_eq!((after.width(), after.height()), (8, 8));
        assert_eq!(after.format(), PixelFormat::Rgba);
    }

    #[test]
    fn frame_jump_estimate_uses_delay_and_pipeline_depth() {
        let source = ScriptedSource::grid(0, 40, 3).with_decoder_delay(2);
        let mut session = VideoSession::open(Box::new(source), None, 0, 0).unwrap();
        session.produce_next_frame().unwrap();
        session.release_frame();
        session.produce_next_frame().unwrap();
        session.release_frame();
        // last_delay is now 40
        assert_eq!(session.timestamp_from_frame_jump(40, 5), 40 + 5 * 40 - 2 * 40);
    }

    #[test]
    fn decode_error_is_fatal_but_disposable() {
        let source = ScriptedSource::grid(0, 40, 2).with_decode_failure(1);
        let mut session = VideoSession::open(Box::new(source), None, 0, 0).unwrap();
        assert_eq!(session.produce_next_frame().unwrap(), FrameEvent::Published(0));
        session.release_frame();
        assert!(matches!(
            session.produce_next_frame(),
            Err(PlaybackError::Decode(_))
        ));
        drop(session); // still safely disposable
    }

    #[test]
    fn dispose_after_publish_without_release() {
        let mut session = grid_session(1);
        session.produce_next_frame().unwrap();
        // no release; drop must drain the slot and free the buffer once
        drop(session);
    }

    #[test]
    fn consumer_handle_works_across_threads() {
        let mut session = grid_session(4);
        let consumer = session.consumer();

        let handle = std::thread::spawn(move || {
            let mut seen = Vec::new();
            while seen.len() < 4 {
                if consumer.is_ready() {
                    let frame = consumer.retrieve().unwrap();
                    seen.push(frame.pts());
                    drop(frame);
                    consumer.release();
                } else {
                    std::thread::yield_now();
                }
            }
            seen
        });

        for _ in 0..4 {
            session.produce_next_frame().unwrap();
        }
        assert_eq!(handle.join().unwrap(), vec![0, 40, 80, 120]);
    }

    #[test]
    fn open_rejects_invalid_time_base() {
        let source = ScriptedSource::grid(0, 40, 1).with_time_base(TimeBase::new(0, 0));
        assert!(matches!(
            VideoSession::open(Box::new(source), None, 0, 0),
            Err(OpenError::BadTimeBase { .. })
        ));
    }
}
