//! Random-access seeking with frame-accurate catch-up, plus the
//! end-of-stream probe used by metadata queries.
//!
//! A coarse seek lands on a keyframe; the catch-up loop then decodes forward,
//! discarding frames, until the first frame at/after the tolerance-adjusted
//! target. The frame handed out after a precise seek is never strictly
//! before `target - last_delay/2`.

use crate::clock::SyncClock;
use crate::error::PlaybackError;
use crate::media::{rescale, TimeBase};
use crate::session::{DecodeStep, SeekOutcome, VideoSession};

impl VideoSession {
    /// Coarse seek to a position in milliseconds.
    ///
    /// The container lands on a keyframe at/before (`backward = true`) or
    /// at/after the target; decoder state is flushed. No frame is produced;
    /// playback resumes from the next normal decode. On failure the session
    /// keeps its pre-seek state and remains usable.
    pub fn seek_approx(&mut self, ms: i64, backward: bool) -> Result<(), PlaybackError> {
        let target = self.timestamp_from_millis(ms);
        self.container_seek(target, backward)?;
        tracing::debug!(ms, target, backward, "coarse seek");
        Ok(())
    }

    /// Frame-accurate seek to a PTS in stream time base units.
    ///
    /// With `backward` set, first performs a coarse backward seek to a
    /// keyframe at/before the target; otherwise the decode position is
    /// assumed to already be at/before it. Then decodes forward until the
    /// first frame whose minimally-corrected PTS reaches the half-frame
    /// tolerance window, publishes that frame, and returns its PTS.
    pub fn seek_exact(&mut self, target_pts: i64, backward: bool) -> Result<SeekOutcome, PlaybackError> {
        if backward {
            self.container_seek(target_pts, true)?;
        }
        self.catch_up(target_pts)
    }

    fn container_seek(&mut self, target_pts: i64, backward: bool) -> Result<(), PlaybackError> {
        let stream = self.video_stream();
        self.source_mut()
            .seek(stream, target_pts, backward)
            .map_err(|e| PlaybackError::Seek(e.to_string()))?;
        self.source_mut().flush();
        Ok(())
    }

    /// Decode-and-discard until the target is reached.
    ///
    /// Discarded frames only go through the minimal PTS correction; the
    /// delay-based smoothing is applied to the accepted frame alone, when it
    /// is published.
    fn catch_up(&mut self, target_pts: i64) -> Result<SeekOutcome, PlaybackError> {
        // whatever was in the slot is stale after a seek; clear its
        // readiness so the accepting publish cannot stall on it
        self.slot().release();
        loop {
            match self.decode_next()? {
                DecodeStep::EndOfStream => {
                    tracing::debug!(target_pts, "end of stream during catch-up");
                    return Ok(SeekOutcome::EndOfStream);
                }
                DecodeStep::Frame { frame, packet_pts } => {
                    let pts = SyncClock::correct_pts(&frame, packet_pts);
                    if pts >= target_pts - self.clock().half_frame_tolerance() {
                        let delay_us = self.clock_mut().observe(pts);
                        self.publish_frame(&frame, pts, delay_us)?;
                        tracing::debug!(target_pts, pts, "catch-up complete");
                        return Ok(SeekOutcome::Positioned(pts));
                    }
                    tracing::trace!(pts, target_pts, "discarding catch-up frame");
                    // drop any pending readiness so the next publish cannot
                    // stall on a frame nobody will consume
                    self.slot().release();
                }
            }
        }
    }

    /// Establish the effective stream duration in milliseconds.
    ///
    /// Containers often misreport duration, so this seeks near the reported
    /// end, then decodes forward to end-of-stream tracking the last DTS
    /// seen. Used once per metadata query, never during playback.
    pub fn probe_end_timestamp(&mut self) -> Result<i64, PlaybackError> {
        let reported_us = self.source_info().reported_duration_us;
        let target = rescale(reported_us, TimeBase::MICROSECONDS, self.time_base());
        self.container_seek(target, true)?;

        loop {
            match self.decode_next()? {
                DecodeStep::EndOfStream => {
                    let end_ms = rescale(self.last_dts(), self.time_base(), TimeBase::MILLISECONDS);
                    tracing::debug!(end_ms, "end-of-stream probe finished");
                    return Ok(end_ms);
                }
                DecodeStep::Frame { .. } => {
                    self.slot().release();
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
