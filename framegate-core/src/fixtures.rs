//! Scripted media source and scaler fakes shared by the unit tests.

use crate::error::{ScaleError, SourceError};
use crate::media::{
    rescale, DecodePoll, MediaSource, Packet, PacketEvent, PixelFormat, RawFrame, ScaledFrame,
    Scaler, SourceInfo, TimeBase,
};

const FRAME_DIM: u32 = 4;

/// One scripted container packet and, for video packets, the frame it
/// decodes into.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedFrame {
    pub stream_index: usize,
    pub packet_pts: Option<i64>,
    pub frame_pts: Option<i64>,
    pub best_effort_pts: i64,
    pub dts: i64,
}

impl ScriptedFrame {
    pub fn video(pts: i64) -> Self {
        Self {
            stream_index: 0,
            packet_pts: Some(pts),
            frame_pts: Some(pts),
            best_effort_pts: pts,
            dts: pts,
        }
    }

    pub fn audio(pts: i64) -> Self {
        Self {
            stream_index: 1,
            packet_pts: Some(pts),
            frame_pts: None,
            best_effort_pts: -1,
            dts: pts,
        }
    }
}

/// Deterministic in-memory [`MediaSource`]: every video frame is a keyframe,
/// so container seeks land exactly on scripted positions.
pub(crate) struct ScriptedSource {
    info: SourceInfo,
    frames: Vec<ScriptedFrame>,
    cursor: usize,
    last_read: Option<usize>,
    pending: Option<RawFrame>,
    video_sent: usize,
    fail_decode_at: Option<usize>,
    fail_seek: bool,
}

impl ScriptedSource {
    pub fn new(frames: Vec<ScriptedFrame>) -> Self {
        let time_base = TimeBase::new(1, 1_000);
        let stream_count = frames
            .iter()
            .map(|f| f.stream_index + 1)
            .max()
            .unwrap_or(1);
        let last_pts = frames
            .iter()
            .filter(|f| f.stream_index == 0)
            .filter_map(|f| f.packet_pts)
            .last()
            .unwrap_or(0);

        Self {
            info: SourceInfo {
                time_base,
                width: FRAME_DIM,
                height: FRAME_DIM,
                video_stream: 0,
                start_time: 0,
                reported_duration_us: rescale(last_pts, time_base, TimeBase::MICROSECONDS),
                stream_count,
                decoder_delay: 0,
            },
            frames,
            cursor: 0,
            last_read: None,
            pending: None,
            video_sent: 0,
            fail_decode_at: None,
            fail_seek: false,
        }
    }

    /// A pure video stream on a regular PTS grid.
    pub fn grid(start: i64, step: i64, count: usize) -> Self {
        let frames = (0..count as i64)
            .map(|i| ScriptedFrame::video(start + i * step))
            .collect();
        Self::new(frames)
    }

    pub fn with_time_base(mut self, time_base: TimeBase) -> Self {
        let last_pts = self
            .frames
            .iter()
            .filter(|f| f.stream_index == 0)
            .filter_map(|f| f.packet_pts)
            .last()
            .unwrap_or(0);
        self.info.time_base = time_base;
        if time_base.is_valid() {
            self.info.reported_duration_us = rescale(last_pts, time_base, TimeBase::MICROSECONDS);
        }
        self
    }

    pub fn with_start_time(mut self, start_time: i64) -> Self {
        self.info.start_time = start_time;
        self
    }

    pub fn with_decoder_delay(mut self, frames: i64) -> Self {
        self.info.decoder_delay = frames;
        self
    }

    /// Fail decoding of the n-th video packet (zero-based).
    pub fn with_decode_failure(mut self, ordinal: usize) -> Self {
        self.fail_decode_at = Some(ordinal);
        self
    }

    pub fn with_seek_failure(mut self) -> Self {
        self.fail_seek = true;
        self
    }

    fn raw_frame(&self, entry: &ScriptedFrame) -> RawFrame {
        let fill = entry.packet_pts.unwrap_or(0) as u8;
        RawFrame {
            data: vec![fill; PixelFormat::Yuv420p.buffer_size(FRAME_DIM, FRAME_DIM)],
            format: PixelFormat::Yuv420p,
            width: FRAME_DIM,
            height: FRAME_DIM,
            pts: entry.frame_pts,
            best_effort_pts: entry.best_effort_pts,
            dts: entry.dts,
        }
    }

    fn video_positions(&self) -> impl Iterator<Item = (usize, i64)> + '_ {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.stream_index == self.info.video_stream)
            .filter_map(|(i, f)| f.packet_pts.map(|pts| (i, pts)))
    }
}

impl MediaSource for ScriptedSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn read_packet(&mut self) -> Result<PacketEvent, SourceError> {
        let Some(entry) = self.frames.get(self.cursor) else {
            return Ok(PacketEvent::EndOfStream);
        };
        self.last_read = Some(self.cursor);
        self.cursor += 1;
        Ok(PacketEvent::Packet(Packet {
            stream_index: entry.stream_index,
            pts: entry.packet_pts,
            dts: Some(entry.dts),
            keyframe: true,
            data: Vec::new(),
        }))
    }

    fn send_packet(&mut self, _packet: &Packet) -> Result<(), SourceError> {
        let idx = self
            .last_read
            .ok_or_else(|| SourceError::Decode("send before read".into()))?;
        let entry = self.frames[idx].clone();
        self.pending = Some(self.raw_frame(&entry));
        self.video_sent += 1;
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<DecodePoll, SourceError> {
        if self.pending.is_some() && self.fail_decode_at == Some(self.video_sent - 1) {
            self.pending = None;
            return Err(SourceError::Decode("scripted decode failure".into()));
        }
        Ok(match self.pending.take() {
            Some(frame) => DecodePoll::Frame(frame),
            None => DecodePoll::Again,
        })
    }

    fn seek(
        &mut self,
        _stream_index: usize,
        target_pts: i64,
        backward: bool,
    ) -> Result<(), SourceError> {
        if self.fail_seek {
            return Err(SourceError::Seek("scripted seek failure".into()));
        }
        let new_cursor = if backward {
            self.video_positions()
                .take_while(|&(_, pts)| pts <= target_pts)
                .last()
                .map(|(i, _)| i)
                .unwrap_or(0)
        } else {
            self.video_positions()
                .find(|&(_, pts)| pts >= target_pts)
                .map(|(i, _)| i)
                .unwrap_or(self.frames.len())
        };
        self.cursor = new_cursor;
        self.pending = None;
        Ok(())
    }

    fn flush(&mut self) {
        self.pending = None;
    }
}

/// Scaler fake: produces a packed buffer of the requested geometry without
/// touching the pixel math.
pub(crate) struct StubScaler;

impl Scaler for StubScaler {
    fn convert(
        &mut self,
        frame: &RawFrame,
        dst_format: PixelFormat,
        dst_width: u32,
        dst_height: u32,
    ) -> Result<ScaledFrame, ScaleError> {
        let fill = frame.data.first().copied().unwrap_or(0);
        Ok(ScaledFrame {
            data: vec![fill; dst_format.buffer_size(dst_width, dst_height)],
            width: dst_width,
            height: dst_height,
        })
    }
}
