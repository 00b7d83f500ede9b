//! Built-in software pixel format conversion.
//!
//! Decoders output planar YUV; hosts want packed RGB. This module provides a
//! CPU fallback [`Scaler`] so the engine is usable without a host-provided
//! one: BT.709 YUV 4:2:0 to the packed formats, nearest-neighbor resampling
//! when the output dimensions differ.

use crate::error::ScaleError;
use crate::media::{PixelFormat, RawFrame, ScaledFrame, Scaler};

/// BT.709 YUV -> RGB, full range.
///
/// R = Y + 1.5748 (V-128)
/// G = Y - 0.1873 (U-128) - 0.4681 (V-128)
/// B = Y + 1.8556 (U-128)
const CR_R: f32 = 1.5748;
const CB_G: f32 = -0.1873;
const CR_G: f32 = -0.4681;
const CB_B: f32 = 1.8556;

pub struct SoftwareScaler;

impl SoftwareScaler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SoftwareScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scaler for SoftwareScaler {
    fn convert(
        &mut self,
        frame: &RawFrame,
        dst_format: PixelFormat,
        dst_width: u32,
        dst_height: u32,
    ) -> Result<ScaledFrame, ScaleError> {
        let expected = frame.format.buffer_size(frame.width, frame.height);
        if frame.data.len() < expected {
            return Err(ScaleError::ShortBuffer {
                expected,
                actual: frame.data.len(),
            });
        }

        let same_geometry = frame.width == dst_width && frame.height == dst_height;
        match (frame.format, dst_format) {
            (src, dst) if src == dst && same_geometry => Ok(ScaledFrame {
                data: frame.data[..expected].to_vec(),
                width: dst_width,
                height: dst_height,
            }),
            (PixelFormat::Yuv420p, dst) if dst.is_packed_rgb() => {
                Ok(yuv420p_to_packed(frame, dst, dst_width, dst_height))
            }
            (PixelFormat::Yuv420p, PixelFormat::Gray8a) => {
                Ok(yuv420p_to_gray8a(frame, dst_width, dst_height))
            }
            (src, dst) => Err(ScaleError::Unsupported { src, dst }),
        }
    }
}

/// Byte offsets of (r, g, b, a) within one pixel of a packed format.
fn channel_offsets(format: PixelFormat) -> [usize; 4] {
    match format {
        PixelFormat::Rgba => [0, 1, 2, 3],
        PixelFormat::Bgra => [2, 1, 0, 3],
        PixelFormat::Argb => [1, 2, 3, 0],
        PixelFormat::Abgr => [3, 2, 1, 0],
        // callers guarantee a packed format
        _ => [0, 1, 2, 3],
    }
}

struct Yuv420View<'a> {
    y: &'a [u8],
    u: &'a [u8],
    v: &'a [u8],
    width: usize,
    height: usize,
}

impl<'a> Yuv420View<'a> {
    fn new(frame: &'a RawFrame) -> Self {
        let w = frame.width as usize;
        let h = frame.height as usize;
        let y_size = w * h;
        let c_size = (w / 2) * (h / 2);
        Self {
            y: &frame.data[..y_size],
            u: &frame.data[y_size..y_size + c_size],
            v: &frame.data[y_size + c_size..y_size + 2 * c_size],
            width: w,
            height: h,
        }
    }

    fn sample(&self, x: usize, y: usize) -> (f32, f32, f32) {
        let luma = self.y[y * self.width + x] as f32;
        let ci = (y / 2) * (self.width / 2) + x / 2;
        let cb = self.u[ci] as f32 - 128.0;
        let cr = self.v[ci] as f32 - 128.0;
        (luma, cb, cr)
    }
}

fn yuv420p_to_packed(
    frame: &RawFrame,
    dst_format: PixelFormat,
    dst_width: u32,
    dst_height: u32,
) -> ScaledFrame {
    let src = Yuv420View::new(frame);
    let [ro, go, bo, ao] = channel_offsets(dst_format);
    let dw = dst_width as usize;
    let dh = dst_height as usize;
    let mut out = vec![0u8; dw * dh * 4];

    for dy in 0..dh {
        let sy = dy * src.height / dh;
        for dx in 0..dw {
            let sx = dx * src.width / dw;
            let (luma, cb, cr) = src.sample(sx, sy);

            let r = luma + CR_R * cr;
            let g = luma + CB_G * cb + CR_G * cr;
            let b = luma + CB_B * cb;

            let px = &mut out[(dy * dw + dx) * 4..(dy * dw + dx) * 4 + 4];
            px[ro] = clamp_u8(r);
            px[go] = clamp_u8(g);
            px[bo] = clamp_u8(b);
            px[ao] = 255;
        }
    }

    ScaledFrame {
        data: out,
        width: dst_width,
        height: dst_height,
    }
}

fn yuv420p_to_gray8a(frame: &RawFrame, dst_width: u32, dst_height: u32) -> ScaledFrame {
    let src = Yuv420View::new(frame);
    let dw = dst_width as usize;
    let dh = dst_height as usize;
    let mut out = vec![0u8; dw * dh * 2];

    for dy in 0..dh {
        let sy = dy * src.height / dh;
        for dx in 0..dw {
            let sx = dx * src.width / dw;
            let idx = (dy * dw + dx) * 2;
            out[idx] = src.y[sy * src.width + sx];
            out[idx + 1] = 255;
        }
    }

    ScaledFrame {
        data: out,
        width: dst_width,
        height: dst_height,
    }
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// ============================================================================
// Tests
// ============================================================================
