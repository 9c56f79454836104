//! Equirectangular -> perspective projection
//!
//! Conventions: heading 0 = north, increasing clockwise; pitch positive =
//! looking up. Headings are true-north values; the panorama's
//! `center_heading` (the bearing at the horizontal center of the tile set)
//! maps them into image longitude, applied once per call.
//!
//! The vertical field of view is derived from the output aspect ratio, so
//! a 4:3 frame at fov 90 sees 67.5 degrees vertically.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};

const JPEG_QUALITY: u8 = 90;

pub const PITCH_MIN: f64 = -85.0;
pub const PITCH_MAX: f64 = 85.0;
pub const FOV_MIN: f64 = 30.0;
pub const FOV_MAX: f64 = 100.0;

/// Errors from the projection pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to decode panorama image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode perspective image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("pitch {0} outside [{PITCH_MIN}, {PITCH_MAX}]")]
    PitchOutOfRange(f64),

    #[error("fov {0} outside [{FOV_MIN}, {FOV_MAX}]")]
    FovOutOfRange(f64),

    #[error("output size {0}x{1} must be non-zero")]
    EmptyOutput(u32, u32),
}

/// Camera parameters for one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    /// True-north heading in degrees, [0, 360).
    pub heading: f64,
    /// Pitch in degrees, positive up, [-85, 85].
    pub pitch: f64,
    /// Horizontal field of view in degrees, [30, 100].
    pub fov: f64,
    /// Bearing at the horizontal center of the panorama image.
    pub center_heading: f64,
    /// Output size in pixels.
    pub width: u32,
    pub height: u32,
}

/// Project an equirectangular JPEG into a perspective JPEG.
pub fn render_perspective(equirect_jpeg: &[u8], view: &ViewParams) -> Result<Vec<u8>, RenderError> {
    if !(PITCH_MIN..=PITCH_MAX).contains(&view.pitch) {
        return Err(RenderError::PitchOutOfRange(view.pitch));
    }
    if !(FOV_MIN..=FOV_MAX).contains(&view.fov) {
        return Err(RenderError::FovOutOfRange(view.fov));
    }
    if view.width == 0 || view.height == 0 {
        return Err(RenderError::EmptyOutput(view.width, view.height));
    }

    let pano = image::load_from_memory_with_format(equirect_jpeg, ImageFormat::Jpeg)
        .map_err(RenderError::Decode)?
        .to_rgb8();

    let out = project(&pano, view);

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut bytes), JPEG_QUALITY);
    out.write_with_encoder(encoder).map_err(RenderError::Encode)?;
    Ok(bytes)
}

fn project(pano: &RgbImage, view: &ViewParams) -> RgbImage {
    let (out_w, out_h) = (view.width, view.height);
    let aspect = out_w as f64 / out_h as f64;
    let h_fov = view.fov.to_radians();
    let v_fov = (view.fov / aspect).to_radians();

    // Image longitude of the view direction: true-north heading shifted by
    // the bearing sitting at the image center.
    let yaw = (view.heading - view.center_heading).to_radians();
    let pitch = view.pitch.to_radians();

    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    let (sin_pitch, cos_pitch) = pitch.sin_cos();

    // Orthonormal camera basis in a frame where +y is up, +z is image
    // longitude 0, and +x is longitude +90.
    let forward = [cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw];
    let right = [cos_yaw, 0.0, -sin_yaw];
    let up = [-sin_pitch * sin_yaw, cos_pitch, -sin_pitch * cos_yaw];

    let tan_h = (h_fov / 2.0).tan();
    let tan_v = (v_fov / 2.0).tan();

    let mut out = RgbImage::new(out_w, out_h);
    for j in 0..out_h {
        // Screen-space y in [-1, 1], +1 at the top row.
        let sy = (1.0 - 2.0 * (j as f64 + 0.5) / out_h as f64) * tan_v;
        for i in 0..out_w {
            let sx = (2.0 * (i as f64 + 0.5) / out_w as f64 - 1.0) * tan_h;

            let dir = [
                forward[0] + sx * right[0] + sy * up[0],
                forward[1] + sx * right[1] + sy * up[1],
                forward[2] + sx * right[2] + sy * up[2],
            ];
            let norm = (dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2]).sqrt();

            let lon = dir[0].atan2(dir[2]);
            let lat = (dir[1] / norm).asin();

            out.put_pixel(i, j, sample_bilinear(pano, lon, lat));
        }
    }
    out
}

/// Bilinear sample at spherical (lon, lat) radians; wraps horizontally,
/// clamps vertically.
fn sample_bilinear(pano: &RgbImage, lon: f64, lat: f64) -> Rgb<u8> {
    let (w, h) = (pano.width() as f64, pano.height() as f64);

    let px = (lon / std::f64::consts::TAU + 0.5) * w - 0.5;
    let py = (0.5 - lat / std::f64::consts::PI) * h - 0.5;

    let x0 = px.floor();
    let y0 = py.floor();
    let tx = px - x0;
    let ty = py - y0;

    let wi = pano.width() as i64;
    let hi = pano.height() as i64;
    let wrap_x = |x: i64| -> u32 { x.rem_euclid(wi) as u32 };
    let clamp_y = |y: i64| -> u32 { y.clamp(0, hi - 1) as u32 };

    let x0i = x0 as i64;
    let y0i = y0 as i64;
    let p00 = pano.get_pixel(wrap_x(x0i), clamp_y(y0i));
    let p10 = pano.get_pixel(wrap_x(x0i + 1), clamp_y(y0i));
    let p01 = pano.get_pixel(wrap_x(x0i), clamp_y(y0i + 1));
    let p11 = pano.get_pixel(wrap_x(x0i + 1), clamp_y(y0i + 1));

    let mut rgb = [0u8; 3];
    for c in 0..3 {
        let top = p00.0[c] as f64 * (1.0 - tx) + p10.0[c] as f64 * tx;
        let bottom = p01.0[c] as f64 * (1.0 - tx) + p11.0[c] as f64 * tx;
        rgb[c] = (top * (1.0 - ty) + bottom * ty).round() as u8;
    }
    Rgb(rgb)
}
