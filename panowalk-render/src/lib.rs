//! Panowalk Render - Perspective Projection
//!
//! Pure function from an equirectangular panorama to the perspective JPEG
//! an agent observes. No I/O, no shared state; identical inputs produce
//! byte-identical output.

mod projection;

pub use projection::{
    render_perspective, RenderError, ViewParams, FOV_MAX, FOV_MIN, PITCH_MAX, PITCH_MIN,
};
