//! Tile stitching
//!
//! Tiles arrive as a grid of square JPEGs; the grid is 2^z columns by
//! max(1, 2^(z-1)) rows, which yields the 2:1 equirectangular shape for
//! every zoom above 0. The tile edge length is nominally 512 but is read
//! from the first decoded tile so mirrors with other tile sizes work.

use std::collections::HashMap;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};

use crate::error::{PreloadError, PreloadResult};

/// Nominal tile edge length in pixels.
pub const TILE_SIZE: u32 = 512;

const JPEG_QUALITY: u8 = 90;

/// Grid dimensions (cols, rows) for a zoom level.
pub fn tile_grid(zoom: u8) -> (u32, u32) {
    if zoom == 0 {
        return (1, 1);
    }
    (1 << zoom, 1 << (zoom - 1))
}

/// Assemble a complete tile grid into one equirectangular JPEG.
pub fn stitch_tiles(tiles: &HashMap<(u32, u32), Vec<u8>>, zoom: u8) -> PreloadResult<Vec<u8>> {
    let (cols, rows) = tile_grid(zoom);

    let first = tiles
        .get(&(0, 0))
        .ok_or(PreloadError::MissingTile { x: 0, y: 0 })?;
    let first = decode_tile(first, 0, 0)?;
    let tile_size = first.width();

    let mut output = RgbImage::new(cols * tile_size, rows * tile_size);
    for y in 0..rows {
        for x in 0..cols {
            let bytes = tiles
                .get(&(x, y))
                .ok_or(PreloadError::MissingTile { x, y })?;
            let tile = decode_tile(bytes, x, y)?;
            image::imageops::replace(
                &mut output,
                &tile,
                (x * tile_size) as i64,
                (y * tile_size) as i64,
            );
        }
    }

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut bytes), JPEG_QUALITY);
    output
        .write_with_encoder(encoder)
        .map_err(PreloadError::Encode)?;
    Ok(bytes)
}

fn decode_tile(bytes: &[u8], x: u32, y: u32) -> PreloadResult<RgbImage> {
    image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map(|img| img.to_rgb8())
        .map_err(|source| PreloadError::BadTile { x, y, source })
}
