//! Pseudo-image synthesis.
//!
//! Images are flat-colour binary PPM (`P6`) bitmaps, base64 encoded. Nothing
//! here decodes or renders anything; clients only need a payload of the right
//! shape.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::TryReserveError;
use thiserror::Error;
use uuid::Uuid;

const CHANNEL_MIN: u8 = 50;
const CHANNEL_MAX: u8 = 200;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image of {width}x{height} pixels exceeds addressable memory")]
    TooLarge { width: u32, height: u32 },
    #[error("cannot allocate image buffer: {0}")]
    Allocation(#[from] TryReserveError),
}

pub fn ppm_header(width: u32, height: u32) -> String {
    format!("P6\n{} {}\n255\n", width, height)
}

/// Draws the flat colour. A pinned seed always yields the same colour.
pub fn pick_color<R: Rng>(seed: Option<i64>, rng: &mut R) -> [u8; 3] {
    match seed {
        Some(seed) => {
            let mut seeded = StdRng::seed_from_u64(seed as u64);
            draw_color(&mut seeded)
        }
        None => draw_color(rng),
    }
}

fn draw_color<R: Rng>(rng: &mut R) -> [u8; 3] {
    [
        rng.gen_range(CHANNEL_MIN..=CHANNEL_MAX),
        rng.gen_range(CHANNEL_MIN..=CHANNEL_MAX),
        rng.gen_range(CHANNEL_MIN..=CHANNEL_MAX),
    ]
}

/// Byte length of the raw bitmap, or `None` if it does not fit in `usize`.
pub fn ppm_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(3)?
        .checked_add(ppm_header(width, height).len())
}

/// Fails instead of aborting when the bitmap cannot be allocated.
pub fn render_ppm(width: u32, height: u32, color: [u8; 3]) -> Result<Vec<u8>, ImageError> {
    let header = ppm_header(width, height);
    let len = ppm_len(width, height).ok_or(ImageError::TooLarge { width, height })?;

    let mut bytes = Vec::new();
    bytes.try_reserve_exact(len)?;
    bytes.extend_from_slice(header.as_bytes());
    bytes.resize(len, 0);
    for pixel in bytes[header.len()..].chunks_exact_mut(3) {
        pixel.copy_from_slice(&color);
    }
    Ok(bytes)
}

pub fn mock_image_b64<R: Rng>(
    width: u32,
    height: u32,
    seed: Option<i64>,
    rng: &mut R,
) -> Result<String, ImageError> {
    let color = pick_color(seed, rng);
    let raw = render_ppm(width, height, color)?;

    let encoded_len =
        base64::encoded_len(raw.len(), true).ok_or(ImageError::TooLarge { width, height })?;
    let mut encoded = String::new();
    encoded.try_reserve_exact(encoded_len)?;
    BASE64.encode_string(&raw, &mut encoded);
    Ok(encoded)
}

pub fn placeholder_url(name: &str, port: u16) -> String {
    format!("http://{}:{}/images/{}.png", name, port, Uuid::new_v4())
}
