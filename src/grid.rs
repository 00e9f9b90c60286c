//! Lossless RGBA byte-array view of a raster image.
//!
//! The engine addresses pixels by flat row-major index in `[0, W·H)` and
//! reads/writes them as 4-byte RGBA tuples. Channel roles: R carries one
//! ciphertext byte, G and B together hold a 16-bit pointer (G high byte),
//! A is never modified.

use image::{DynamicImage, RgbaImage};

/// A single RGBA pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Px(pub [u8; 4]);

impl Px {
    pub fn r(self) -> u8 {
        self.0[0]
    }

    pub fn g(self) -> u8 {
        self.0[1]
    }

    pub fn b(self) -> u8 {
        self.0[2]
    }

    pub fn a(self) -> u8 {
        self.0[3]
    }

    /// The 16-bit pointer stored in G (high byte) and B (low byte).
    pub fn pointer(self) -> u16 {
        ((self.0[1] as u16) << 8) | self.0[2] as u16
    }
}

/// Random-access RGBA grid of length `W·H`, row-major, R at offset 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelGrid {
    /// Wrap a raw RGBA buffer. `data.len()` must equal `width · height · 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            width as usize * height as usize * 4,
            "RGBA buffer length must be width * height * 4"
        );
        Self {
            width,
            height,
            data,
        }
    }

    /// Solid-fill grid, handy for tests and capacity probing.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * 4);
        for _ in 0..count {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Decode any `image` crate raster into the grid (lossless RGBA view).
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            data: rgba.into_raw(),
        }
    }

    /// Hand the grid back as an `image` buffer for the caller to encode.
    pub fn into_image(self) -> RgbaImage {
        RgbaImage::from_raw(self.width, self.height, self.data)
            .expect("grid buffer always matches its dimensions")
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of addressable pixels, `W·H`.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn px(&self, index: usize) -> Px {
        let off = index * 4;
        Px([
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ])
    }

    /// Overwrite R, G, B of a pixel, leaving A untouched.
    pub fn set_payload(&mut self, index: usize, r: u8, pointer: u16) {
        let off = index * 4;
        self.data[off] = r;
        self.data[off + 1] = (pointer >> 8) as u8;
        self.data[off + 2] = (pointer & 0xff) as u8;
    }

    /// Overwrite only the payload channel.
    pub fn set_r(&mut self, index: usize, r: u8) {
        self.data[index * 4] = r;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
