//! Terrain solidity lookup
//!
//! Built once from the alpha channel of the sea's bump map: one byte per
//! integer world cell, where 0 is open water and 255 is dry land.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::DynamicImage;
use tracing::info;

use crate::util::torus::{Point, WORLD_SIZE};

const SIDE: usize = WORLD_SIZE as usize;

/// Immutable per-cell solidity in `[0, 1]`
#[derive(Clone)]
pub struct DensityField {
    /// Row-major alpha values, `SIDE * SIDE` long, or empty for open water
    cells: Vec<u8>,
}

impl DensityField {
    /// No terrain anywhere
    pub fn open_water() -> Self {
        Self { cells: Vec::new() }
    }

    /// Build from a raw alpha raster covering the whole world
    pub fn from_alpha(width: u32, height: u32, alpha: &[u8]) -> Result<Self, DensityError> {
        if width as usize != SIDE || height as usize != SIDE {
            return Err(DensityError::Dimensions { width, height });
        }
        if alpha.len() != SIDE * SIDE {
            return Err(DensityError::Length {
                expected: SIDE * SIDE,
                actual: alpha.len(),
            });
        }
        Ok(Self {
            cells: alpha.to_vec(),
        })
    }

    /// Build from a decoded reference image, stretching it over the world
    /// when its size differs.
    pub fn from_image(image: &DynamicImage) -> Self {
        let mut rgba = image.to_rgba8();
        if rgba.dimensions() != (SIDE as u32, SIDE as u32) {
            rgba = imageops::resize(&rgba, SIDE as u32, SIDE as u32, FilterType::Triangle);
        }
        let cells = rgba.pixels().map(|p| p.0[3]).collect();
        Self { cells }
    }

    /// Decode the image at `path` and build from it
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DensityError> {
        let path = path.as_ref();
        let image = image::open(path)?;
        info!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "Loaded density map"
        );
        Ok(Self::from_image(&image))
    }

    /// Build by evaluating `alpha(x, y)` for every cell
    pub fn from_fn(mut alpha: impl FnMut(usize, usize) -> u8) -> Self {
        let mut cells = Vec::with_capacity(SIDE * SIDE);
        for y in 0..SIDE {
            for x in 0..SIDE {
                cells.push(alpha(x, y));
            }
        }
        Self { cells }
    }

    /// Solidity of the cell containing `p`, with no interpolation
    pub fn solidity(&self, p: Point) -> f64 {
        if self.cells.is_empty() {
            return 0.0;
        }
        let x = (p.x.floor() as i64).rem_euclid(SIDE as i64) as usize;
        let y = (p.y.floor() as i64).rem_euclid(SIDE as i64) as usize;
        self.cells[y * SIDE + x] as f64 / 255.0
    }

    pub fn is_open_water(&self) -> bool {
        self.cells.is_empty()
    }
}

impl std::fmt::Debug for DensityField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DensityField")
            .field("side", &SIDE)
            .field("open_water", &self.is_open_water())
            .finish()
    }
}

/// Density map loading errors
#[derive(Debug, thiserror::Error)]
pub enum DensityError {
    #[error("Density map must cover the 2000x2000 world, got {width}x{height}")]
    Dimensions { width: u32, height: u32 },

    #[error("Density map has {actual} cells, expected {expected}")]
    Length { expected: usize, actual: usize },

    #[error("Failed to decode density map: {0}")]
    Image(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn open_water_is_never_solid() {
        let field = DensityField::open_water();
        assert_eq!(field.solidity(Point::new(123.4, 1999.9)), 0.0);
    }

    #[test]
    fn reads_floored_cell() {
        let field = DensityField::from_fn(|x, y| if (x, y) == (3, 7) { 51 } else { 0 });
        assert_eq!(field.solidity(Point::new(3.99, 7.0)), 0.2);
        assert_eq!(field.solidity(Point::new(4.0, 7.0)), 0.0);
        assert_eq!(field.solidity(Point::new(2.99, 7.5)), 0.0);
    }

    #[test]
    fn wraps_out_of_tile_points() {
        let field = DensityField::from_fn(|x, y| if (x, y) == (1999, 0) { 255 } else { 0 });
        assert_eq!(field.solidity(Point::new(-0.5, 2000.2)), 1.0);
    }

    #[test]
    fn raw_alpha_must_cover_world() {
        assert!(matches!(
            DensityField::from_alpha(10, 10, &[0; 100]),
            Err(DensityError::Dimensions { width: 10, height: 10 })
        ));
        assert!(matches!(
            DensityField::from_alpha(2000, 2000, &[0; 100]),
            Err(DensityError::Length { .. })
        ));
    }

    #[test]
    fn small_image_is_stretched_over_world() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let field = DensityField::from_image(&DynamicImage::ImageRgba8(image));
        assert!(!field.is_open_water());
        assert_eq!(field.solidity(Point::new(1000.0, 1000.0)), 1.0);
    }
}
