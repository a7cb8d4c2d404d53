use crate::error::{Error, Result};

/// Bytes per pixel of the decoded heightmap (RGBA8).
pub const BYTES_PER_PIXEL: usize = 4;

/// Borrowed row-major RGBA8 raster. Only the red channel carries height.
#[derive(Debug, Copy, Clone)]
pub struct Heightmap<'a> {
    width: u32,
    height: u32,
    pixels: &'a [u8],
}

impl<'a> Heightmap<'a> {
    /// Wraps a decoded pixel buffer after checking it against its dimensions.
    pub fn from_rgba(width: u32, height: u32, pixels: &'a [u8]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "heightmap dimensions must be positive, got {width}x{height}"
            )));
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| Error::InvalidInput(format!("heightmap {width}x{height} is too large")))?;

        if pixels.len() != expected {
            return Err(Error::InvalidInput(format!(
                "heightmap {width}x{height} needs {expected} bytes, got {}",
                pixels.len()
            )));
        }

        Ok(Self { width, height, pixels })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Red channel of pixel `(x, y)`.
    ///
    /// # Panics
    /// Panics if the coordinate is outside the raster.
    #[inline]
    pub fn red(&self, x: u32, y: u32) -> u8 {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        self.pixels[(x as usize + y as usize * self.width as usize) * BYTES_PER_PIXEL]
    }

    /// Iterates `(x, y, red)` in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, u8)> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| (x, y, self.red(x, y))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_dimension() {
        assert!(Heightmap::from_rgba(0, 4, &[]).is_err());
        assert!(Heightmap::from_rgba(4, 0, &[]).is_err());
    }

    #[test]
    fn rejects_wrong_buffer_length() {
        let pixels = [0u8; 7];
        assert!(matches!(
            Heightmap::from_rgba(2, 1, &pixels),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn reads_red_channel_row_major() {
        #[rustfmt::skip]
        let pixels = [
            10, 1, 1, 255,   20, 2, 2, 255,
            30, 3, 3, 255,   40, 4, 4, 255,
        ];
        let hm = Heightmap::from_rgba(2, 2, &pixels).unwrap();
        assert_eq!(hm.red(1, 0), 20);
        assert_eq!(hm.red(0, 1), 30);

        let reds: Vec<u8> = hm.cells().map(|(_, _, r)| r).collect();
        assert_eq!(reds, vec![10, 20, 30, 40]);
    }
}
