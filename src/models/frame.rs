/// Absolute-screen rectangle sampled on every scan iteration.
///
/// Always canonical: `left <= right` and `top <= bottom`. `right` and
/// `bottom` are exclusive, so the region covers `width() x height()` pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl CaptureRegion {
    /// Build a region from two opposite corners given in any order.
    pub fn from_corners(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            left: x0.min(x1),
            top: y0.min(y1),
            right: x0.max(x1),
            bottom: y0.max(y1),
        }
    }

    pub fn width(&self) -> u32 {
        self.right.abs_diff(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.abs_diff(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

impl std::fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{})-({},{}) [{}x{}]",
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height()
        )
    }
}

/// Bounds of one active display in absolute screen coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayBounds {
    pub index: usize,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl DisplayBounds {
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// True if `region` lies entirely inside this display.
    pub fn contains(&self, region: &CaptureRegion) -> bool {
        region.left >= self.x
            && region.top >= self.y
            && (region.right as i64) <= self.right()
            && (region.bottom as i64) <= self.bottom()
    }

    /// True if `region` shares at least one pixel with this display.
    pub fn overlaps(&self, region: &CaptureRegion) -> bool {
        (region.left as i64) < self.right()
            && (region.right as i64) > self.x as i64
            && (region.top as i64) < self.bottom()
            && (region.bottom as i64) > self.y as i64
    }
}

/// One captured RGB frame, stored row-major. Alpha is dropped on capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
}

impl Frame {
    /// Build a frame from row-major RGB pixels.
    ///
    /// Returns `None` if the pixel count does not match `width * height`.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<[u8; 3]>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build a frame from a tightly packed RGBA8 buffer, discarding alpha.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Option<Self> {
        if rgba.len() != width as usize * height as usize * 4 {
            return None;
        }
        let pixels = rgba.chunks_exact(4).map(|px| [px[0], px[1], px[2]]).collect();
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// A frame filled with a single color
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            width,
            height,
            pixels: vec![rgb; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x < self.width && y < self.height {
            let idx = y as usize * self.width as usize + x as usize;
            self.pixels[idx] = rgb;
        }
    }

    /// Row-major pixel iterator
    pub fn pixels(&self) -> impl Iterator<Item = &[u8; 3]> {
        self.pixels.iter()
    }

    /// Packed RGB8 bytes, row-major. Used for PNG previews.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flatten().copied().collect()
    }
}
