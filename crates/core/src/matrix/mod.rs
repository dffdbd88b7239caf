use serde::{Deserialize, Serialize};

/// One 8-bit RGB pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Wiring topology of the LED strip behind the logical matrix.
///
/// The strip is one linear chain of LEDs; the layout decides which chain
/// position a logical `(x, y)` coordinate lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixLayout {
    /// 8x8 tiles chained left to right, rows progressive inside each tile.
    TiledRows,
    /// Single panel, column-major, every odd column wired bottom-up.
    ColumnsZigzag,
    /// Single panel, row-major, every odd row wired right-to-left.
    RowsZigzag,
    /// Single panel, column-major starting at the bottom-left corner.
    ColumnsProgressiveBottom,
}

impl MatrixLayout {
    /// Maps a logical coordinate to the physical chain index.
    pub fn index(&self, x: usize, y: usize, width: usize, height: usize) -> usize {
        match self {
            MatrixLayout::TiledRows => {
                let tile = x / height;
                tile * height * height + y * height + x % height
            }
            MatrixLayout::ColumnsZigzag => {
                let y = if x % 2 == 1 { height - 1 - y } else { y };
                x * height + y
            }
            MatrixLayout::RowsZigzag => {
                let x = if y % 2 == 1 { width - 1 - x } else { x };
                y * width + x
            }
            MatrixLayout::ColumnsProgressiveBottom => x * height + (height - 1 - y),
        }
    }
}

/// In-memory pixel grid standing in for the physical LED chain.
///
/// Single writer (the render scheduler), single reader-after-write (the
/// liveview streamer); both run on the cooperative host loop so access
/// is strictly sequenced and no locking is needed.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    layout: MatrixLayout,
    leds: Vec<Rgb>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize, layout: MatrixLayout) -> Self {
        Self {
            width,
            height,
            layout,
            leds: vec![Rgb::BLACK; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn layout(&self) -> MatrixLayout {
        self.layout
    }

    /// Logical to physical index mapping.
    pub fn xy(&self, x: usize, y: usize) -> usize {
        self.layout.index(x, y, self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.leds.fill(Rgb::BLACK);
    }

    /// Writes a pixel at a logical coordinate. Coordinates are signed so
    /// that transition offsets can push content off the edge; anything
    /// outside the matrix is dropped.
    pub fn set(&mut self, x: i16, y: i16, color: Rgb) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return;
        }
        let index = self.xy(x, y);
        self.leds[index] = color;
    }

    /// Reads back the pixel at a logical coordinate.
    pub fn get(&self, x: usize, y: usize) -> Rgb {
        self.leds[self.xy(x, y)]
    }

    pub fn draw_hline(&mut self, x: i16, y: i16, len: u16, color: Rgb) {
        for dx in 0..len as i16 {
            self.set(x + dx, y, color);
        }
    }

    pub fn fill_rect(&mut self, x: i16, y: i16, w: u16, h: u16, color: Rgb) {
        for dy in 0..h as i16 {
            self.draw_hline(x, y + dy, w, color);
        }
    }

    /// The physical LED chain, in wiring order.
    pub fn as_leds(&self) -> &[Rgb] {
        &self.leds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_zigzag_reverses_odd_rows() {
        let layout = MatrixLayout::RowsZigzag;
        assert_eq!(layout.index(0, 0, 32, 8), 0);
        assert_eq!(layout.index(31, 0, 32, 8), 31);
        // Second row runs right to left.
        assert_eq!(layout.index(31, 1, 32, 8), 32);
        assert_eq!(layout.index(0, 1, 32, 8), 63);
    }

    #[test]
    fn columns_zigzag_reverses_odd_columns() {
        let layout = MatrixLayout::ColumnsZigzag;
        assert_eq!(layout.index(0, 0, 32, 8), 0);
        assert_eq!(layout.index(0, 7, 32, 8), 7);
        assert_eq!(layout.index(1, 0, 32, 8), 15);
        assert_eq!(layout.index(1, 7, 32, 8), 8);
    }

    #[test]
    fn tiled_rows_jumps_between_tiles() {
        let layout = MatrixLayout::TiledRows;
        // First tile covers x 0..8.
        assert_eq!(layout.index(7, 0, 32, 8), 7);
        assert_eq!(layout.index(7, 7, 32, 8), 63);
        // Second tile starts at chain position 64.
        assert_eq!(layout.index(8, 0, 32, 8), 64);
    }

    #[test]
    fn every_logical_pixel_maps_uniquely() {
        for layout in [
            MatrixLayout::TiledRows,
            MatrixLayout::ColumnsZigzag,
            MatrixLayout::RowsZigzag,
            MatrixLayout::ColumnsProgressiveBottom,
        ] {
            let mut seen = vec![false; 32 * 8];
            for y in 0..8 {
                for x in 0..32 {
                    let index = layout.index(x, y, 32, 8);
                    assert!(!seen[index], "{layout:?} maps ({x},{y}) twice");
                    seen[index] = true;
                }
            }
        }
    }

    #[test]
    fn out_of_range_writes_are_dropped() {
        let mut frame = FrameBuffer::new(32, 8, MatrixLayout::TiledRows);
        frame.set(-1, 0, Rgb::WHITE);
        frame.set(0, -3, Rgb::WHITE);
        frame.set(32, 0, Rgb::WHITE);
        frame.set(0, 8, Rgb::WHITE);
        assert!(frame.as_leds().iter().all(|led| *led == Rgb::BLACK));
    }

    #[test]
    fn set_then_get_round_trips_through_the_layout() {
        let mut frame = FrameBuffer::new(32, 8, MatrixLayout::ColumnsZigzag);
        frame.set(5, 3, Rgb::new(1, 2, 3));
        assert_eq!(frame.get(5, 3), Rgb::new(1, 2, 3));
        assert_eq!(frame.as_leds()[frame.xy(5, 3)], Rgb::new(1, 2, 3));
    }
}
