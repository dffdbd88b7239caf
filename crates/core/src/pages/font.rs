//! Tiny 3x5 pixel font for the built-in pages. Glyph rows are three
//! bits wide, most significant bit on the left.

use crate::matrix::{FrameBuffer, Rgb};

pub const GLYPH_WIDTH: i16 = 3;
pub const GLYPH_HEIGHT: i16 = 5;
/// Glyph plus one column of spacing.
pub const GLYPH_ADVANCE: i16 = GLYPH_WIDTH + 1;

fn glyph(c: char) -> Option<[u8; 5]> {
    let rows = match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        '°' => [0b110, 0b110, 0b000, 0b000, 0b000],
        'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        ' ' => [0; 5],
        _ => return None,
    };
    Some(rows)
}

/// Draws one character; unknown characters render as blanks.
pub fn draw_char(canvas: &mut FrameBuffer, x: i16, y: i16, c: char, color: Rgb) {
    let Some(rows) = glyph(c) else {
        return;
    };
    for (dy, row) in rows.iter().enumerate() {
        for dx in 0..GLYPH_WIDTH {
            if row & (1 << (GLYPH_WIDTH - 1 - dx)) != 0 {
                canvas.set(x + dx, y + dy as i16, color);
            }
        }
    }
}

/// Draws a string and returns the width consumed in pixels.
pub fn draw_text(canvas: &mut FrameBuffer, x: i16, y: i16, text: &str, color: Rgb) -> i16 {
    let mut cursor = x;
    for c in text.chars() {
        draw_char(canvas, cursor, y, c, color);
        cursor += GLYPH_ADVANCE;
    }
    (cursor - x - 1).max(0)
}

/// Pixel width of `text` without drawing it.
pub fn text_width(text: &str) -> i16 {
    let chars = text.chars().count() as i16;
    (chars * GLYPH_ADVANCE - 1).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MatrixLayout;

    #[test]
    fn text_width_counts_spacing_between_glyphs() {
        assert_eq!(text_width(""), 0);
        assert_eq!(text_width("1"), 3);
        assert_eq!(text_width("12:34"), 19);
    }

    #[test]
    fn draw_returns_the_measured_width() {
        let mut canvas = FrameBuffer::new(32, 8, MatrixLayout::TiledRows);
        let drawn = draw_text(&mut canvas, 0, 0, "12:34", Rgb::WHITE);
        assert_eq!(drawn, text_width("12:34"));
        assert_eq!(canvas.get(1, 0), Rgb::WHITE); // top of the '1'
    }
}
