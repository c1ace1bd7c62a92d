//! Tiny 5×7 bitmap font used when no TrueType font can be loaded.
//!
//! Covers upper-case Latin letters, digits and the punctuation that shows up
//! in addresses, dates, coordinates and temperatures. Lower case renders as
//! upper case, common accented letters render as their base letter, and
//! anything else renders as `?`.

use image::{Rgba, RgbaImage};

use crate::compose::blend_over;

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
/// Horizontal advance per character in font units (glyph plus one column gap).
pub const ADVANCE: u32 = GLYPH_WIDTH + 1;

/// Integer scale factor for a nominal pixel size.
pub fn scale_for(px: f32) -> u32 {
    ((px / 8.0).round() as u32).max(1)
}

/// Rendered width of `text` at `px`.
pub fn text_width(text: &str, px: f32) -> f32 {
    (text.chars().count() as u32 * ADVANCE * scale_for(px)) as f32
}

/// Rendered glyph height at `px`.
pub fn glyph_height(px: f32) -> f32 {
    (GLYPH_HEIGHT * scale_for(px)) as f32
}

/// Draw `text` with its top-left corner at (`x`, `y`). Pixels off the canvas
/// are clipped.
pub fn draw_text(canvas: &mut RgbaImage, x: i32, y: i32, text: &str, px: f32, color: Rgba<u8>) {
    let scale = scale_for(px) as i32;
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);

    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as i32 * ADVANCE as i32 * scale;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH as i32 {
                if (bits >> (4 - col)) & 1 == 0 {
                    continue;
                }
                let px0 = origin_x + col * scale;
                let py0 = y + row as i32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        let (sx, sy) = (px0 + dx, py0 + dy);
                        if sx >= 0 && sy >= 0 && sx < w && sy < h {
                            blend_over(canvas.get_pixel_mut(sx as u32, sy as u32), color);
                        }
                    }
                }
            }
        }
    }
}

fn fold(ch: char) -> char {
    match ch {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'A',
        'Ç' | 'ç' => 'C',
        'È' | 'É' | 'Ê' | 'Ë' | 'è' | 'é' | 'ê' | 'ë' => 'E',
        'Ì' | 'Í' | 'Î' | 'Ï' | 'ì' | 'í' | 'î' | 'ï' => 'I',
        'Ñ' | 'ñ' => 'N',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'O',
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'ù' | 'ú' | 'û' | 'ü' => 'U',
        'Ý' | 'ý' | 'ÿ' => 'Y',
        'ß' => 'S',
        c => c.to_ascii_uppercase(),
    }
}

/// Row bitmaps for `ch`, bit 4 being the leftmost column.
#[rustfmt::skip]
pub fn glyph(ch: char) -> [u8; 7] {
    match fold(ch) {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ' ' => [0; 7],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        ',' => [0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b00100, 0b01000],
        ';' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b00100, 0b01000],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '+' => [0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000],
        '=' => [0b00000, 0b00000, 0b11111, 0b00000, 0b11111, 0b00000, 0b00000],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        '\'' => [0b00100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000],
        '"' => [0b01010, 0b01010, 0b01010, 0b00000, 0b00000, 0b00000, 0b00000],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '&' => [0b01100, 0b10010, 0b10100, 0b01000, 0b10101, 0b10010, 0b01101],
        '#' => [0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010],
        '°' => [0b01100, 0b10010, 0b10010, 0b01100, 0b00000, 0b00000, 0b00000],
        _ => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_case_renders_as_upper_case() {
        assert_eq!(glyph('a'), glyph('A'));
        assert_eq!(glyph('z'), glyph('Z'));
    }

    #[test]
    fn accented_letters_fold_to_base_letter() {
        assert_eq!(glyph('Î'), glyph('I'));
        assert_eq!(glyph('ü'), glyph('U'));
    }

    #[test]
    fn unknown_characters_render_as_question_mark() {
        assert_eq!(glyph('€'), glyph('?'));
        assert_eq!(glyph('東'), glyph('?'));
        assert_ne!(glyph('°'), glyph('?'));
    }

    #[test]
    fn scale_grows_with_pixel_size() {
        assert_eq!(scale_for(4.0), 1);
        assert_eq!(scale_for(10.0), 1);
        assert_eq!(scale_for(16.0), 2);
        assert_eq!(scale_for(24.0), 3);
    }

    #[test]
    fn width_counts_characters_not_bytes() {
        assert_eq!(text_width("21.5°C", 8.0), 36.0);
        assert_eq!(text_width("", 8.0), 0.0);
        assert_eq!(text_width("AB", 16.0), 24.0);
    }

    #[test]
    fn draw_text_clips_at_canvas_edges() {
        let mut canvas = RgbaImage::new(8, 8);
        draw_text(&mut canvas, -3, -3, "HELLO", 16.0, Rgba([255, 255, 255, 255]));
        draw_text(&mut canvas, 6, 6, "W", 16.0, Rgba([255, 255, 255, 255]));
        assert!(canvas.pixels().any(|p| p[3] > 0));
    }

    #[test]
    fn draw_text_marks_glyph_pixels() {
        let mut canvas = RgbaImage::new(6, 7);
        draw_text(&mut canvas, 0, 0, "-", 8.0, Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(2, 3)[3], 255);
        assert_eq!(canvas.get_pixel(2, 0)[3], 0);
    }
}
