//! Text measurement, shrink-to-fit, wrapping and placement.
//!
//! The fitting functions take a `measure(text, px) -> width` closure so they
//! can be exercised without any font; [`Face::measure`] is the real one.

use image::{Rgba, RgbaImage};
use rusttype::{Font, Scale, point};

use super::bitmap_font;
use super::layout::Rect;
use crate::compose::blend_over;

/// Marker appended to text cut short to fit its region.
pub const ELLIPSIS: &str = "...";

/// Line advance as a multiple of the font size.
const LINE_SPACING: f32 = 1.2;
/// Gap between the address block and the detail lines, as a multiple of the
/// address size.
const BLOCK_GAP: f32 = 0.3;

/// A font that can measure and draw text.
pub enum Face {
    TrueType(Font<'static>),
    /// The built-in 5×7 bitmap font.
    Bitmap,
}

impl std::fmt::Debug for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrueType(_) => f.write_str("Face::TrueType"),
            Self::Bitmap => f.write_str("Face::Bitmap"),
        }
    }
}

impl Face {
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Bitmap)
    }

    /// Width in pixels of `text` rendered at `px`.
    pub fn measure(&self, text: &str, px: f32) -> f32 {
        match self {
            Self::TrueType(font) => {
                if text.is_empty() {
                    return 0.0;
                }
                let scale = Scale::uniform(px);
                let mut width: f32 = 0.0;
                for glyph in font.layout(text, scale, point(0.0, 0.0)) {
                    let advance = glyph.position().x + glyph.unpositioned().h_metrics().advance_width;
                    width = width.max(advance);
                    if let Some(bb) = glyph.pixel_bounding_box() {
                        width = width.max(bb.max.x as f32);
                    }
                }
                width
            }
            Self::Bitmap => bitmap_font::text_width(text, px),
        }
    }

    /// Vertical advance between consecutive lines at `px`.
    pub fn line_height(&self, px: f32) -> f32 {
        match self {
            Self::TrueType(_) => px * LINE_SPACING,
            Self::Bitmap => (px * LINE_SPACING).max(bitmap_font::glyph_height(px)),
        }
    }

    /// Draw `text` with the top of its line box at `y`.
    pub fn draw(&self, canvas: &mut RgbaImage, x: i32, y: i32, text: &str, px: f32, color: Rgba<u8>) {
        match self {
            Self::TrueType(font) => {
                let scale = Scale::uniform(px);
                let v_metrics = font.v_metrics(scale);
                let (w, h) = (canvas.width() as i32, canvas.height() as i32);
                let glyphs: Vec<_> = font
                    .layout(text, scale, point(x as f32, y as f32 + v_metrics.ascent))
                    .collect();

                for glyph in glyphs {
                    let Some(bb) = glyph.pixel_bounding_box() else {
                        continue;
                    };
                    glyph.draw(|gx, gy, v| {
                        let px = gx as i32 + bb.min.x;
                        let py = gy as i32 + bb.min.y;
                        if px < 0 || py < 0 || px >= w || py >= h {
                            return;
                        }
                        let alpha = (v * color[3] as f32).round().clamp(0.0, 255.0) as u8;
                        let src = Rgba([color[0], color[1], color[2], alpha]);
                        blend_over(canvas.get_pixel_mut(px as u32, py as u32), src);
                    });
                }
            }
            Self::Bitmap => bitmap_font::draw_text(canvas, x, y, text, px, color),
        }
    }
}

/// Largest size, stepping down from `initial` by `step`, at which `text`
/// fits in `max_width`. Never goes below `min`; if the text does not fit
/// even there, `min` is returned and the caller truncates.
pub fn fit_font_size(
    text: &str,
    max_width: f32,
    initial: f32,
    min: f32,
    step: f32,
    measure: impl Fn(&str, f32) -> f32,
) -> f32 {
    let mut size = initial.max(min);
    while size > min && measure(text, size) > max_width {
        if step <= 0.0 {
            return min;
        }
        size = (size - step).max(min);
    }
    size
}

/// Cut `text` down and append [`ELLIPSIS`] so it fits in `max_width`.
///
/// Returns the text unchanged when it already fits, and an empty string when
/// not even the ellipsis fits.
pub fn truncate_to_width(text: &str, max_width: f32, px: f32, measure: impl Fn(&str, f32) -> f32) -> String {
    if measure(text, px) <= max_width {
        return text.to_string();
    }
    ellipsize(text, max_width, px, measure)
}

/// Like [`truncate_to_width`] but always ends in [`ELLIPSIS`] (or is empty).
fn ellipsize(text: &str, max_width: f32, px: f32, measure: impl Fn(&str, f32) -> f32) -> String {
    let mut chars: Vec<char> = text.trim_end().chars().collect();
    loop {
        let candidate: String = chars.iter().collect::<String>().trim_end().to_string() + ELLIPSIS;
        if measure(&candidate, px) <= max_width {
            return candidate;
        }
        if chars.pop().is_none() {
            return String::new();
        }
    }
}

/// Greedily pack the words of `text` into lines no wider than `max_width`.
///
/// A single word wider than `max_width` gets a line of its own, truncated.
pub fn wrap_text(text: &str, max_width: f32, px: f32, measure: impl Fn(&str, f32) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else {
            let candidate = format!("{current} {word}");
            if measure(&candidate, px) <= max_width {
                current = candidate;
                continue;
            }
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }

        if measure(&current, px) > max_width {
            let cut = truncate_to_width(&current, max_width, px, &measure);
            if !cut.is_empty() {
                lines.push(cut);
            }
            current.clear();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn widest<'a>(items: impl Iterator<Item = &'a str>, px: f32, measure: impl Fn(&str, f32) -> f32) -> &'a str {
    items
        .max_by(|a, b| measure(a, px).total_cmp(&measure(b, px)))
        .unwrap_or("")
}

/// One line of text positioned relative to the overlay surface.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    /// Date/time or coordinates rather than address.
    pub detail: bool,
    pub px: f32,
    pub x: i32,
    pub y: i32,
}

/// The address and detail lines laid out inside the info region.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<PlacedLine>,
    pub address_px: f32,
    pub detail_px: f32,
    /// Some lines were dropped or ellipsized to fit the region's height.
    pub clipped: bool,
}

/// Sizing bounds for [`layout_text_block`].
#[derive(Debug, Clone, Copy)]
pub struct FontSizing {
    pub address_px: f32,
    pub detail_px: f32,
    pub min_px: f32,
    pub step_px: f32,
}

/// Lay out the address (wrapped, shrink-to-fit) followed by the detail lines,
/// vertically centered in `region`.
pub fn layout_text_block(
    address_face: &Face,
    detail_face: &Face,
    address: &str,
    details: &[String],
    region: Rect,
    sizing: FontSizing,
) -> TextBlock {
    let width = region.width as f32;
    let measure = |text: &str, px: f32| address_face.measure(text, px);
    let measure_detail = |text: &str, px: f32| detail_face.measure(text, px);

    let longest_word = widest(address.split_whitespace(), sizing.address_px, measure);
    let address_px = fit_font_size(longest_word, width, sizing.address_px, sizing.min_px, sizing.step_px, measure);
    let mut address_lines = wrap_text(address, width, address_px, measure);

    let longest_detail = widest(details.iter().map(String::as_str), sizing.detail_px, measure_detail);
    let detail_px = fit_font_size(
        longest_detail,
        width,
        sizing.detail_px,
        sizing.min_px,
        sizing.step_px,
        measure_detail,
    );
    let mut detail_lines: Vec<String> = details
        .iter()
        .map(|line| truncate_to_width(line, width, detail_px, measure_detail))
        .filter(|line| !line.is_empty())
        .collect();

    let address_lh = address_face.line_height(address_px);
    let detail_lh = detail_face.line_height(detail_px);
    let gap = address_px * BLOCK_GAP;
    let block_height = |address: usize, details: usize| {
        let gap = if address > 0 && details > 0 { gap } else { 0.0 };
        address as f32 * address_lh + gap + details as f32 * detail_lh
    };

    let available = region.height as f32;
    let mut clipped = false;
    let mut address_cut = false;
    while !address_lines.is_empty() || !detail_lines.is_empty() {
        if block_height(address_lines.len(), detail_lines.len()) <= available {
            break;
        }
        clipped = true;
        if address_lines.len() > 1 {
            address_lines.pop();
            address_cut = true;
        } else if detail_lines.pop().is_none() {
            address_lines.pop();
        }
    }
    if address_cut {
        if let Some(last) = address_lines.last_mut() {
            *last = ellipsize(last, width, address_px, measure);
        }
    }

    let total = block_height(address_lines.len(), detail_lines.len());
    let mut y = region.y as f32 + ((available - total) / 2.0).max(0.0);
    let mut lines = Vec::with_capacity(address_lines.len() + detail_lines.len());

    for text in address_lines.iter() {
        lines.push(PlacedLine {
            text: text.clone(),
            detail: false,
            px: address_px,
            x: region.x as i32,
            y: y.round() as i32,
        });
        y += address_lh;
    }
    if !address_lines.is_empty() {
        y += gap;
    }
    for text in detail_lines {
        lines.push(PlacedLine {
            text,
            detail: true,
            px: detail_px,
            x: region.x as i32,
            y: y.round() as i32,
        });
        y += detail_lh;
    }

    TextBlock {
        lines,
        address_px,
        detail_px,
        clipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is half the font size wide.
    fn mono(text: &str, px: f32) -> f32 {
        text.chars().count() as f32 * px * 0.5
    }

    fn sizing() -> FontSizing {
        FontSizing { address_px: 24.0, detail_px: 19.2, min_px: 10.0, step_px: 2.0 }
    }

    // ── fit_font_size ────────────────────────────────────────────────

    #[test]
    fn fitting_text_keeps_initial_size() {
        assert_eq!(fit_font_size("Paris", 200.0, 24.0, 10.0, 2.0, mono), 24.0);
    }

    #[test]
    fn shrinks_in_steps_until_it_fits() {
        // 10 chars: 24 -> 120 wide, 20 -> 100 wide
        assert_eq!(fit_font_size("Kensington", 100.0, 24.0, 10.0, 2.0, mono), 20.0);
    }

    #[test]
    fn stops_at_the_floor() {
        assert_eq!(fit_font_size("Llanfairpwllgwyngyll", 10.0, 24.0, 10.0, 2.0, mono), 10.0);
    }

    #[test]
    fn initial_below_floor_is_raised() {
        assert_eq!(fit_font_size("A", 100.0, 6.0, 10.0, 2.0, mono), 10.0);
    }

    #[test]
    fn non_positive_step_falls_to_floor() {
        assert_eq!(fit_font_size("Kensington", 100.0, 24.0, 10.0, 0.0, mono), 10.0);
    }

    // ── wrap_text ────────────────────────────────────────────────────

    #[test]
    fn wraps_greedily_on_word_boundaries() {
        // 10 px per char, 100 px lines
        let lines = wrap_text("Rue de Rivoli, Paris, France", 100.0, 20.0, mono);
        assert_eq!(lines, vec!["Rue de", "Rivoli,", "Paris,", "France"]);
    }

    #[test]
    fn wrapped_lines_never_exceed_width() {
        let text = "Avenida Presidente Juscelino Kubitschek, Itaim Bibi, São Paulo, Região Sudeste, Brasil";
        for width in [30.0, 55.0, 80.0, 140.0, 400.0] {
            for line in wrap_text(text, width, 10.0, mono) {
                assert!(mono(&line, 10.0) <= width, "{line:?} wider than {width}");
            }
        }
    }

    #[test]
    fn overlong_word_is_truncated_with_ellipsis() {
        let lines = wrap_text("Go Llanfairpwllgwyngyll now", 50.0, 10.0, mono);
        assert_eq!(lines, vec!["Go", "Llanfai...", "now"]);
    }

    #[test]
    fn empty_text_has_no_lines() {
        assert!(wrap_text("   ", 100.0, 10.0, mono).is_empty());
    }

    // ── truncate_to_width ────────────────────────────────────────────

    #[test]
    fn truncation_leaves_fitting_text_alone() {
        assert_eq!(truncate_to_width("12.34000", 100.0, 10.0, mono), "12.34000");
    }

    #[test]
    fn truncation_gives_up_when_ellipsis_is_too_wide() {
        assert_eq!(truncate_to_width("Anything", 10.0, 10.0, mono), "");
    }

    // ── layout_text_block ────────────────────────────────────────────

    #[test]
    fn block_is_vertically_centered() {
        let region = Rect::new(20, 10, 400, 200);
        let details = vec!["2024-01-01  12:34".to_string()];
        let block = layout_text_block(&Face::Bitmap, &Face::Bitmap, "Main St", &details, region, sizing());
        assert_eq!(block.lines.len(), 2);
        assert!(!block.clipped);

        let first = &block.lines[0];
        let last = &block.lines[1];
        let bottom = last.y as f32 + Face::Bitmap.line_height(last.px);
        let top_space = first.y as f32 - 10.0;
        let bottom_space = 210.0 - bottom;
        assert!((top_space - bottom_space).abs() <= 2.0, "{top_space} vs {bottom_space}");
        assert!(block.lines.iter().all(|l| l.x == 20));
    }

    #[test]
    fn detail_lines_follow_the_address() {
        let details = vec!["2024-01-01  12:34".to_string(), "12.34000, 56.78000".to_string()];
        let block = layout_text_block(&Face::Bitmap, &Face::Bitmap, "A B", &details, Rect::new(0, 0, 600, 300), sizing());
        let texts: Vec<_> = block.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["A B", "2024-01-01  12:34", "12.34000, 56.78000"]);
        assert!(block.lines.windows(2).all(|w| w[0].y < w[1].y));
        assert!(block.detail_px <= block.address_px);
    }

    #[test]
    fn lines_fit_region_width_at_chosen_size() {
        let address = "Very Long Boulevard Name, Some Neighbourhood, Metropolis, Federal State, Republic";
        let details = vec!["2024-01-01  12:34".to_string(), "-33.86882, 151.20929".to_string()];
        let region = Rect::new(0, 0, 150, 400);
        let block = layout_text_block(&Face::Bitmap, &Face::Bitmap, address, &details, region, sizing());
        for line in &block.lines {
            assert!(Face::Bitmap.measure(&line.text, line.px) <= 150.0, "{line:?}");
        }
    }

    #[test]
    fn short_region_drops_lines_and_ellipsizes() {
        let address = "One Two Three Four Five Six Seven Eight Nine Ten";
        let details = vec!["2024-01-01  12:34".to_string()];
        let region = Rect::new(0, 0, 120, 40);
        let block = layout_text_block(&Face::Bitmap, &Face::Bitmap, address, &details, region, sizing());
        assert!(block.clipped);
        let address_lines: Vec<_> = block.lines.iter().filter(|l| !l.detail).collect();
        assert!(address_lines.last().is_some_and(|l| l.text.ends_with(ELLIPSIS)));
        let last = block.lines.last().unwrap();
        assert!(last.y as f32 + Face::Bitmap.line_height(last.px) <= 40.0 + 1.0);
    }

    #[test]
    fn zero_sized_region_yields_no_lines() {
        let block = layout_text_block(&Face::Bitmap, &Face::Bitmap, "Somewhere", &[], Rect::new(5, 5, 0, 0), sizing());
        assert!(block.lines.is_empty());
    }

    // ── Face ─────────────────────────────────────────────────────────

    #[test]
    fn bitmap_line_height_covers_the_glyph() {
        for px in [10.0, 12.0, 20.0, 37.0] {
            assert!(Face::Bitmap.line_height(px) >= bitmap_font::glyph_height(px));
        }
    }
}
