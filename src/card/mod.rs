//! Geotag card rendering.
//!
//! [`render_card`] plans the layout for the target image, draws the card
//! background, then renders the map, text and weather regions into a
//! transparent overlay surface. Each region reports its own
//! [`RegionOutcome`]; a failing region never prevents the others or the
//! overlay itself from being produced.

pub mod assets;
pub mod bitmap_font;
pub mod layout;
pub mod shapes;
pub mod text;

pub use assets::FontSet;
pub use layout::{LayoutPlan, Orientation, Rect, plan_layout};
pub use text::{Face, FontSizing, TextBlock, fit_font_size, layout_text_block, truncate_to_width, wrap_text};

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use serde::Serialize;
use std::path::Path;

use crate::compose::overlay_at;
use crate::config::{CardConfig, CardStyle};
use crate::lookup::ResolvedContext;

/// How one region of the card turned out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RegionOutcome {
    Rendered,
    /// Drawn, but with a substitute for a missing or broken input.
    Fallback(String),
    /// Not drawn at all.
    Skipped(String),
}

impl RegionOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderReport {
    pub map: RegionOutcome,
    pub text: RegionOutcome,
    pub weather: RegionOutcome,
}

/// The map drawn in the card's leading region.
#[derive(Debug, Clone, Copy)]
pub enum MapImage<'a> {
    /// Encoded image bytes as supplied by the caller.
    Encoded(&'a [u8]),
    Decoded(&'a RgbaImage),
}

/// Everything drawn on the card besides the layout itself.
#[derive(Debug, Clone, Copy)]
pub struct CardContent<'a> {
    pub latitude: f64,
    pub longitude: f64,
    pub date: &'a str,
    pub time: &'a str,
    pub context: &'a ResolvedContext,
    pub map: Option<MapImage<'a>>,
}

impl CardContent<'_> {
    /// Date/time and coordinate lines shown below the address.
    pub fn detail_lines(&self) -> Vec<String> {
        vec![
            format!("{}  {}", self.date, self.time),
            format!("{:.5}, {:.5}", self.latitude, self.longitude),
        ]
    }
}

/// A rendered card ready for compositing.
#[derive(Debug, Clone)]
pub struct RenderedCard {
    pub overlay: RgbaImage,
    /// Offset of `overlay` within the target image.
    pub anchor: (u32, u32),
    pub plan: LayoutPlan,
    pub report: RenderReport,
}

/// Render the card for a `width` × `height` image.
///
/// Weather icons are read from `icon_dir` when given; otherwise built-in
/// glyphs are drawn.
pub fn render_card(
    width: u32,
    height: u32,
    content: &CardContent<'_>,
    config: &CardConfig,
    icon_dir: Option<&Path>,
) -> RenderedCard {
    let fonts = FontSet::load(config);
    render_card_with_fonts(width, height, content, config, icon_dir, &fonts)
}

/// [`render_card`] with already loaded fonts.
pub fn render_card_with_fonts(
    width: u32,
    height: u32,
    content: &CardContent<'_>,
    config: &CardConfig,
    icon_dir: Option<&Path>,
    fonts: &FontSet,
) -> RenderedCard {
    let plan = plan_layout(width, height, &config.layout);
    let style = &config.style;

    let mut overlay = RgbaImage::new(plan.overlay.width, plan.overlay.height);
    shapes::fill_rounded_rect(
        &mut overlay,
        Rect::new(0, 0, plan.overlay.width, plan.overlay.height),
        plan.corner_radius as f32,
        Rgba(style.background),
    );

    let map = settle("map", render_map(&mut overlay, plan.map, content.map, style));
    let text = settle("text", render_text(&mut overlay, &plan, content, config, fonts));
    let weather = settle(
        "weather",
        render_weather(&mut overlay, plan.weather, content.context, config, icon_dir, &fonts.bold),
    );

    let report = RenderReport { map, text, weather };
    log::debug!("Card {:?} at {:?}: {report:?}", plan.orientation, plan.anchor());

    RenderedCard {
        overlay,
        anchor: plan.anchor(),
        plan,
        report,
    }
}

/// Turn a region's result into its outcome, logging anything short of success.
fn settle(region: &str, result: Result<RegionOutcome>) -> RegionOutcome {
    match result {
        Ok(RegionOutcome::Fallback(reason)) => {
            log::warn!("{region} region: {reason}");
            RegionOutcome::Fallback(reason)
        }
        Ok(RegionOutcome::Skipped(reason)) => {
            log::warn!("{region} region skipped: {reason}");
            RegionOutcome::Skipped(reason)
        }
        Ok(outcome) => outcome,
        Err(e) => {
            log::warn!("{region} region skipped: {e:#}");
            RegionOutcome::Skipped(format!("{e:#}"))
        }
    }
}

/// Grey stand-in for a missing or unreadable map.
pub fn placeholder_map(width: u32, height: u32, style: &CardStyle) -> RgbaImage {
    RgbaImage::from_pixel(width.max(1), height.max(1), Rgba(style.placeholder))
}

// ── map ──────────────────────────────────────────────────────────────

fn render_map(canvas: &mut RgbaImage, region: Rect, map: Option<MapImage<'_>>, style: &CardStyle) -> Result<RegionOutcome> {
    if region.is_empty() {
        return Ok(RegionOutcome::Skipped("no room for the map".to_string()));
    }

    let placeholder = || placeholder_map(340, 180, style);
    let (source, outcome) = match map {
        Some(MapImage::Decoded(image)) => (image.clone(), RegionOutcome::Rendered),
        Some(MapImage::Encoded(bytes)) => match image::load_from_memory(bytes) {
            Ok(image) => (image.to_rgba8(), RegionOutcome::Rendered),
            Err(e) => (
                placeholder(),
                RegionOutcome::Fallback(format!("map image could not be decoded: {e}")),
            ),
        },
        None => (placeholder(), RegionOutcome::Fallback("no map image supplied".to_string())),
    };
    if source.width() == 0 || source.height() == 0 {
        anyhow::bail!("map image has no pixels");
    }

    let (tile_w, tile_h) = fit_within(source.dimensions(), (region.width, region.height));
    let mut tile = image::imageops::resize(&source, tile_w, tile_h, FilterType::Lanczos3);
    let x = region.x + (region.width - tile_w) / 2;
    let y = region.y + (region.height - tile_h) / 2;

    let short_side = tile_w.min(tile_h) as f32;
    let radius = short_side * 0.12;
    let blur = (short_side * 0.04).max(1.0);
    let offset = (blur * 0.75).round() as i64;

    let (shadow, margin) = shapes::soft_shadow(tile_w, tile_h, radius, blur, Rgba(style.shadow));
    overlay_at(
        canvas,
        &shadow,
        x as i64 - margin as i64 + offset,
        y as i64 - margin as i64 + offset,
    );

    shapes::round_corners(&mut tile, radius);
    overlay_at(canvas, &tile, x as i64, y as i64);

    let border = (short_side * 0.02).max(1.0);
    shapes::stroke_rounded_rect(canvas, Rect::new(x, y, tile_w, tile_h), radius, border, Rgba(style.map_border));

    Ok(outcome)
}

/// Largest size with the aspect ratio of `source` that fits in `bounds`.
/// Both sides are at least one pixel.
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let scale = (bounds.0 as f64 / source.0.max(1) as f64).min(bounds.1 as f64 / source.1.max(1) as f64);
    let w = ((source.0 as f64 * scale).round() as u32).clamp(1, bounds.0.max(1));
    let h = ((source.1 as f64 * scale).round() as u32).clamp(1, bounds.1.max(1));
    (w, h)
}

// ── text ─────────────────────────────────────────────────────────────

fn render_text(
    canvas: &mut RgbaImage,
    plan: &LayoutPlan,
    content: &CardContent<'_>,
    config: &CardConfig,
    fonts: &FontSet,
) -> Result<RegionOutcome> {
    if plan.info.is_empty() {
        return Ok(RegionOutcome::Skipped("no room for text".to_string()));
    }

    let sizing = FontSizing {
        address_px: plan.address_font_px,
        detail_px: plan.detail_font_px,
        min_px: config.min_font_px,
        step_px: config.font_step_px,
    };
    let block = layout_text_block(
        &fonts.bold,
        &fonts.regular,
        &content.context.address,
        &content.detail_lines(),
        plan.info,
        sizing,
    );
    if block.clipped {
        log::debug!("Text clipped to fit {:?}", plan.info);
    }

    let color = Rgba(config.style.text);
    for line in &block.lines {
        let face = if line.detail { &fonts.regular } else { &fonts.bold };
        face.draw(canvas, line.x, line.y, &line.text, line.px, color);
    }

    if fonts.uses_builtin() {
        Ok(RegionOutcome::Fallback("TrueType font unavailable, used built-in font".to_string()))
    } else {
        Ok(RegionOutcome::Rendered)
    }
}

// ── weather ──────────────────────────────────────────────────────────

fn render_weather(
    canvas: &mut RgbaImage,
    region: Rect,
    context: &ResolvedContext,
    config: &CardConfig,
    icon_dir: Option<&Path>,
    face: &Face,
) -> Result<RegionOutcome> {
    if region.is_empty() {
        return Ok(RegionOutcome::Skipped("no room for weather".to_string()));
    }

    let temperature = context.temperature_display.as_str();
    let width = region.width as f32;
    let initial_px = (region.height as f32 * 0.22).min(width * 0.3);
    let temp_px = fit_font_size(
        temperature,
        width,
        initial_px,
        config.min_font_px,
        config.font_step_px,
        |t, px| face.measure(t, px),
    );
    let temperature = truncate_to_width(temperature, width, temp_px, |t, px| face.measure(t, px));
    let line_h = face.line_height(temp_px);
    let gap = (region.height as f32 * 0.04).round();

    let icon_side = if context.weather_icon.is_some() {
        (region.height as f32 - line_h - gap).min(width).max(0.0) as u32
    } else {
        0
    };
    let icon_gap = if icon_side > 0 { gap } else { 0.0 };
    let stack_h = icon_side as f32 + icon_gap + line_h;
    let top = region.y as f32 + ((region.height as f32 - stack_h) / 2.0).max(0.0);
    let icon_rect = Rect::new(
        region.x + (region.width - icon_side) / 2,
        top.round() as u32,
        icon_side,
        icon_side,
    );

    let mut outcome = RegionOutcome::Rendered;
    match context.weather_icon {
        None => outcome = RegionOutcome::Fallback("no weather icon for current conditions".to_string()),
        Some(_) if icon_rect.is_empty() => {}
        Some(icon) => {
            let loaded = icon_dir
                .context("no icon directory configured")
                .and_then(|dir| assets::load_icon(dir, icon));
            match loaded {
                Ok(image) => {
                    let (w, h) = fit_within(image.dimensions(), (icon_side, icon_side));
                    let scaled = image::imageops::resize(&image, w, h, FilterType::Lanczos3);
                    overlay_at(
                        canvas,
                        &scaled,
                        (icon_rect.x + (icon_side - w) / 2) as i64,
                        (icon_rect.y + (icon_side - h) / 2) as i64,
                    );
                }
                Err(e) => {
                    shapes::draw_weather_glyph(canvas, icon_rect, icon);
                    outcome = RegionOutcome::Fallback(format!("built-in {icon:?} glyph used: {e:#}"));
                }
            }
        }
    }

    let text_w = face.measure(&temperature, temp_px);
    let text_x = region.x as f32 + ((width - text_w) / 2.0).max(0.0);
    let text_y = top + icon_side as f32 + icon_gap;
    face.draw(
        canvas,
        text_x.round() as i32,
        text_y.round() as i32,
        &temperature,
        temp_px,
        Rgba(config.style.text),
    );

    Ok(outcome)
}
