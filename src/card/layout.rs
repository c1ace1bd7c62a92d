//! Responsive card geometry.
//!
//! All functions here are pure: the same image dimensions and
//! [`LayoutConfig`] always give the same [`LayoutPlan`]. Nothing is measured
//! or drawn.
//!
//! The card is split along a *main* axis into map, info and weather regions
//! separated by padding. The main axis is horizontal for a landscape band and
//! vertical for a portrait column. The *cross* axis is the other one, and its
//! inner extent drives every region size.

use serde::Serialize;

use crate::config::LayoutConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Full-width band anchored at the bottom edge.
    Landscape,
    /// Column anchored at the bottom-right corner.
    Portrait,
}

impl Orientation {
    /// `width / height >= 1` is landscape. A zero height counts as landscape.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if height == 0 || width as f64 / height as f64 >= 1.0 {
            Self::Landscape
        } else {
            Self::Portrait
        }
    }
}

/// Axis-aligned pixel rectangle. May be empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Center point in floating-point pixel coordinates.
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// True when the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Geometry of one card.
///
/// `overlay` is in image coordinates; its origin is the compositing anchor.
/// The region rectangles are relative to the overlay surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutPlan {
    pub orientation: Orientation,
    pub overlay: Rect,
    pub padding: u32,
    pub map: Rect,
    pub info: Rect,
    pub weather: Rect,
    /// Starting size for the address before shrink-to-fit.
    pub address_font_px: f32,
    /// Starting size for the date/time and coordinate lines.
    pub detail_font_px: f32,
    pub corner_radius: u32,
}

impl LayoutPlan {
    /// Compositing offset of the overlay within the image.
    pub fn anchor(&self) -> (u32, u32) {
        (self.overlay.x, self.overlay.y)
    }

    /// Extent of the info region along the main axis.
    pub fn center_extent(&self) -> u32 {
        match self.orientation {
            Orientation::Landscape => self.info.width,
            Orientation::Portrait => self.info.height,
        }
    }
}

fn scaled(value: u32, ratio: f32) -> u32 {
    (value as f32 * ratio).round() as u32
}

/// Compute the card geometry for an image of `width` × `height` pixels.
pub fn plan_layout(width: u32, height: u32, config: &LayoutConfig) -> LayoutPlan {
    let orientation = Orientation::from_dimensions(width, height);

    let (overlay_w, overlay_h) = match orientation {
        Orientation::Landscape => (width, scaled(height, config.band_ratio).clamp(1, height.max(1))),
        Orientation::Portrait => (
            scaled(width, config.column_width_ratio).clamp(1, width.max(1)),
            scaled(height, config.column_height_ratio).clamp(1, height.max(1)),
        ),
    };
    let overlay = Rect::new(
        width.saturating_sub(overlay_w),
        height.saturating_sub(overlay_h),
        overlay_w,
        overlay_h,
    );

    let (main, cross) = match orientation {
        Orientation::Landscape => (overlay_w, overlay_h),
        Orientation::Portrait => (overlay_h, overlay_w),
    };
    let padding = scaled(cross, config.padding_ratio).max(1);
    let inner = cross.saturating_sub(2 * padding);
    let inner_f = inner as f32;

    let (map_want, weather_want, center_min) = match orientation {
        Orientation::Landscape => (
            inner_f * config.map_aspect,
            inner_f * config.landscape_weather_ratio,
            inner_f * config.landscape_center_min_ratio,
        ),
        Orientation::Portrait => (
            inner_f / config.map_aspect.max(f32::EPSILON),
            inner_f * config.portrait_weather_ratio,
            inner_f * config.portrait_center_min_ratio,
        ),
    };
    let available = main.saturating_sub(4 * padding);
    let (map_len, weather_len) = side_extents(
        map_want,
        weather_want,
        center_min,
        inner_f * config.side_floor_ratio,
        available as f32,
    );
    let center_len = available.saturating_sub(map_len + weather_len);

    let (map, info, weather) = match orientation {
        Orientation::Landscape => {
            let map = Rect::new(padding, padding, map_len, inner);
            let info = Rect::new(map.right() + padding, padding, center_len, inner);
            let weather = Rect::new(info.right() + padding, padding, weather_len, inner);
            (map, info, weather)
        }
        Orientation::Portrait => {
            let map = Rect::new(padding, padding, inner, map_len);
            let info = Rect::new(padding, map.bottom() + padding, inner, center_len);
            let weather = Rect::new(padding, info.bottom() + padding, inner, weather_len);
            (map, info, weather)
        }
    };

    let divisor = match orientation {
        Orientation::Landscape => config.landscape_font_divisor,
        Orientation::Portrait => config.portrait_font_divisor,
    };
    let address_font_px = cross as f32 / divisor.max(1.0);
    let corner_radius = match orientation {
        Orientation::Landscape => cross / 2,
        Orientation::Portrait => cross / 8,
    };

    let plan = LayoutPlan {
        orientation,
        overlay,
        padding,
        map,
        info,
        weather,
        address_font_px,
        detail_font_px: address_font_px * config.detail_font_ratio,
        corner_radius,
    };
    log::debug!("Layout for {width}x{height}: {plan:?}");
    plan
}

/// Shrink the map and weather extents so the center gets `center_min`.
///
/// Both sides give up the same amount, but neither goes below `floor`. If
/// the sides still do not fit in `available`, they are scaled down together.
fn side_extents(map: f32, weather: f32, center_min: f32, floor: f32, available: f32) -> (u32, u32) {
    let (mut map, mut weather) = (map, weather);

    let deficit = map + weather + center_min - available;
    if deficit > 0.0 {
        let cut = deficit / 2.0;
        map = (map - cut).max(floor.min(map));
        weather = (weather - cut).max(floor.min(weather));
    }

    let total = map + weather;
    if total > available {
        let k = if total > 0.0 { available.max(0.0) / total } else { 0.0 };
        map *= k;
        weather *= k;
    }

    (map.floor() as u32, weather.floor() as u32)
}
