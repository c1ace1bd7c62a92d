//! Anti-aliased rounded rectangles, drop shadows, the map pin and the
//! built-in weather glyphs.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_ellipse_mut, draw_filled_rect_mut, draw_line_segment_mut,
    draw_polygon_mut,
};
use imageproc::point::Point;

use super::layout::Rect;
use crate::compose::blend_over;
use crate::lookup::WeatherIcon;

const PIN_RED: Rgba<u8> = Rgba([220, 40, 40, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const SUN: Rgba<u8> = Rgba([255, 196, 40, 255]);
const CLOUD: Rgba<u8> = Rgba([228, 230, 236, 255]);
const STORM_CLOUD: Rgba<u8> = Rgba([150, 155, 168, 255]);
const WATER: Rgba<u8> = Rgba([90, 160, 240, 255]);
const FOG: Rgba<u8> = Rgba([200, 204, 212, 255]);

/// Fraction of the pixel at (`fx`, `fy`) covered by a `w` × `h` rounded
/// rectangle at the origin.
fn coverage(fx: f32, fy: f32, w: f32, h: f32, radius: f32) -> f32 {
    if fx < 0.0 || fy < 0.0 || fx > w || fy > h {
        return 0.0;
    }
    let r = radius.min(w / 2.0).min(h / 2.0).max(0.0);
    let cx = fx.clamp(r, w - r);
    let cy = fy.clamp(r, h - r);
    let d = ((fx - cx).powi(2) + (fy - cy).powi(2)).sqrt();
    if d <= 0.0 { 1.0 } else { (r - d + 0.5).clamp(0.0, 1.0) }
}

fn with_alpha(color: Rgba<u8>, factor: f32) -> Rgba<u8> {
    let a = (color[3] as f32 * factor).round().clamp(0.0, 255.0) as u8;
    Rgba([color[0], color[1], color[2], a])
}

/// Blend a filled rounded rectangle onto `canvas`. Clipped to the canvas.
pub fn fill_rounded_rect(canvas: &mut RgbaImage, rect: Rect, radius: f32, color: Rgba<u8>) {
    let (w, h) = (rect.width as f32, rect.height as f32);
    for y in rect.y..rect.bottom().min(canvas.height()) {
        for x in rect.x..rect.right().min(canvas.width()) {
            let c = coverage((x - rect.x) as f32 + 0.5, (y - rect.y) as f32 + 0.5, w, h, radius);
            if c > 0.0 {
                blend_over(canvas.get_pixel_mut(x, y), with_alpha(color, c));
            }
        }
    }
}

/// Blend a rounded outline `width` pixels thick, drawn inside `rect`.
pub fn stroke_rounded_rect(canvas: &mut RgbaImage, rect: Rect, radius: f32, width: f32, color: Rgba<u8>) {
    let (w, h) = (rect.width as f32, rect.height as f32);
    let (iw, ih) = ((w - 2.0 * width).max(0.0), (h - 2.0 * width).max(0.0));
    let inner_radius = (radius - width).max(0.0);

    for y in rect.y..rect.bottom().min(canvas.height()) {
        for x in rect.x..rect.right().min(canvas.width()) {
            let fx = (x - rect.x) as f32 + 0.5;
            let fy = (y - rect.y) as f32 + 0.5;
            let outer = coverage(fx, fy, w, h, radius);
            let inner = if iw > 0.0 && ih > 0.0 {
                coverage(fx - width, fy - width, iw, ih, inner_radius)
            } else {
                0.0
            };
            let c = (outer - inner).clamp(0.0, 1.0);
            if c > 0.0 {
                blend_over(canvas.get_pixel_mut(x, y), with_alpha(color, c));
            }
        }
    }
}

/// Make the corners of `image` transparent with an anti-aliased edge.
pub fn round_corners(image: &mut RgbaImage, radius: f32) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let c = coverage(x as f32 + 0.5, y as f32 + 0.5, w, h, radius);
        if c < 1.0 {
            pixel[3] = (pixel[3] as f32 * c).round() as u8;
        }
    }
}

/// A blurred rounded-rectangle shadow for a `width` × `height` tile.
///
/// The returned image is larger than the tile by `margin` on every side;
/// place it at the tile's position minus `margin`.
pub fn soft_shadow(width: u32, height: u32, radius: f32, blur: f32, color: Rgba<u8>) -> (RgbaImage, u32) {
    let margin = (blur * 3.0).ceil().max(0.0) as u32;
    let transparent = Rgba([color[0], color[1], color[2], 0]);
    let mut shadow = RgbaImage::from_pixel(width + 2 * margin, height + 2 * margin, transparent);
    fill_rounded_rect(&mut shadow, Rect::new(margin, margin, width, height), radius, color);

    if blur > 0.0 && width > 0 && height > 0 {
        shadow = imageproc::filter::gaussian_blur_f32(&shadow, blur);
    }
    (shadow, margin)
}

/// Draw a location pin whose tip touches (`cx`, `cy`).
pub fn draw_pin(canvas: &mut RgbaImage, cx: f32, cy: f32, size: f32) {
    let r = (size * 0.5).max(2.0);
    let head = (cx, cy - r * 1.6);
    let outline = (r * 0.25).max(1.0);

    draw_filled_circle_mut(canvas, (head.0.round() as i32, head.1.round() as i32), (r + outline).round() as i32, WHITE);
    let pointer = [
        Point::new((cx - r * 0.8).round() as i32, (head.1 + r * 0.4).round() as i32),
        Point::new((cx + r * 0.8).round() as i32, (head.1 + r * 0.4).round() as i32),
        Point::new(cx.round() as i32, cy.round() as i32),
    ];
    draw_polygon_mut(canvas, &pointer, PIN_RED);
    draw_filled_circle_mut(canvas, (head.0.round() as i32, head.1.round() as i32), r.round() as i32, PIN_RED);
    draw_filled_circle_mut(
        canvas,
        (head.0.round() as i32, head.1.round() as i32),
        (r * 0.35).round().max(1.0) as i32,
        WHITE,
    );
}

/// Draw a vector glyph for `icon` filling the square centered in `rect`.
///
/// Regions smaller than 8 pixels are left untouched.
pub fn draw_weather_glyph(canvas: &mut RgbaImage, rect: Rect, icon: WeatherIcon) {
    let s = rect.width.min(rect.height) as f32;
    if s < 8.0 {
        return;
    }
    let (cx, cy) = rect.center();

    match icon {
        WeatherIcon::Clear => draw_sun(canvas, cx, cy, s * 0.22),
        WeatherIcon::PartlyCloudy => {
            draw_sun(canvas, cx - s * 0.14, cy - s * 0.12, s * 0.16);
            draw_cloud(canvas, cx + s * 0.06, cy + s * 0.08, s * 0.7, CLOUD);
        }
        WeatherIcon::Cloudy => draw_cloud(canvas, cx, cy, s * 0.8, CLOUD),
        WeatherIcon::Fog => {
            draw_cloud(canvas, cx, cy - s * 0.12, s * 0.7, CLOUD);
            let bar_h = (s * 0.06).max(1.0) as u32;
            for i in 0..3 {
                let y = cy + s * (0.12 + 0.11 * i as f32);
                let half = s * (0.36 - 0.05 * i as f32);
                let bar = imageproc::rect::Rect::at((cx - half) as i32, y as i32).of_size((half * 2.0) as u32, bar_h);
                draw_filled_rect_mut(canvas, bar, FOG);
            }
        }
        WeatherIcon::Drizzle => {
            draw_cloud(canvas, cx, cy - s * 0.12, s * 0.75, CLOUD);
            draw_streaks(canvas, cx, cy + s * 0.14, s, 3, 0.1);
        }
        WeatherIcon::Rain => {
            draw_cloud(canvas, cx, cy - s * 0.12, s * 0.75, CLOUD);
            draw_streaks(canvas, cx, cy + s * 0.14, s, 4, 0.2);
        }
        WeatherIcon::Storm => {
            draw_cloud(canvas, cx, cy - s * 0.14, s * 0.75, STORM_CLOUD);
            let bolt = [
                Point::new((cx + s * 0.02) as i32, (cy + s * 0.02) as i32),
                Point::new((cx - s * 0.12) as i32, (cy + s * 0.24) as i32),
                Point::new((cx - s * 0.01) as i32, (cy + s * 0.24) as i32),
                Point::new((cx - s * 0.08) as i32, (cy + s * 0.42) as i32),
                Point::new((cx + s * 0.12) as i32, (cy + s * 0.17) as i32),
                Point::new((cx + s * 0.01) as i32, (cy + s * 0.17) as i32),
            ];
            draw_polygon_mut(canvas, &bolt, SUN);
        }
    }
}

fn draw_sun(canvas: &mut RgbaImage, cx: f32, cy: f32, r: f32) {
    for i in 0..8 {
        let angle = i as f32 * std::f32::consts::FRAC_PI_4;
        let (sin, cos) = angle.sin_cos();
        let inner = (cx + cos * r * 1.3, cy + sin * r * 1.3);
        let outer = (cx + cos * r * 1.75, cy + sin * r * 1.75);
        for offset in [-0.5f32, 0.0, 0.5] {
            draw_line_segment_mut(
                canvas,
                (inner.0 + offset, inner.1 + offset),
                (outer.0 + offset, outer.1 + offset),
                SUN,
            );
        }
    }
    draw_filled_circle_mut(canvas, (cx as i32, cy as i32), r.max(1.0) as i32, SUN);
}

/// A cloud `width` wide centered on (`cx`, `cy`).
fn draw_cloud(canvas: &mut RgbaImage, cx: f32, cy: f32, width: f32, color: Rgba<u8>) {
    let base_h = (width * 0.28).max(1.0);
    draw_filled_ellipse_mut(
        canvas,
        (cx as i32, (cy + base_h * 0.3) as i32),
        ((width * 0.5) as i32).max(1),
        ((base_h * 0.5) as i32).max(1),
        color,
    );
    draw_filled_circle_mut(canvas, ((cx - width * 0.2) as i32, cy as i32), (width * 0.18) as i32, color);
    draw_filled_circle_mut(
        canvas,
        ((cx + width * 0.08) as i32, (cy - width * 0.08) as i32),
        (width * 0.25) as i32,
        color,
    );
}

/// Slanted drops below a cloud.
fn draw_streaks(canvas: &mut RgbaImage, cx: f32, top: f32, s: f32, count: u32, length: f32) {
    let spacing = s * 0.14;
    let start = cx - spacing * (count as f32 - 1.0) / 2.0;
    for i in 0..count {
        let x = start + spacing * i as f32;
        for offset in [0.0f32, 1.0] {
            draw_line_segment_mut(
                canvas,
                (x + offset, top),
                (x - s * length * 0.35 + offset, top + s * length),
                WATER,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounded_rect_leaves_corners_clear() {
        let mut canvas = RgbaImage::new(40, 20);
        fill_rounded_rect(&mut canvas, Rect::new(0, 0, 40, 20), 10.0, Rgba([30, 30, 30, 180]));
        assert_eq!(canvas.get_pixel(0, 0)[3], 0);
        assert_eq!(canvas.get_pixel(39, 19)[3], 0);
        assert_eq!(*canvas.get_pixel(20, 10), Rgba([30, 30, 30, 180]));
    }

    #[test]
    fn zero_radius_fills_every_pixel() {
        let mut canvas = RgbaImage::new(6, 4);
        fill_rounded_rect(&mut canvas, Rect::new(0, 0, 6, 4), 0.0, WHITE);
        assert!(canvas.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn fill_is_clipped_to_canvas() {
        let mut canvas = RgbaImage::new(5, 5);
        fill_rounded_rect(&mut canvas, Rect::new(3, 3, 50, 50), 2.0, WHITE);
        assert_eq!(canvas.get_pixel(0, 0)[3], 0);
        assert_eq!(canvas.get_pixel(4, 4)[3], 255);
    }

    #[test]
    fn stroke_only_touches_the_edge() {
        let mut canvas = RgbaImage::new(30, 30);
        stroke_rounded_rect(&mut canvas, Rect::new(0, 0, 30, 30), 0.0, 2.0, WHITE);
        assert_eq!(canvas.get_pixel(0, 15)[3], 255);
        assert_eq!(canvas.get_pixel(15, 1)[3], 255);
        assert_eq!(canvas.get_pixel(15, 15)[3], 0);
    }

    #[test]
    fn round_corners_keeps_the_middle_opaque() {
        let mut image = RgbaImage::from_pixel(20, 20, WHITE);
        round_corners(&mut image, 6.0);
        assert_eq!(image.get_pixel(0, 0)[3], 0);
        assert_eq!(image.get_pixel(10, 10)[3], 255);
        assert_eq!(image.get_pixel(10, 0)[3], 255);
    }

    #[test]
    fn shadow_is_padded_and_soft() {
        let (shadow, margin) = soft_shadow(20, 10, 3.0, 2.0, Rgba([0, 0, 0, 90]));
        assert_eq!(margin, 6);
        assert_eq!(shadow.dimensions(), (32, 22));
        let center = shadow.get_pixel(16, 11)[3];
        let edge = shadow.get_pixel(margin, 11)[3];
        assert!(center > edge, "center {center}, edge {edge}");
        assert_eq!(shadow.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn pin_marks_the_tip_location() {
        let mut canvas = RgbaImage::from_pixel(100, 60, Rgba([200, 200, 200, 255]));
        draw_pin(&mut canvas, 50.0, 30.0, 16.0);
        assert_eq!(*canvas.get_pixel(50, 22), PIN_RED);
        assert_eq!(*canvas.get_pixel(50, 17), WHITE);
    }

    #[test]
    fn every_glyph_draws_something() {
        for icon in [
            WeatherIcon::Clear,
            WeatherIcon::PartlyCloudy,
            WeatherIcon::Cloudy,
            WeatherIcon::Fog,
            WeatherIcon::Drizzle,
            WeatherIcon::Rain,
            WeatherIcon::Storm,
        ] {
            let mut canvas = RgbaImage::new(64, 64);
            draw_weather_glyph(&mut canvas, Rect::new(0, 0, 64, 64), icon);
            assert!(canvas.pixels().any(|p| p[3] > 0), "{icon:?} drew nothing");
        }
    }

    #[test]
    fn tiny_glyph_region_is_skipped() {
        let mut canvas = RgbaImage::new(10, 10);
        draw_weather_glyph(&mut canvas, Rect::new(0, 0, 5, 5), WeatherIcon::Storm);
        assert!(canvas.pixels().all(|p| p[3] == 0));
    }
}
