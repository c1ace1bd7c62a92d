//! Alpha compositing of the rendered card onto the photo.

use image::{ColorType, DynamicImage, ImageBuffer, Rgba, RgbaImage};

/// Source-over blend of `src` onto `dst`, both with straight (non-premultiplied) alpha.
///
/// Used while drawing into the transparent card surface, where the
/// destination alpha matters.
pub fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    if sa >= 1.0 {
        *dst = src;
        return;
    }

    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for i in 0..3 {
        let c = (src[i] as f32 * sa + dst[i] as f32 * da * (1.0 - sa)) / out_a;
        dst[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Draw `top` onto `base` with its top-left corner at (`x`, `y`).
///
/// Offsets may be negative; anything outside `base` is clipped.
pub fn overlay_at(base: &mut RgbaImage, top: &RgbaImage, x: i64, y: i64) {
    let (bw, bh) = (base.width() as i64, base.height() as i64);
    for (dx, dy, pixel) in top.enumerate_pixels() {
        let tx = x + dx as i64;
        let ty = y + dy as i64;
        if tx < 0 || ty < 0 || tx >= bw || ty >= bh {
            continue;
        }
        blend_over(base.get_pixel_mut(tx as u32, ty as u32), *pixel);
    }
}

/// Blend `overlay` onto `source` at `anchor` and flatten to an opaque image.
///
/// The result has the source's pixel dimensions and bit depth: 8-bit sources
/// come back as RGB8, 16-bit sources as RGB16, and float sources as RGB32F
/// with their out-of-range values intact away from the card.
/// Overlay pixels falling outside the source are clipped.
pub fn composite(source: &DynamicImage, overlay: &RgbaImage, anchor: (u32, u32)) -> DynamicImage {
    match bits_per_channel(source.color()) {
        8 => {
            let mut base = source.to_rgba8();
            blend_opaque(&mut base, overlay, anchor, |c| c as f32, |v| v.round().clamp(0.0, 255.0) as u8);
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(base).to_rgb8())
        }
        32 => {
            // Values above 1.0 outside the card are left as they are.
            let mut base = source.to_rgba32f();
            blend_opaque(&mut base, overlay, anchor, |c| c as f32 / 255.0, |v| v.max(0.0));
            DynamicImage::ImageRgb32F(DynamicImage::ImageRgba32F(base).to_rgb32f())
        }
        _ => {
            let mut base = source.to_rgba16();
            blend_opaque(
                &mut base,
                overlay,
                anchor,
                |c| c as f32 * 257.0,
                |v| v.round().clamp(0.0, 65535.0) as u16,
            );
            DynamicImage::ImageRgb16(DynamicImage::ImageRgba16(base).to_rgb16())
        }
    }
}

fn bits_per_channel(color: ColorType) -> u16 {
    color.bits_per_pixel() / color.channel_count().max(1) as u16
}

/// Blend straight-alpha 8-bit `overlay` pixels into an opaque base of any
/// depth. `widen` lifts an 8-bit channel to the base's range and `narrow`
/// stores a blended value back, clamping as the depth requires.
fn blend_opaque<T>(
    base: &mut ImageBuffer<Rgba<T>, Vec<T>>,
    overlay: &RgbaImage,
    anchor: (u32, u32),
    widen: impl Fn(u8) -> f32,
    narrow: impl Fn(f32) -> T,
) where
    T: image::Primitive + Into<f32>,
    Rgba<T>: image::Pixel<Subpixel = T>,
{
    let (bw, bh) = base.dimensions();

    for (dx, dy, pixel) in overlay.enumerate_pixels() {
        let (tx, ty) = (anchor.0 as u64 + dx as u64, anchor.1 as u64 + dy as u64);
        if tx >= bw as u64 || ty >= bh as u64 {
            continue;
        }
        let alpha = pixel[3] as f32 / 255.0;
        if alpha <= 0.0 {
            continue;
        }

        let dst = base.get_pixel_mut(tx as u32, ty as u32);
        for i in 0..3 {
            let below: f32 = dst[i].into();
            dst[i] = narrow(widen(pixel[i]) * alpha + below * (1.0 - alpha));
        }
        dst[3] = T::DEFAULT_MAX_VALUE;
    }
}
