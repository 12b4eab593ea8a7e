//! Compositor for Swirl Search
//! Draws particle strokes onto a working layer and composites the glowing
//! result over the background layer

use anyhow::Context;
use image::{Rgba as Pixel, RgbaImage};
use std::path::Path;

use crate::config::GlowConfig;
use crate::particles::Segment;
use crate::postprocess::{GlowProcessor, Layer, Rgba};

/// Convert CSS-style HSLA (hue in degrees, s/l/a in 0..1) to straight RGBA.
pub fn hsla_to_rgba(hue: f32, saturation: f32, lightness: f32, alpha: f32) -> Rgba {
    let h = hue.rem_euclid(360.0) / 60.0;
    let s = saturation.clamp(0.0, 1.0);
    let l = lightness.clamp(0.0, 1.0);

    let chroma = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = chroma * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = l - chroma / 2.0;
    [r + m, g + m, b + m, alpha.clamp(0.0, 1.0)]
}

fn unpremultiply(pixel: Pixel<u8>) -> Pixel<u8> {
    let [r, g, b, a] = pixel.0;
    match a {
        0 => Pixel([0, 0, 0, 0]),
        255 => pixel,
        _ => {
            let scale = |c: u8| ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8;
            Pixel([scale(r), scale(g), scale(b), a])
        }
    }
}

/// Frame compositor combining the particle and background layers
pub struct Compositor {
    pub width: u32,
    pub height: u32,

    /// Offscreen layer strokes are drawn into (cleared every frame)
    particles: Layer,
    /// Visible layer: background fill plus glow
    background: Layer,
    glow: GlowProcessor,

    output: RgbaImage,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            particles: Layer::new(width, height),
            background: Layer::new(width, height),
            glow: GlowProcessor::new(),
            output: RgbaImage::new(width, height),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.particles.resize(width, height);
            self.background.resize(width, height);
            self.output = RgbaImage::new(width, height);
        }
    }

    #[cfg(test)]
    pub fn particle_layer(&self) -> &Layer {
        &self.particles
    }

    #[cfg(test)]
    pub fn output(&self) -> &RgbaImage {
        &self.output
    }

    /// Render a complete frame
    ///
    /// `glow_scale` maps configured blur radii onto this surface's pixels.
    pub fn render_frame(
        &mut self,
        segments: &[Segment],
        background: Rgba,
        glow: &GlowConfig,
        glow_scale: f32,
    ) -> &RgbaImage {
        // 1. Clear the working layer
        self.particles.clear();

        // 2. Fill the background
        let a = background[3];
        self.background
            .fill([background[0] * a, background[1] * a, background[2] * a, a]);

        // 3. Strokes
        for segment in segments {
            self.draw_segment(segment);
        }

        // 4. Glow passes + sharp copy
        self.glow
            .apply(&self.particles, &mut self.background, glow, glow_scale);

        // 5. Quantize
        self.quantize();
        &self.output
    }

    /// Round-capped line of width `segment.width`, colored
    /// `hsla(hue, 100%, 60%, alpha)`, antialiased over one pixel.
    pub fn draw_segment(&mut self, segment: &Segment) {
        if segment.alpha <= 0.0 || self.width == 0 || self.height == 0 {
            return;
        }

        let [r, g, b, alpha] = hsla_to_rgba(segment.hue, 1.0, 0.6, segment.alpha);
        let radius = (segment.width * 0.5).max(0.5);
        let reach = radius + 1.0;

        let (ax, ay) = (segment.from.x, segment.from.y);
        let (bx, by) = (segment.to.x, segment.to.y);

        let min_x = (ax.min(bx) - reach).floor().max(0.0) as i64;
        let max_x = (ax.max(bx) + reach).ceil().min(self.width as f32 - 1.0) as i64;
        let min_y = (ay.min(by) - reach).floor().max(0.0) as i64;
        let max_y = (ay.max(by) + reach).ceil().min(self.height as f32 - 1.0) as i64;
        if min_x > max_x || min_y > max_y {
            return;
        }

        let (dx, dy) = (bx - ax, by - ay);
        let len_sq = dx * dx + dy * dy;

        for py in min_y..=max_y {
            for px in min_x..=max_x {
                let cx = px as f32 + 0.5;
                let cy = py as f32 + 0.5;

                // Distance from pixel center to the segment
                let t = if len_sq > f32::EPSILON {
                    (((cx - ax) * dx + (cy - ay) * dy) / len_sq).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let ex = cx - (ax + dx * t);
                let ey = cy - (ay + dy * t);
                let dist = (ex * ex + ey * ey).sqrt();

                let coverage = (radius + 0.5 - dist).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                self.particles
                    .blend_over(px as u32, py as u32, [r, g, b], alpha * coverage);
            }
        }
    }

    fn quantize(&mut self) {
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        for (pixel, src) in self.output.pixels_mut().zip(self.background.pixels()) {
            *pixel = Pixel([to_u8(src[0]), to_u8(src[1]), to_u8(src[2]), to_u8(src[3])]);
        }
    }

    /// Last rendered frame as an egui image (the frame is premultiplied)
    pub fn to_color_image(&self) -> egui::ColorImage {
        egui::ColorImage::from_rgba_premultiplied(
            [self.width as usize, self.height as usize],
            self.output.as_raw(),
        )
    }

    /// Write the last rendered frame as PNG (straight alpha)
    pub fn save_png(&self, path: &Path) -> anyhow::Result<()> {
        let mut straight = self.output.clone();
        for pixel in straight.pixels_mut() {
            *pixel = unpremultiply(*pixel);
        }
        straight
            .save(path)
            .with_context(|| format!("saving frame to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Vec2;

    fn segment(from: (f32, f32), to: (f32, f32), alpha: f32) -> Segment {
        Segment {
            from: Vec2::new(from.0, from.1),
            to: Vec2::new(to.0, to.1),
            width: 3.0,
            hue: 240.0,
            alpha,
        }
    }

    fn no_glow() -> GlowConfig {
        GlowConfig {
            enabled: false,
            ..GlowConfig::default()
        }
    }

    #[test]
    fn test_hsla_primaries() {
        let red = hsla_to_rgba(0.0, 1.0, 0.5, 1.0);
        assert_eq!(red, [1.0, 0.0, 0.0, 1.0]);

        let blue = hsla_to_rgba(240.0, 1.0, 0.5, 0.5);
        assert!((blue[2] - 1.0).abs() < 1e-6 && blue[0].abs() < 1e-6);
        assert_eq!(blue[3], 0.5);

        let wrapped = hsla_to_rgba(360.0 + 120.0, 1.0, 0.5, 1.0);
        assert!((wrapped[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hsla_background_is_dark_violet() {
        let [r, g, b, a] = hsla_to_rgba(260.0, 0.4, 0.05, 1.0);
        assert!(b > r && r > g);
        assert!(b < 0.1);
        assert_eq!(a, 1.0);
    }

    #[test]
    fn test_segment_covers_its_path_only() {
        let mut compositor = Compositor::new(50, 20);
        compositor.draw_segment(&segment((5.0, 10.0), (45.0, 10.0), 1.0));

        let layer = compositor.particle_layer();
        for x in 6..44 {
            assert!(layer.get(x, 9)[3] > 0.9, "gap at x={x}");
        }
        assert_eq!(layer.get(25, 0)[3], 0.0);
        assert_eq!(layer.get(25, 19)[3], 0.0);
    }

    #[test]
    fn test_invisible_or_offscreen_segments_are_skipped() {
        let mut compositor = Compositor::new(10, 10);
        compositor.draw_segment(&segment((2.0, 2.0), (8.0, 8.0), 0.0));
        compositor.draw_segment(&segment((-50.0, -50.0), (-40.0, -45.0), 1.0));
        compositor.draw_segment(&segment((100.0, 5.0), (120.0, 5.0), 1.0));

        assert!(compositor.particle_layer().pixels().iter().all(|p| p[3] == 0.0));
    }

    #[test]
    fn test_empty_frame_is_background() {
        let mut compositor = Compositor::new(4, 3);
        let frame = compositor.render_frame(&[], [0.2, 0.4, 0.6, 1.0], &no_glow(), 1.0);
        for pixel in frame.pixels() {
            assert_eq!(pixel.0, [51, 102, 153, 255]);
        }
    }

    #[test]
    fn test_particle_layer_is_cleared_between_frames() {
        let mut compositor = Compositor::new(30, 30);
        let stroke = [segment((5.0, 15.0), (25.0, 15.0), 1.0)];
        compositor.render_frame(&stroke, [0.0, 0.0, 0.0, 1.0], &no_glow(), 1.0);
        assert!(compositor.output().get_pixel(15, 15).0[2] > 200);

        let frame = compositor.render_frame(&[], [0.0, 0.0, 0.0, 1.0], &no_glow(), 1.0);
        assert_eq!(frame.get_pixel(15, 15).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_glow_spreads_beyond_stroke() {
        let mut compositor = Compositor::new(60, 60);
        let stroke = [segment((20.0, 30.0), (40.0, 30.0), 1.0)];

        compositor.render_frame(&stroke, [0.0, 0.0, 0.0, 1.0], &no_glow(), 1.0);
        let plain = compositor.output().get_pixel(30, 36).0;

        compositor.render_frame(&stroke, [0.0, 0.0, 0.0, 1.0], &GlowConfig::default(), 1.0);
        let glowing = compositor.output().get_pixel(30, 36).0;

        assert_eq!(plain[2], 0);
        assert!(glowing[2] > 0);
    }

    #[test]
    fn test_translucent_background_is_premultiplied_once() {
        let mut compositor = Compositor::new(2, 2);
        compositor.render_frame(&[], [0.2, 0.4, 0.6, 0.5], &no_glow(), 1.0);

        let image = compositor.to_color_image();
        assert_eq!(
            image.pixels[0],
            egui::Color32::from_rgba_premultiplied(26, 51, 77, 128)
        );
    }

    #[test]
    fn test_png_snapshot_has_straight_alpha() {
        let mut compositor = Compositor::new(2, 2);
        compositor.render_frame(&[], [0.2, 0.4, 0.6, 0.5], &no_glow(), 1.0);

        let path = std::env::temp_dir().join(format!("swirl-frame-{}.png", std::process::id()));
        compositor.save_png(&path).unwrap();
        let saved = image::open(&path).unwrap().to_rgba8();
        std::fs::remove_file(&path).ok();

        let [r, g, b, a] = saved.get_pixel(0, 0).0;
        assert_eq!(a, 128);
        assert!((r as i32 - 51).abs() <= 1);
        assert!((g as i32 - 102).abs() <= 1);
        assert!((b as i32 - 153).abs() <= 1);
    }

    #[test]
    fn test_unpremultiply_edges() {
        assert_eq!(unpremultiply(Pixel([10, 20, 30, 0])), Pixel([0, 0, 0, 0]));
        assert_eq!(unpremultiply(Pixel([10, 20, 30, 255])), Pixel([10, 20, 30, 255]));
        assert_eq!(unpremultiply(Pixel([200, 0, 0, 100])), Pixel([255, 0, 0, 100]));
    }

    #[test]
    fn test_resize_reallocates_surfaces() {
        let mut compositor = Compositor::new(8, 8);
        compositor.resize(16, 4);
        let frame = compositor.render_frame(&[], [1.0, 1.0, 1.0, 1.0], &no_glow(), 1.0);
        assert_eq!(frame.dimensions(), (16, 4));
        assert_eq!(compositor.to_color_image().size, [16, 4]);
    }
}
