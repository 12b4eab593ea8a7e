//! Post-Processing Effects for Swirl Search
//! CPU float layers, separable gaussian blur and additive ("lighter") glow

use rayon::prelude::*;

use crate::config::GlowConfig;

/// Premultiplied RGBA, each channel nominally in 0..1 (additive passes may exceed 1).
pub type Rgba = [f32; 4];

pub const TRANSPARENT: Rgba = [0.0; 4];

/// Widest kernel a single blur pass will use.
const MAX_KERNEL: usize = 61;

/// A float RGBA drawing surface
#[derive(Clone, Debug)]
pub struct Layer {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl Layer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; (width * height) as usize],
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.pixels = vec![TRANSPARENT; (width * height) as usize];
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    #[cfg(test)]
    pub fn get(&self, x: u32, y: u32) -> Rgba {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn clear(&mut self) {
        self.fill(TRANSPARENT);
    }

    pub fn fill(&mut self, color: Rgba) {
        self.pixels.fill(color);
    }

    /// Source-over blend of a straight-alpha color.
    pub fn blend_over(&mut self, x: u32, y: u32, rgb: [f32; 3], alpha: f32) {
        let a = alpha.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let idx = (y * self.width + x) as usize;
        let dst = &mut self.pixels[idx];
        let keep = 1.0 - a;
        dst[0] = rgb[0] * a + dst[0] * keep;
        dst[1] = rgb[1] * a + dst[1] * keep;
        dst[2] = rgb[2] * a + dst[2] * keep;
        dst[3] = a + dst[3] * keep;
    }

    /// "lighter" compositing: `self += src * gain` on RGB, alpha added unscaled.
    pub fn add_scaled(&mut self, src: &[Rgba], gain: f32) {
        debug_assert_eq!(src.len(), self.pixels.len());
        self.pixels
            .par_iter_mut()
            .zip(src.par_iter())
            .for_each(|(dst, s)| {
                dst[0] += s[0] * gain;
                dst[1] += s[1] * gain;
                dst[2] += s[2] * gain;
                dst[3] = (dst[3] + s[3]).min(1.0);
            });
    }
}

/// Multi-pass glow: blurred, brightened copies of a layer added onto a target.
pub struct GlowProcessor {
    scratch: Vec<Rgba>,
    blurred: Vec<Rgba>,
}

impl Default for GlowProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl GlowProcessor {
    pub fn new() -> Self {
        Self {
            scratch: Vec::new(),
            blurred: Vec::new(),
        }
    }

    /// Composite `source` onto `target`: one additive blurred copy per glow
    /// pass, then the sharp layer itself.
    ///
    /// `scale` converts configured blur radii (viewport pixels) into layer pixels.
    pub fn apply(&mut self, source: &Layer, target: &mut Layer, config: &GlowConfig, scale: f32) {
        debug_assert_eq!(source.width(), target.width());
        debug_assert_eq!(source.height(), target.height());

        if config.enabled {
            for pass in &config.passes {
                self.blur(source, pass.blur_px * scale);
                target.add_scaled(&self.blurred, pass.brightness);
            }
        }

        target.add_scaled(source.pixels(), config.core_opacity);
    }

    /// Blur `source` into `self.blurred`.
    fn blur(&mut self, source: &Layer, sigma: f32) {
        let len = source.pixels().len();
        self.blurred.resize(len, TRANSPARENT);
        self.scratch.resize(len, TRANSPARENT);

        if sigma < 0.3 {
            self.blurred.copy_from_slice(source.pixels());
            return;
        }

        let radius = (sigma * 3.0).ceil() as usize;
        let kernel = gaussian_kernel((radius * 2 + 1).min(MAX_KERNEL), sigma);

        blur_horizontal(
            source.pixels(),
            &mut self.scratch,
            source.width(),
            &kernel,
        );
        blur_vertical(
            &self.scratch,
            &mut self.blurred,
            source.width(),
            source.height(),
            &kernel,
        );
    }
}

/// Normalized 1D gaussian kernel of odd `size`.
pub fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let size = size.max(1) | 1;
    let center = (size / 2) as f32;
    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let x = i as f32 - center;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    // Normalize
    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }

    kernel
}

fn blur_horizontal(src: &[Rgba], dst: &mut [Rgba], width: u32, kernel: &[f32]) {
    let half = (kernel.len() / 2) as i32;
    let last = width as i32 - 1;

    dst.par_chunks_mut(width as usize)
        .zip(src.par_chunks(width as usize))
        .for_each(|(out_row, in_row)| {
            for (x, out) in out_row.iter_mut().enumerate() {
                let mut acc = TRANSPARENT;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sx = (x as i32 + ki as i32 - half).clamp(0, last) as usize;
                    let p = in_row[sx];
                    acc[0] += p[0] * kv;
                    acc[1] += p[1] * kv;
                    acc[2] += p[2] * kv;
                    acc[3] += p[3] * kv;
                }
                *out = acc;
            }
        });
}

fn blur_vertical(src: &[Rgba], dst: &mut [Rgba], width: u32, height: u32, kernel: &[f32]) {
    let half = (kernel.len() / 2) as i32;
    let last = height as i32 - 1;
    let width = width as usize;

    dst.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            for (x, out) in out_row.iter_mut().enumerate() {
                let mut acc = TRANSPARENT;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sy = (y as i32 + ki as i32 - half).clamp(0, last) as usize;
                    let p = src[sy * width + x];
                    acc[0] += p[0] * kv;
                    acc[1] += p[1] * kv;
                    acc[2] += p[2] * kv;
                    acc[3] += p[3] * kv;
                }
                *out = acc;
            }
        });
}
