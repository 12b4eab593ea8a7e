//! Background Renderer for Swirl Search
//! Drives the particle field in logical points and paints the scaled frame behind the UI

use anyhow::bail;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::compositor::{hsla_to_rgba, Compositor};
use crate::config::{FieldConfig, GlowConfig};
use crate::particles::{ParticleField, Segment};

struct Surface {
    field: ParticleField,
    compositor: Compositor,
    texture: Option<egui::TextureHandle>,
    /// Surface pixels per logical point
    scale: f32,
}

pub struct FieldRenderer {
    field_config: FieldConfig,
    glow_config: GlowConfig,
    surface: Option<Surface>,
    scaled: Vec<Segment>,
    alive: bool,
}

impl FieldRenderer {
    pub fn new(field_config: FieldConfig, glow_config: GlowConfig) -> Self {
        Self {
            field_config,
            glow_config,
            surface: None,
            scaled: Vec::new(),
            alive: true,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    #[cfg(test)]
    pub fn field(&self) -> Option<&ParticleField> {
        self.surface.as_ref().map(|s| &s.field)
    }

    /// Surface pixel dimensions for a viewport.
    fn surface_size(&self, width: f32, height: f32, pixels_per_point: f32) -> (u32, u32) {
        let scale = pixels_per_point * self.field_config.resolution_scale;
        (
            (width * scale).round().max(1.0) as u32,
            (height * scale).round().max(1.0) as u32,
        )
    }

    /// Run one frame for a viewport of `width` x `height` points.
    ///
    /// A changed viewport rebuilds the pool and surfaces before stepping.
    /// Returns `None` after teardown or for an empty viewport.
    pub fn advance(&mut self, width: f32, height: f32, pixels_per_point: f32) -> Option<&RgbaImage> {
        if !self.alive || !(width >= 1.0 && height >= 1.0) {
            return None;
        }

        let (px_w, px_h) = self.surface_size(width, height, pixels_per_point);
        let scale = px_w as f32 / width;

        match self.surface.as_mut() {
            Some(surface) => {
                if surface.field.size() != (width, height)
                    || (surface.compositor.width, surface.compositor.height) != (px_w, px_h)
                {
                    surface.field.resize(width, height);
                    surface.compositor.resize(px_w, px_h);
                    surface.scale = scale;
                    debug!(px_w, px_h, "background surface resized");
                }
            }
            None => {
                info!(
                    particles = self.field_config.particle_count,
                    px_w, px_h, "starting background animation"
                );
                self.surface = Some(Surface {
                    field: ParticleField::new(width, height, &self.field_config),
                    compositor: Compositor::new(px_w, px_h),
                    texture: None,
                    scale,
                });
            }
        }

        let Self {
            field_config,
            glow_config,
            surface,
            scaled,
            ..
        } = self;
        let surface = surface.as_mut()?;
        let scale = surface.scale;

        scaled.clear();
        scaled.extend(surface.field.step().iter().map(|s| Segment {
            from: s.from * scale,
            to: s.to * scale,
            width: s.width * scale,
            ..*s
        }));

        let [h, s, l, a] = field_config.background_hsla;
        let background = hsla_to_rgba(h, s, l, a);
        Some(
            surface
                .compositor
                .render_frame(scaled, background, glow_config, scale),
        )
    }

    /// Render a frame and paint it behind everything else in `ctx`.
    pub fn frame(&mut self, ctx: &egui::Context) {
        let screen = ctx.screen_rect();
        if self
            .advance(screen.width(), screen.height(), ctx.pixels_per_point())
            .is_none()
        {
            return;
        }
        let Some(surface) = self.surface.as_mut() else {
            return;
        };

        let image = surface.compositor.to_color_image();
        if let Some(texture) = surface.texture.as_mut() {
            texture.set(image, egui::TextureOptions::LINEAR);
        } else {
            surface.texture =
                Some(ctx.load_texture("flow-field", image, egui::TextureOptions::LINEAR));
        }
        let Some(texture) = surface.texture.as_ref() else {
            return;
        };

        let painter = ctx.layer_painter(egui::LayerId::background());
        painter.image(
            texture.id(),
            screen,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
    }

    /// Drop the pool and surfaces. Later frames do nothing.
    pub fn teardown(&mut self) {
        if self.alive {
            info!("background animation stopped");
        }
        self.alive = false;
        self.surface = None;
        self.scaled = Vec::new();
    }

    /// Write the last rendered frame into `dir` as PNG.
    pub fn save_snapshot(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let Some(surface) = &self.surface else {
            bail!("no frame has been rendered yet");
        };

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let path = dir.join(format!(
            "swirl-{stamp}-{:06}.png",
            surface.field.tick()
        ));
        surface.compositor.save_png(&path)?;
        info!(path = %path.display(), "saved background snapshot");
        Ok(path)
    }
}
