//! Particle Engine for Swirl Search
//! Fixed-size particle pool advected through a drifting noise flow field

use egui::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::FieldConfig;
use crate::noise_field::FlowField;

/// Individual particle data
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Frames since (re)spawn
    pub age: f32,
    /// Lifespan in frames
    pub ttl: f32,
    pub speed: f32,
    pub radius: f32,
    pub hue: f32,
}

/// One stroke emitted by a particle during a frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub from: Vec2,
    pub to: Vec2,
    pub width: f32,
    pub hue: f32,
    pub alpha: f32,
}

/// Triangular fade: 0 at the start and end of a lifespan, 1 at its midpoint.
pub fn fade_in_out(t: f32, lifespan: f32) -> f32 {
    if lifespan <= 0.0 {
        return 0.0;
    }
    let half = 0.5 * lifespan;
    (((t + half) % lifespan) - half).abs() / half
}

fn lerp(a: f32, b: f32, amount: f32) -> f32 {
    (1.0 - amount) * a + amount * b
}

/// Random value in `[0, n)`.
fn rand_unit(rng: &mut impl Rng, n: f32) -> f32 {
    rng.gen::<f32>() * n
}

/// Random value in `(-n, n]`.
fn rand_signed(rng: &mut impl Rng, n: f32) -> f32 {
    n - rand_unit(rng, 2.0 * n)
}

/// Particle pool plus the tick counter that drives the flow field.
///
/// The pool length is fixed between resizes. Expired or escaped particles are
/// re-rolled in their own slot during the frame they expire.
pub struct ParticleField {
    particles: Vec<Particle>,
    segments: Vec<Segment>,
    width: f32,
    height: f32,
    tick: u64,
    flow: FlowField,
    rng: StdRng,
    config: FieldConfig,
}

impl ParticleField {
    pub fn new(width: f32, height: f32, config: &FieldConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let flow = FlowField::new(rng.gen(), config);

        let mut field = Self {
            particles: Vec::with_capacity(config.particle_count),
            segments: Vec::with_capacity(config.particle_count),
            width,
            height,
            tick: 0,
            flow,
            rng,
            config: config.clone(),
        };
        field.populate();
        field
    }

    /// Adopt new canvas bounds and rebuild the whole pool with fresh values.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.populate();
        debug!(
            width,
            height,
            particles = self.particles.len(),
            "particle pool rebuilt"
        );
    }

    fn populate(&mut self) {
        let (width, height) = (self.width, self.height);
        let config = &self.config;
        let rng = &mut self.rng;

        self.particles.clear();
        self.particles
            .extend((0..config.particle_count).map(|_| spawn(rng, width, height, config)));
        self.segments.clear();
    }

    #[cfg(test)]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    #[cfg(test)]
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.x >= 0.0 && pos.x <= self.width && pos.y >= 0.0 && pos.y <= self.height
    }

    /// Advance every particle by one frame and return the strokes to draw.
    ///
    /// Particles are visited in pool order, so a seeded field replays exactly.
    pub fn step(&mut self) -> &[Segment] {
        self.tick += 1;
        self.segments.clear();

        let Self {
            particles,
            segments,
            width,
            height,
            tick,
            flow,
            rng,
            config,
        } = self;
        let (width, height, tick) = (*width, *height, *tick);
        let blend = config.velocity_blend;

        for p in particles.iter_mut() {
            let angle = flow.angle(p.pos.x, p.pos.y, tick);
            p.vel = Vec2::new(
                lerp(p.vel.x, angle.cos(), blend),
                lerp(p.vel.y, angle.sin(), blend),
            );

            let next = p.pos + p.vel * p.speed;
            segments.push(Segment {
                from: p.pos,
                to: next,
                width: p.radius,
                hue: p.hue,
                alpha: fade_in_out(p.age, p.ttl),
            });

            p.pos = next;
            p.age += 1.0;

            let escaped = next.x < 0.0 || next.x > width || next.y < 0.0 || next.y > height;
            if escaped || p.age > p.ttl {
                *p = spawn(rng, width, height, config);
            }
        }

        &self.segments
    }
}

/// Fresh particle: uniform in x, banded around the vertical center.
fn spawn(rng: &mut impl Rng, width: f32, height: f32, config: &FieldConfig) -> Particle {
    let center_y = 0.5 * height;
    let band = config.range_y.min(center_y);

    let x = rand_unit(rng, width);
    let y = (center_y + rand_signed(rng, band)).clamp(0.0, height);

    Particle {
        pos: Vec2::new(x, y),
        vel: Vec2::ZERO,
        age: 0.0,
        ttl: config.base_ttl + rand_unit(rng, config.range_ttl),
        speed: config.base_speed + rand_unit(rng, config.range_speed),
        radius: config.base_radius + rand_unit(rng, config.range_radius),
        hue: config.base_hue + rand_unit(rng, config.range_hue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(count: usize, seed: u64) -> FieldConfig {
        FieldConfig {
            particle_count: count,
            seed: Some(seed),
            ..FieldConfig::default()
        }
    }

    #[test]
    fn test_fade_in_out_shape() {
        let lifespan = 120.0;
        assert!(fade_in_out(0.0, lifespan).abs() < 1e-6);
        assert!((fade_in_out(60.0, lifespan) - 1.0).abs() < 1e-6);
        assert!(fade_in_out(120.0, lifespan).abs() < 1e-6);

        let mut prev = fade_in_out(0.0, lifespan);
        for t in 1..=60 {
            let v = fade_in_out(t as f32, lifespan);
            assert!(v >= prev, "not rising at {t}");
            prev = v;
        }
        for t in 61..=120 {
            let v = fade_in_out(t as f32, lifespan);
            assert!(v <= prev, "not falling at {t}");
            prev = v;
        }
    }

    #[test]
    fn test_fade_with_degenerate_lifespan() {
        assert_eq!(fade_in_out(3.0, 0.0), 0.0);
        assert_eq!(fade_in_out(3.0, -1.0), 0.0);
    }

    #[test]
    fn test_spawn_ranges() {
        let config = seeded(600, 1);
        let field = ParticleField::new(800.0, 600.0, &config);

        for p in field.particles() {
            assert!(p.pos.x >= 0.0 && p.pos.x <= 800.0);
            assert!((p.pos.y - 300.0).abs() <= 100.0);
            assert!(p.ttl >= 50.0 && p.ttl <= 200.0);
            assert!(p.speed >= 0.1 && p.speed <= 2.1);
            assert!(p.radius >= 1.0 && p.radius <= 5.0);
            assert!(p.hue >= 220.0 && p.hue <= 320.0);
            assert_eq!(p.age, 0.0);
            assert_eq!(p.vel, Vec2::ZERO);
        }
    }

    #[test]
    fn test_short_canvas_spawns_in_bounds() {
        let field = ParticleField::new(300.0, 40.0, &seeded(200, 2));
        assert!(field.particles().iter().all(|p| field.contains(p.pos)));
    }

    #[test]
    fn test_pool_size_is_stable() {
        for count in [1, 7, 500] {
            let mut field = ParticleField::new(640.0, 480.0, &seeded(count, 3));
            for _ in 0..300 {
                let segments = field.step().len();
                assert_eq!(segments, count);
                assert_eq!(field.len(), count);
            }
        }
    }

    #[test]
    fn test_particles_stay_in_bounds_between_frames() {
        let mut field = ParticleField::new(320.0, 240.0, &seeded(400, 4));
        for _ in 0..500 {
            field.step();
            for p in field.particles() {
                assert!(field.contains(p.pos), "out of bounds at {:?}", p.pos);
            }
        }
    }

    #[test]
    fn test_segments_start_in_bounds() {
        let mut field = ParticleField::new(200.0, 150.0, &seeded(300, 5));
        for _ in 0..200 {
            let (w, h) = field.size();
            for s in field.step() {
                assert!(s.from.x >= 0.0 && s.from.x <= w);
                assert!(s.from.y >= 0.0 && s.from.y <= h);
                assert!((0.0..=1.0).contains(&s.alpha));
            }
        }
    }

    #[test]
    fn test_age_resets_on_expiry() {
        let config = FieldConfig {
            base_ttl: 2.0,
            range_ttl: 0.0,
            ..seeded(50, 6)
        };
        let mut field = ParticleField::new(1000.0, 1000.0, &config);
        for _ in 0..10 {
            field.step();
            for p in field.particles() {
                assert!(p.age <= p.ttl);
            }
        }
    }

    #[test]
    fn test_velocity_is_blended() {
        let mut field = ParticleField::new(1000.0, 1000.0, &seeded(20, 7));
        field.step();
        // From rest, a 0.5 blend toward a unit vector leaves a half-length velocity.
        for p in field.particles().iter().filter(|p| p.age == 1.0) {
            assert!((p.vel.length() - 0.5).abs() < 1e-4);
        }
    }

    #[test]
    fn test_tick_advances_per_frame() {
        let mut field = ParticleField::new(100.0, 100.0, &seeded(10, 8));
        assert_eq!(field.tick(), 0);
        field.step();
        field.step();
        assert_eq!(field.tick(), 2);
    }

    #[test]
    fn test_resize_replaces_pool() {
        let mut field = ParticleField::new(1920.0, 1080.0, &seeded(250, 9));
        for _ in 0..20 {
            field.step();
        }
        let before = field.particles().to_vec();

        field.resize(400.0, 300.0);
        assert_eq!(field.len(), 250);
        assert_eq!(field.size(), (400.0, 300.0));
        assert_ne!(field.particles(), before.as_slice());
        for p in field.particles() {
            assert!(field.contains(p.pos));
            assert_eq!(p.age, 0.0);
        }
    }

    #[test]
    fn test_seeded_fields_replay() {
        let mut a = ParticleField::new(500.0, 400.0, &seeded(100, 10));
        let mut b = ParticleField::new(500.0, 400.0, &seeded(100, 10));
        for _ in 0..50 {
            assert_eq!(a.step(), b.step());
        }
    }
}
