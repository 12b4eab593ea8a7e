//! Configuration System for Swirl Search
//! Search endpoint, flow-field animation and glow settings, loadable from JSON

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Env var pointing at a JSON config file.
pub const CONFIG_PATH_ENV: &str = "SWIRL_SEARCH_CONFIG";

/// Env var overriding `search.endpoint`.
pub const ENDPOINT_ENV: &str = "SWIRL_SEARCH_ENDPOINT";

// ============================================================================
// Search Configuration
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// URL the `{query, k}` payload is POSTed to
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Prefilled value of the "number of papers" field
    pub default_count: u32,
    pub min_count: u32,
    pub max_count: u32,
    /// Prefix used to build a link from a bare `paperid`
    pub viewer_base_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/query".to_string(),
            timeout_secs: 30,
            default_count: 5,
            min_count: 1,
            max_count: 50,
            viewer_base_url: "https://www.semanticscholar.org/paper/".to_string(),
        }
    }
}

// ============================================================================
// Flow Field Configuration
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct FieldConfig {
    pub particle_count: usize,
    /// Spawn band half-height around the vertical center
    pub range_y: f32,
    pub base_ttl: f32,
    pub range_ttl: f32,
    pub base_speed: f32,
    pub range_speed: f32,
    pub base_radius: f32,
    pub range_radius: f32,
    pub base_hue: f32,
    pub range_hue: f32,
    /// Multiplier applied to the noise value before turning it into an angle
    pub noise_steps: f32,
    pub x_off: f64,
    pub y_off: f64,
    pub z_off: f64,
    /// Lerp factor from previous velocity toward the flow direction
    pub velocity_blend: f32,
    /// Background fill as [hue, saturation, lightness, alpha]
    pub background_hsla: [f32; 4],
    /// Surface size relative to the viewport (physical pixels)
    pub resolution_scale: f32,
    /// Fixed seed for reproducible runs; random when absent
    pub seed: Option<u64>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            particle_count: 700,
            range_y: 100.0,
            base_ttl: 50.0,
            range_ttl: 150.0,
            base_speed: 0.1,
            range_speed: 2.0,
            base_radius: 1.0,
            range_radius: 4.0,
            base_hue: 220.0,
            range_hue: 100.0,
            noise_steps: 8.0,
            x_off: 0.00125,
            y_off: 0.00125,
            z_off: 0.0005,
            velocity_blend: 0.5,
            background_hsla: [260.0, 0.4, 0.05, 1.0],
            resolution_scale: 0.5,
            seed: None,
        }
    }
}

// ============================================================================
// Glow Configuration
// ============================================================================

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct GlowPass {
    /// Blur standard deviation in viewport pixels
    pub blur_px: f32,
    pub brightness: f32,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct GlowConfig {
    pub enabled: bool,
    pub passes: Vec<GlowPass>,
    /// Gain of the final unblurred additive copy
    pub core_opacity: f32,
}

impl Default for GlowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            passes: vec![
                GlowPass {
                    blur_px: 8.0,
                    brightness: 2.0,
                },
                GlowPass {
                    blur_px: 4.0,
                    brightness: 2.0,
                },
            ],
            core_opacity: 1.0,
        }
    }
}

// ============================================================================
// Window / UI Configuration
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub window_width: f32,
    pub window_height: f32,
    /// Directory F12 snapshots are written to
    pub snapshot_dir: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_width: 1280.0,
            window_height: 800.0,
            snapshot_dir: ".".to_string(),
        }
    }
}

// ============================================================================
// Main App Configuration
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub field: FieldConfig,
    #[serde(default)]
    pub glow: GlowConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

impl AppConfig {
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing config to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let json =
            std::fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
        let config: AppConfig =
            serde_json::from_str(&json).with_context(|| format!("parsing config {path}"))?;
        Ok(config.validated())
    }

    /// Resolve the startup configuration from the environment.
    ///
    /// A config file that is missing falls back to defaults silently; one that
    /// exists but fails to parse is logged and also falls back to defaults.
    pub fn from_env() -> Self {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if Path::new(&path).exists() => match Self::load(&path) {
                Ok(config) => {
                    info!(path = %path, "loaded configuration");
                    config
                }
                Err(e) => {
                    warn!("falling back to default configuration: {e:#}");
                    Self::default()
                }
            },
            Ok(path) => {
                warn!(path = %path, "config file not found, using defaults");
                Self::default()
            }
            Err(_) => Self::default(),
        };

        config.apply_endpoint_override(std::env::var(ENDPOINT_ENV).ok());
        config
    }

    fn apply_endpoint_override(&mut self, endpoint: Option<String>) {
        if let Some(endpoint) = endpoint.map(|e| e.trim().to_string()) {
            if !endpoint.is_empty() {
                info!(endpoint = %endpoint, "search endpoint overridden from environment");
                self.search.endpoint = endpoint;
            }
        }
    }

    /// Clamp values that would break the renderer or the count field.
    pub fn validated(mut self) -> Self {
        let field = &mut self.field;
        field.particle_count = field.particle_count.max(1);
        if !(field.resolution_scale > 0.0) {
            field.resolution_scale = FieldConfig::default().resolution_scale;
        }
        field.resolution_scale = field.resolution_scale.min(1.0);
        field.base_ttl = field.base_ttl.max(1.0);
        field.range_ttl = field.range_ttl.max(0.0);
        field.range_y = field.range_y.max(0.0);
        field.velocity_blend = field.velocity_blend.clamp(0.0, 1.0);

        let search = &mut self.search;
        search.min_count = search.min_count.max(1);
        if search.max_count < search.min_count {
            search.max_count = search.min_count;
        }
        search.default_count = search.default_count.clamp(search.min_count, search.max_count);

        for pass in &mut self.glow.passes {
            pass.blur_px = pass.blur_px.max(0.0);
            pass.brightness = pass.brightness.max(0.0);
        }
        self.glow.core_opacity = self.glow.core_opacity.max(0.0);

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_animation_values() {
        let config = AppConfig::default();
        assert_eq!(config.field.particle_count, 700);
        assert_eq!(config.field.base_ttl, 50.0);
        assert_eq!(config.field.base_ttl + config.field.range_ttl, 200.0);
        assert_eq!(config.field.base_hue + config.field.range_hue, 320.0);
        assert_eq!(config.glow.passes.len(), 2);
        assert_eq!(config.search.max_count, 50);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "search": { "endpoint": "http://search.local/query" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.search.endpoint, "http://search.local/query");
        assert_eq!(config.search.default_count, 5);
        assert_eq!(config.field, FieldConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("swirl-config-{}.json", std::process::id()));
        let path = path.to_string_lossy().to_string();

        let mut config = AppConfig::default();
        config.field.seed = Some(7);
        config.search.endpoint = "http://10.0.0.1:9000/query".to_string();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let path = std::env::temp_dir().join(format!("swirl-bad-{}.json", std::process::id()));
        std::fs::write(&path, "not json").unwrap();
        let result = AppConfig::load(&path.to_string_lossy());
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_override() {
        let mut config = AppConfig::default();
        config.apply_endpoint_override(Some("  ".to_string()));
        assert_eq!(config.search.endpoint, SearchConfig::default().endpoint);

        config.apply_endpoint_override(Some("https://api.example.org/query".to_string()));
        assert_eq!(config.search.endpoint, "https://api.example.org/query");
    }

    #[test]
    fn test_validated_clamps() {
        let mut config = AppConfig::default();
        config.field.particle_count = 0;
        config.field.resolution_scale = -2.0;
        config.search.min_count = 10;
        config.search.max_count = 3;
        config.search.default_count = 1;

        let config = config.validated();
        assert_eq!(config.field.particle_count, 1);
        assert_eq!(config.field.resolution_scale, 0.5);
        assert_eq!(config.search.max_count, 10);
        assert_eq!(config.search.default_count, 10);
    }
}
