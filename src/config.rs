//! Round configuration
//!
//! Every field has a default, so a JSON file only needs the keys it changes.
//! The thresholds are tuning values rather than invariants; `sanitized()`
//! keeps them in a usable order instead of rejecting odd inputs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::lane::EqualizeRef;

/// Errors from loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Overall drama level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DramaPreset {
    Calm,
    #[default]
    Standard,
    Wild,
}

impl DramaPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            DramaPreset::Calm => "Calm",
            DramaPreset::Standard => "Standard",
            DramaPreset::Wild => "Wild",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "calm" => Some(DramaPreset::Calm),
            "standard" | "std" => Some(DramaPreset::Standard),
            "wild" => Some(DramaPreset::Wild),
            _ => None,
        }
    }
}

/// Phase speed multipliers (opening sprint, middle plateau, final push)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseBoosts {
    pub start: f32,
    pub mid: f32,
    #[serde(rename = "final")]
    pub finish: f32,
}

impl Default for PhaseBoosts {
    fn default() -> Self {
        Self {
            start: 1.12,
            mid: 1.00,
            finish: 1.05,
        }
    }
}

/// Gap shaping for the dramatic phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DramaConfig {
    /// Multiplier on sampled finish gaps
    pub gap_scale: f32,
    /// Early-race gap multiplier range (relative to final gaps)
    pub spread_early: (f32, f32),
    /// Mid-race gap multiplier range
    pub spread_mid: (f32, f32),
}

impl Default for DramaConfig {
    fn default() -> Self {
        Self {
            gap_scale: 1.15,
            spread_early: (0.5, 0.9),
            spread_mid: (0.8, 1.1),
        }
    }
}

/// Normalized round-time thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseThresholds {
    /// Order starts blending toward the final order
    pub conv_start: f32,
    /// Ballistic lock takes over
    pub lock_start: f32,
    /// Chaos noise is fully gone
    pub kill_chaos: f32,
    /// Targets stop asking anyone to retreat
    pub relax_after: f32,
    /// Beats start fading out (fully gone at `lock_start`)
    pub beat_fade_start: f32,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            conv_start: 0.70,
            lock_start: 0.86,
            kill_chaos: 0.90,
            relax_after: 0.88,
            beat_fade_start: 0.80,
        }
    }
}

/// Everything tunable about one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Seed string for the round's RNG
    pub seed: String,
    /// Winner's finish time; derived from lane lengths when absent
    pub round_duration: Option<f32>,
    /// Progress correction gain; `0.6 / T` when absent
    pub correction_gain: Option<f32>,
    /// Correction cap as a fraction of equalized speed
    pub correction_max_frac: f32,
    pub phase_boosts: PhaseBoosts,
    /// Uniform speed jitter amplitude (fraction of speed)
    pub noise_frac: f32,
    pub beat_count: u32,
    /// Range of normalized time where beat centers are placed
    pub beat_span: (f32, f32),
    pub drama: DramaConfig,
    pub thresholds: PhaseThresholds,
    /// Range of lane fractions the DNF participant stops within
    pub dnf_cut_range: (f32, f32),
    /// Length the base speed refers to
    pub equalize: EqualizeRef,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            seed: "race".to_string(),
            round_duration: None,
            correction_gain: None,
            correction_max_frac: 0.12,
            phase_boosts: PhaseBoosts::default(),
            noise_frac: 0.008,
            beat_count: 4,
            beat_span: (0.12, 0.88),
            drama: DramaConfig::default(),
            thresholds: PhaseThresholds::default(),
            dnf_cut_range: (0.55, 0.85),
            equalize: EqualizeRef::Player,
        }
    }
}

impl RoundConfig {
    /// Default config with a given seed
    pub fn with_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            ..Self::default()
        }
    }

    /// Create a config from a drama preset
    pub fn from_preset(preset: DramaPreset) -> Self {
        let mut config = Self::default();
        config.apply_preset(preset);
        config
    }

    /// Apply a drama preset (touches only drama-related fields)
    pub fn apply_preset(&mut self, preset: DramaPreset) {
        match preset {
            DramaPreset::Calm => {
                self.noise_frac = 0.004;
                self.beat_count = 2;
                self.drama.gap_scale = 0.9;
                self.drama.spread_early = (0.7, 0.95);
            }
            DramaPreset::Standard => {
                let defaults = Self::default();
                self.noise_frac = defaults.noise_frac;
                self.beat_count = defaults.beat_count;
                self.drama = defaults.drama;
            }
            DramaPreset::Wild => {
                self.noise_frac = 0.012;
                self.beat_count = 6;
                self.drama.gap_scale = 1.4;
                self.drama.spread_early = (0.3, 1.0);
                self.drama.spread_mid = (0.7, 1.2);
            }
        }
    }

    /// Parse from JSON and sanitize
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RoundConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded round config from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Correction gain for a round of duration `t`
    pub fn gain_for(&self, t: f32) -> f32 {
        self.correction_gain
            .unwrap_or(0.6 / t.max(crate::consts::EPS))
    }

    /// Clamp tunables into a consistent order
    pub fn sanitized(mut self) -> Self {
        let defaults = RoundConfig::default();
        let th = &mut self.thresholds;
        th.lock_start = finite_or(th.lock_start, defaults.thresholds.lock_start).clamp(0.05, 0.99);
        th.conv_start = th.conv_start.clamp(0.0, th.lock_start);
        th.kill_chaos = th.kill_chaos.clamp(th.lock_start + 1e-3, 1.0);
        th.relax_after = th.relax_after.clamp(0.0, 1.0);
        th.beat_fade_start = th.beat_fade_start.clamp(0.0, th.lock_start);

        let (lo, hi) = self.dnf_cut_range;
        let lo = finite_or(lo, defaults.dnf_cut_range.0).clamp(0.05, 0.95);
        self.dnf_cut_range = (lo, hi.clamp(lo, 0.95));

        let (a, b) = self.beat_span;
        let a = finite_or(a, defaults.beat_span.0).clamp(0.0, 1.0);
        self.beat_span = (a, b.clamp(a, 1.0));

        self.round_duration = self.round_duration.filter(|t| t.is_finite() && *t > 0.0);
        self.correction_gain = self.correction_gain.filter(|k| k.is_finite() && *k >= 0.0);
        self.correction_max_frac = self.correction_max_frac.max(0.0);
        self.noise_frac = self.noise_frac.max(0.0);
        self.drama.gap_scale = self.drama.gap_scale.max(0.0);
        self
    }
}

fn finite_or(x: f32, fallback: f32) -> f32 {
    if x.is_finite() { x } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = RoundConfig::from_json(r#"{ "seed": "abc", "beat_count": 2 }"#).unwrap();
        assert_eq!(config.seed, "abc");
        assert_eq!(config.beat_count, 2);
        assert_eq!(config.correction_max_frac, 0.12);
        assert_eq!(config.thresholds.lock_start, 0.86);
        assert_eq!(config.equalize, EqualizeRef::Player);
    }

    #[test]
    fn test_final_boost_key() {
        let config = RoundConfig::from_json(r#"{ "phase_boosts": { "final": 1.3 } }"#).unwrap();
        assert_eq!(config.phase_boosts.finish, 1.3);
        assert_eq!(config.phase_boosts.start, 1.12);
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let err = RoundConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RoundConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_sanitize_orders_thresholds() {
        let mut config = RoundConfig::default();
        config.thresholds.conv_start = 0.95;
        config.thresholds.lock_start = 0.8;
        config.thresholds.kill_chaos = 0.5;
        config.dnf_cut_range = (0.9, 0.2);
        config.round_duration = Some(-3.0);
        let config = config.sanitized();
        let th = config.thresholds;
        assert!(th.conv_start <= th.lock_start);
        assert!(th.kill_chaos > th.lock_start);
        assert!(config.dnf_cut_range.0 <= config.dnf_cut_range.1);
        assert_eq!(config.round_duration, None);
    }

    #[test]
    fn test_preset_roundtrip_names() {
        for preset in [DramaPreset::Calm, DramaPreset::Standard, DramaPreset::Wild] {
            assert_eq!(DramaPreset::from_str(preset.as_str()), Some(preset));
        }
        assert_eq!(DramaPreset::from_str("nope"), None);
        let wild = RoundConfig::from_preset(DramaPreset::Wild);
        assert!(wild.beat_count > RoundConfig::default().beat_count);
    }

    #[test]
    fn test_default_gain() {
        let config = RoundConfig::default();
        assert!((config.gain_for(10.0) - 0.06).abs() < 1e-6);
        let fixed = RoundConfig {
            correction_gain: Some(0.2),
            ..RoundConfig::default()
        };
        assert_eq!(fixed.gain_for(10.0), 0.2);
    }
}
