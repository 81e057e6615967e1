use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::view::snapshot::Padding;

/// Construction-time options for a [`crate::VideoView`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub animation_duration_ms: u64,
    pub start_collapsed: bool,
    pub restart_on_expand: bool,
    pub loop_video: bool,
    pub collapsed_volume: f32,
    pub expanded_volume: f32,
    pub collapsed_width: i32,
    pub collapsed_height: i32,
    pub collapsed_padding: Padding,
    pub expanded_padding: Padding,
    pub subtitle: Option<SubtitleConfig>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            animation_duration_ms: 500,
            start_collapsed: false,
            restart_on_expand: false,
            loop_video: false,
            collapsed_volume: 0.0,
            expanded_volume: 1.0,
            collapsed_width: 0,
            collapsed_height: 0,
            collapsed_padding: Padding::default(),
            expanded_padding: Padding::default(),
            subtitle: None,
        }
    }
}

/// Widest caption bitmap the GPU device accepts: the device is requested with
/// `wgpu::Limits::default()`, whose `max_texture_dimension_2d` is 8192.
pub const MAX_CAPTION_WIDTH_PX: u32 = 8192;

/// Caption rasterization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    pub font_path: Option<PathBuf>,
    pub text_size_px: f32,
    pub max_width_px: u32,
    /// Distance from the bottom of the render target to the caption's bottom edge.
    pub bottom_margin_px: f32,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            text_size_px: 28.0,
            max_width_px: 600,
            bottom_margin_px: 30.0,
        }
    }
}

impl ViewConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_volume("collapsed_volume", self.collapsed_volume)?;
        check_volume("expanded_volume", self.expanded_volume)?;
        if self.animation_duration_ms == 0 {
            return Err(ConfigError::InvalidDuration);
        }
        if let Some(subtitle) = &self.subtitle {
            if !(subtitle.text_size_px.is_finite() && subtitle.text_size_px > 0.0) {
                return Err(ConfigError::InvalidSubtitle(format!(
                    "text_size_px must be positive, got {}",
                    subtitle.text_size_px
                )));
            }
            if subtitle.max_width_px == 0 || subtitle.max_width_px > MAX_CAPTION_WIDTH_PX {
                return Err(ConfigError::InvalidSubtitle(format!(
                    "max_width_px must be in 1-{MAX_CAPTION_WIDTH_PX}, got {}",
                    subtitle.max_width_px
                )));
            }
        }
        Ok(())
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `<config_dir>/circle-video/view.json`, or defaults when absent or unreadable.
    pub fn load_default() -> Self {
        let Some(config_dir) = dirs::config_dir() else {
            return Self::default();
        };
        let path = config_dir.join("circle-video").join("view.json");
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring view config: {e}");
                Self::default()
            }
        }
    }
}

fn check_volume(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::VolumeOutOfRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ViewConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.animation_duration_ms, 500);
        assert!((config.expanded_volume - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_out_of_range_volume() {
        let config = ViewConfig {
            collapsed_volume: -0.1,
            ..ViewConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::VolumeOutOfRange {
                field: "collapsed_volume",
                ..
            })
        ));

        let config = ViewConfig {
            expanded_volume: 1.01,
            ..ViewConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::VolumeOutOfRange {
                field: "expanded_volume",
                ..
            })
        ));
    }

    #[test]
    fn rejects_nan_volume() {
        let config = ViewConfig {
            expanded_volume: f32::NAN,
            ..ViewConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_duration() {
        let config = ViewConfig {
            animation_duration_ms: 0,
            ..ViewConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDuration)));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: ViewConfig = serde_json::from_str(
            r#"{"collapsed_width": 200, "collapsed_padding": {"bottom": 40}}"#,
        )
        .unwrap();
        assert_eq!(config.collapsed_width, 200);
        assert_eq!(config.collapsed_padding.bottom, 40);
        assert_eq!(config.collapsed_padding.left, 0);
        assert_eq!(config.animation_duration_ms, 500);
        assert!(config.subtitle.is_none());
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.json");

        std::fs::write(&path, r#"{"start_collapsed": true, "loop_video": true}"#).unwrap();
        let config = ViewConfig::load(&path).unwrap();
        assert!(config.start_collapsed);
        assert!(config.loop_video);

        std::fs::write(&path, r#"{"collapsed_volume": 3.0}"#).unwrap();
        assert!(matches!(
            ViewConfig::load(&path),
            Err(ConfigError::VolumeOutOfRange { .. })
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(ViewConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn subtitle_settings_validated() {
        let config = ViewConfig {
            subtitle: Some(SubtitleConfig {
                max_width_px: 0,
                ..SubtitleConfig::default()
            }),
            ..ViewConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSubtitle(_))
        ));
    }

    #[test]
    fn caption_width_is_bounded_by_texture_limit() {
        assert_eq!(
            MAX_CAPTION_WIDTH_PX,
            wgpu::Limits::default().max_texture_dimension_2d
        );
        let with_width = |max_width_px| ViewConfig {
            subtitle: Some(SubtitleConfig {
                max_width_px,
                ..SubtitleConfig::default()
            }),
            ..ViewConfig::default()
        };
        assert!(with_width(MAX_CAPTION_WIDTH_PX).validate().is_ok());
        assert!(matches!(
            with_width(MAX_CAPTION_WIDTH_PX + 1).validate(),
            Err(ConfigError::InvalidSubtitle(_))
        ));
        assert!(matches!(
            with_width(100_000).validate(),
            Err(ConfigError::InvalidSubtitle(_))
        ));
    }
}
