//! Configuration loading and validation.

use std::fs;
use std::path::Path;

use thiserror::Error;

use marionette_core::presets::PresetConfig;

use crate::MarionetteConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load full Marionette configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<MarionetteConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse full Marionette configuration from YAML text.
pub fn parse_config(content: &str) -> Result<MarionetteConfig, ConfigError> {
    let config: MarionetteConfig = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load a standalone preset catalog from a YAML file.
pub fn load_presets(path: &Path) -> Result<PresetConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_presets(&content)
}

/// Parse a standalone preset catalog from YAML text.
pub fn parse_presets(content: &str) -> Result<PresetConfig, ConfigError> {
    let presets: PresetConfig = serde_yaml::from_str(content)?;
    validate_presets(&presets)?;
    Ok(presets)
}

fn validate_config(config: &MarionetteConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.scheduler.max_queue_size == 0 {
        return Err(ConfigError::Invalid(
            "scheduler.max_queue_size must be > 0".to_string(),
        ));
    }

    if config.scheduler.tick_ms == 0 {
        return Err(ConfigError::Invalid(
            "scheduler.tick_ms must be > 0".to_string(),
        ));
    }

    // Fails early on an idle action the normalizer would reject at runtime.
    config.scheduler.idle_action_message()?;

    validate_presets(&config.presets)?;

    Ok(())
}

fn validate_presets(presets: &PresetConfig) -> Result<(), ConfigError> {
    if presets.version == 0 {
        return Err(ConfigError::Invalid(
            "presets.version must be greater than 0".to_string(),
        ));
    }

    for (name, buckets) in &presets.emote {
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "presets.emote contains an empty name".to_string(),
            ));
        }
        for (intensity, preset) in buckets {
            if intensity.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "presets.emote['{name}'] contains an empty intensity key"
                )));
            }
            for param in &preset.params {
                if param.name.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "presets.emote['{name}']['{intensity}'] has a param with an empty name"
                    )));
                }
            }
        }
    }

    for (name, preset) in &presets.gesture {
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "presets.gesture contains an empty name".to_string(),
            ));
        }
        if let Some(motion) = &preset.motion {
            if motion.group.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "presets.gesture['{name}'].motion.group must not be empty"
                )));
            }
        }
    }

    for (name, steps) in &presets.react {
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "presets.react contains an empty name".to_string(),
            ));
        }
        for step in steps {
            if let marionette_core::presets::ReactStep::Motion { group, .. } = step {
                if group.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "presets.react['{name}'] has a motion step with an empty group"
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use marionette_core::types::OverflowPolicy;

    #[test]
    fn test_parses_full_config() {
        let config = parse_config(
            r#"
version: 1
scheduler:
  max_queue_size: 4
  overflow: drop_newest
  tick_ms: 25
  idle_action:
    action:
      type: expression
      name: idle_blink
    duration_sec: 0.5
presets:
  emote:
    happy:
      medium:
        expression: smile
        params:
          - name: ParamMouthForm
            value: 0.3
  gesture:
    wave:
      motion:
        group: Wave
        index: 0
  react:
    surprise:
      - type: expression
        name: shock
      - type: wait
        ms: 120
"#,
        )
        .unwrap();

        assert_eq!(config.scheduler.max_queue_size, 4);
        assert_eq!(config.scheduler.overflow, OverflowPolicy::DropNewest);
        assert_eq!(config.scheduler.tick_ms, 25);

        let idle = config
            .scheduler
            .idle_action_message()
            .unwrap()
            .expect("idle action");
        assert_eq!(idle.action.kind(), "expression");

        assert!(config.presets.emote("happy", "medium").is_some());
        assert!(config.presets.react("surprise").is_some());
    }

    #[test]
    fn test_defaults_apply_to_empty_config() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.scheduler.max_queue_size, 8);
        assert_eq!(config.scheduler.overflow, OverflowPolicy::DropOldest);
        assert!(config.scheduler.idle_action.is_none());
    }

    #[test]
    fn test_zero_queue_size_is_invalid() {
        let err = parse_config("scheduler:\n  max_queue_size: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("max_queue_size"));
    }

    #[test]
    fn test_invalid_idle_action_is_rejected_at_load_time() {
        let err = parse_config(
            r#"
scheduler:
  idle_action:
    action:
      type: expression
      name: idle_blink
    duration_sec: 0.0
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("idle_action"));
    }

    #[test]
    fn test_unknown_react_entry_type_is_rejected() {
        let err = parse_presets(
            r#"
react:
  surprise:
    - type: teleport
      x: 3
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_standalone_presets_validate_motion_groups() {
        let err = parse_presets(
            r#"
gesture:
  wave:
    motion:
      group: ""
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("motion.group"));
    }
}
