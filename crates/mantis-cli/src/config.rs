//! Configuration vault – reads/writes `~/.mantis/config.toml`.
//!
//! The file has two tables: `[control]` tunes the controllers and `[sim]`
//! describes the simulated cell the CLI drives.  Missing keys take their
//! defaults, so a file holding only the values an operator changed is valid.

use mantis_control::ControlConfig;
use mantis_hal::SimSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted operator configuration stored in `~/.mantis/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub sim: SimSettings,
}

/// Return the path to `~/.mantis/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mantis").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `MANTIS_*` environment variable overrides to `cfg`.
///
/// Values that do not parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `MANTIS_MAX_ITERATIONS` | `control.max_iterations` |
/// | `MANTIS_ANGLE_EPSILON` | `control.angle_epsilon` |
/// | `MANTIS_TARGET_LABEL` | `control.target_label` |
/// | `MANTIS_WORKING_FRAME` | `control.working_frame` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MANTIS_MAX_ITERATIONS")
        && let Ok(n) = v.parse::<usize>()
        && n > 0
    {
        cfg.control.max_iterations = n;
    }
    if let Ok(v) = std::env::var("MANTIS_ANGLE_EPSILON")
        && let Ok(eps) = v.parse::<f32>()
        && eps.is_finite()
        && eps > 0.0
    {
        cfg.control.angle_epsilon = eps;
    }
    if let Ok(v) = std::env::var("MANTIS_TARGET_LABEL")
        && !v.is_empty()
    {
        cfg.control.target_label = v;
    }
    if let Ok(v) = std::env::var("MANTIS_WORKING_FRAME")
        && !v.is_empty()
    {
        cfg.control.working_frame = v;
    }
}

/// Save the config to disk, creating `~/.mantis/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
