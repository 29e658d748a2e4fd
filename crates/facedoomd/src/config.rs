use facedoom_hw::TrackerConfig;
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// TOML file holding the persisted user settings.
    pub settings_path: PathBuf,
    /// Where the dock icon PNG is written.
    pub icon_path: PathBuf,
    /// Edge length of the dock icon in pixels.
    pub icon_size: u32,
    /// Classify every Nth tracker observation.
    pub detection_interval: u32,
    /// How to launch and reach the face tracker.
    pub tracker: TrackerConfig,
}

impl Config {
    /// Load configuration from `FACEDOOM_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home().join(".config"))
            .join("facedoom");

        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir())
            .join("facedoom");

        let defaults = TrackerConfig::default();

        Self {
            settings_path: std::env::var("FACEDOOM_SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| config_dir.join("settings.toml")),
            icon_path: std::env::var("FACEDOOM_ICON_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| runtime_dir.join("icon.png")),
            icon_size: env_u32("FACEDOOM_ICON_SIZE", facedoom_shell::ICON_SIZE),
            detection_interval: env_u32(
                "FACEDOOM_DETECTION_INTERVAL",
                facedoom_core::classifier::DETECTION_INTERVAL,
            ),
            tracker: TrackerConfig {
                program: std::env::var("FACEDOOM_TRACKER_PROGRAM").unwrap_or(defaults.program),
                script: std::env::var("FACEDOOM_TRACKER_SCRIPT").ok().or(defaults.script),
                address: std::env::var("FACEDOOM_TRACKER_ADDRESS").unwrap_or(defaults.address),
                port: env_u16("FACEDOOM_TRACKER_PORT", defaults.port),
            },
        }
    }
}

fn home() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
