use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "kickr_gears".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Which advertisements are worth connecting to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NameFilter {
    /// Any advertisement that carries a local name.
    NonEmpty,
    /// Local name contains `pattern`, ignoring ASCII case.
    Contains { pattern: String },
}

impl NameFilter {
    pub fn matches(&self, local_name: &str) -> bool {
        match self {
            Self::NonEmpty => !local_name.is_empty(),
            Self::Contains { pattern } => local_name
                .to_ascii_lowercase()
                .contains(&pattern.to_ascii_lowercase()),
        }
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        Self::Contains {
            pattern: "KICKR".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    #[default]
    Passive,
    Active,
}

/// The event that counts as "bike found" and stops the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessTrigger {
    /// Notifications armed on the gear characteristic.
    NotificationArmed,
    /// The BikeInfo service opened, before any characteristic work.
    #[default]
    ServiceOpened,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub name_filter: NameFilter,
    pub scanning_mode: ScanMode,
    /// Number of countdown ticks before giving up.
    pub timeout_ticks: u32,
    pub tick_ms: u64,
    /// Publish "Scan N" on every tick.
    pub countdown_feedback: bool,
    pub success_trigger: SuccessTrigger,
    pub grade_enabled: bool,
    pub cycling_power_enabled: bool,
}

impl ScanSettings {
    /// The earliest protocol generation: any named device, one 30 s wait,
    /// bike found once gear notifications are armed, power instead of grade.
    pub fn first_generation() -> Self {
        Self {
            name_filter: NameFilter::NonEmpty,
            scanning_mode: ScanMode::Passive,
            timeout_ticks: 1,
            tick_ms: 30_000,
            countdown_feedback: false,
            success_trigger: SuccessTrigger::NotificationArmed,
            grade_enabled: false,
            cycling_power_enabled: true,
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            name_filter: NameFilter::default(),
            scanning_mode: ScanMode::Passive,
            timeout_ticks: 60,
            tick_ms: 1_000,
            countdown_feedback: true,
            success_trigger: SuccessTrigger::ServiceOpened,
            grade_enabled: true,
            cycling_power_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,
    #[serde(default)]
    pub scan: ScanSettings,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("KickrGears");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> anyhow::Result<Settings> {
        let settings = serde_json::from_str(contents)?;
        Ok(settings)
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }
}
