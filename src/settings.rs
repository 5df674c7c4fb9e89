use anyhow::{Context, Result};
use log::{warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::reservations::CommitMode;

const DATABASE_PATH_ENV: &str = "BLOKAT_DATABASE_PATH";
const DEBUG_ENV: &str = "BLOKAT_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ReservationSettings {
    /// How pending reservation changes are submitted.
    pub commit_mode: CommitMode,
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            commit_mode: CommitMode::Transactional,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PlatformSettings {
    pub database_path: PathBuf,
    pub log_level: String,
    pub reservations: ReservationSettings,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("blokat.sqlite3"),
            log_level: "info".into(),
            reservations: ReservationSettings::default(),
        }
    }
}

impl PlatformSettings {
    /// Log level from settings, raised to `debug` when `BLOKAT_DEBUG` is set.
    pub fn level_filter(&self) -> LevelFilter {
        let debug_mode = std::env::var(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            return LevelFilter::Debug;
        }
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }

    /// Database location, `BLOKAT_DATABASE_PATH` taking precedence.
    pub fn resolved_database_path(&self) -> PathBuf {
        std::env::var_os(DATABASE_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.database_path.clone())
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<PlatformSettings>,
}

impl SettingsStore {
    /// Load settings from `path`. A missing or malformed file yields defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring malformed settings in {}: {err}",
                    path.display()
                );
                PlatformSettings::default()
            })
        } else {
            PlatformSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, PlatformSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PlatformSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn settings(&self) -> PlatformSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: PlatformSettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: PlatformSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &PlatformSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
