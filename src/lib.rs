pub mod auth;
pub mod calendar;
pub mod db;
pub mod reservations;
pub mod settings;
pub mod tokens;
mod utils;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::Utc;

use auth::AuthContext;
use db::Database;
use reservations::{ReservationDiff, ReservationError, ReservationSelection};
use settings::SettingsStore;
use tokens::TokenService;

pub use utils::logging::init_logging;

const ENABLE_LOGS: bool = true;

/// Everything a front end needs, wired from one settings file.
#[derive(Clone)]
pub struct Platform {
    pub db: Database,
    pub tokens: TokenService,
    pub auth: AuthContext,
    settings: std::sync::Arc<SettingsStore>,
}

impl Platform {
    /// Load settings, start logging and open the database.
    pub fn open(settings_path: PathBuf) -> Result<Self> {
        let settings_store = SettingsStore::new(settings_path)?;
        let settings = settings_store.settings();
        init_logging(settings.level_filter());

        log_info!("Blokat starting up...");
        let database = match Database::new(settings.resolved_database_path()) {
            Ok(database) => database,
            Err(err) => {
                log_error!("Failed to open database: {err:#}");
                return Err(err);
            }
        };

        Ok(Self::with_database(database, settings_store))
    }

    pub fn with_database(db: Database, settings: SettingsStore) -> Self {
        Self {
            tokens: TokenService::new(db.clone()),
            auth: AuthContext::new(),
            db,
            settings: std::sync::Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Selection for the logged-in user at `location_id`, loaded from storage.
    pub async fn reservation_selection(&self, location_id: i64) -> Result<ReservationSelection> {
        let state = self.auth.current();
        let user_id = match state.user_id {
            Some(user_id) if state.logged_in => user_id,
            _ => {
                log_warn!("Refusing reservation selection for anonymous user");
                return Err(anyhow!("Log in to make reservations"));
            }
        };

        Ok(ReservationSelection::load(&self.db, &user_id, Some(location_id)).await?)
    }

    /// Submit a selection's pending changes with the configured commit mode.
    pub async fn commit_reservations(
        &self,
        selection: &mut ReservationSelection,
    ) -> Result<ReservationDiff, ReservationError> {
        let mode = self.settings.settings().reservations.commit_mode;
        match selection.commit(&self.db, mode, Utc::now()).await {
            Ok(applied) => {
                log_info!(
                    "Committed reservations of {}: {} added, {} removed",
                    selection.user_id(),
                    applied.to_add.len(),
                    applied.to_remove.len()
                );
                Ok(applied)
            }
            Err(err) => {
                log_warn!(
                    "Reservation commit for {} failed: {err}",
                    selection.user_id()
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedUser;
    use std::collections::BTreeSet;

    fn platform() -> (Platform, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        (
            Platform::with_database(Database::in_memory().unwrap(), settings),
            dir,
        )
    }

    #[tokio::test]
    async fn open_creates_database_next_to_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("settings.json");
        let store = SettingsStore::new(settings_path.clone()).unwrap();
        let mut settings = store.settings();
        settings.database_path = dir.path().join("data").join("blokat.sqlite3");
        store.update(settings.clone()).unwrap();

        let platform = Platform::open(settings_path).unwrap();
        if std::env::var_os("BLOKAT_DATABASE_PATH").is_none() {
            assert_eq!(platform.db.path(), Some(settings.database_path.as_path()));
        }
    }

    #[tokio::test]
    async fn anonymous_user_cannot_open_selection() {
        let (platform, _dir) = platform();
        assert!(platform.reservation_selection(1).await.is_err());
    }

    #[tokio::test]
    async fn logged_in_user_gets_their_selection() {
        let (platform, _dir) = platform();
        platform.auth.login(AuthenticatedUser {
            user_id: "u1".into(),
            admin: false,
            capabilities: BTreeSet::new(),
        });

        let mut selection = platform.reservation_selection(1).await.unwrap();
        assert_eq!(selection.user_id(), "u1");
        assert!(selection.original().is_empty());

        let applied = platform.commit_reservations(&mut selection).await.unwrap();
        assert!(applied.is_empty());
    }

    #[tokio::test]
    async fn logout_closes_reservations_again() {
        let (platform, _dir) = platform();
        platform.auth.login(AuthenticatedUser {
            user_id: "u1".into(),
            admin: false,
            capabilities: BTreeSet::new(),
        });
        platform.auth.logout();
        assert!(platform.reservation_selection(1).await.is_err());
    }

    #[tokio::test]
    async fn tokens_share_the_platform_database() {
        let (platform, _dir) = platform();
        let id = platform.tokens.issue().await.unwrap();
        platform
            .tokens
            .bind(&id, Some("a@ugent.be"), tokens::TokenPurpose::PasswordReset)
            .await
            .unwrap();
        platform
            .tokens
            .redeem(&id, tokens::TokenPurpose::PasswordReset)
            .await
            .unwrap();
    }
}
