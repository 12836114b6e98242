//! Applications, their versions, tagging and package export.

use super::{AppRef, EnvRef, Lifetime, Named, decode, returned_key};
use crate::cache::CacheFile;
use crate::client::{ErrorKind, Outcome, StatusTable, flag};
use crate::errors::{LifetimeError, Result};
use crate::lifetime::types::{Application, ApplicationVersion, DownloadLink, MobileVersion};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, info};

const LIST: StatusTable = StatusTable::new(
    "list the applications",
    &[
        (200, Outcome::Success),
        (204, Outcome::Fail(ErrorKind::NoAppsAvailable)),
        (400, Outcome::Fail(ErrorKind::InvalidParameters)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

const DETAILS: StatusTable = StatusTable::new(
    "get the details of application",
    &[
        (200, Outcome::Success),
        (400, Outcome::Fail(ErrorKind::InvalidParameters)),
        (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
        (404, Outcome::Fail(ErrorKind::AppDoesNotExist)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

const VERSIONS: StatusTable = StatusTable::new(
    "list the versions of application",
    &[
        (200, Outcome::Success),
        (400, Outcome::Fail(ErrorKind::InvalidParameters)),
        (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
        (404, Outcome::Fail(ErrorKind::AppDoesNotExist)),
        (500, Outcome::Fail(ErrorKind::AppVersions)),
    ],
);

const VERSION: StatusTable = StatusTable::new(
    "get the version of application",
    &[
        (200, Outcome::Success),
        (400, Outcome::Fail(ErrorKind::InvalidParameters)),
        (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
        (404, Outcome::Fail(ErrorKind::AppDoesNotExist)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

const TAG: StatusTable = StatusTable::new(
    "tag application",
    &[
        (200, Outcome::Success),
        (201, Outcome::Success),
        (400, Outcome::Fail(ErrorKind::InvalidParameters)),
        (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
        (404, Outcome::Fail(ErrorKind::AppDoesNotExist)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

const EXPORT: StatusTable = StatusTable::new(
    "export the package of application",
    &[
        (200, Outcome::Success),
        (400, Outcome::Fail(ErrorKind::InvalidParameters)),
        (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
        (404, Outcome::Fail(ErrorKind::AppDoesNotExist)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

/// Version of an application currently running in an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunningAppVersion {
    pub name: String,
    pub key: String,
    pub version: String,
    pub version_key: String,
    #[serde(default)]
    pub change_log: Option<String>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub deployment_zone_key: Option<String>,
}

impl Lifetime {
    /// `GET applications`, cached as `applications.cache`.
    pub async fn get_applications(&self, extra_data: bool) -> Result<Vec<Application>> {
        let query = [
            ("IncludeModules", flag(extra_data)),
            ("IncludeEnvStatus", flag(extra_data)),
        ];
        let response = self.client.get("applications", &query).await?;
        let body = LIST.expect(response, "")?;
        self.store.store(CacheFile::APPLICATIONS, &body)?;
        decode(body, "applications")
    }

    async fn find_application<F>(&self, matches: F, missing: String) -> Result<Application>
    where
        F: Fn(&Application) -> bool,
    {
        if let Some(cached) = self
            .store
            .load_optional::<Vec<Application>>(CacheFile::APPLICATIONS)?
        {
            if let Some(app) = cached.into_iter().find(|app| matches(app)) {
                return Ok(app);
            }
            debug!("application not in cache, refetching");
            self.store.clear(CacheFile::APPLICATIONS)?;
        }
        self.get_applications(false)
            .await?
            .into_iter()
            .find(|app| matches(app))
            .ok_or_else(|| {
                LifetimeError::AppDoesNotExist(format!(
                    "Failed to retrieve the application. \
                     Please make sure the app exists in the environment. {missing}"
                ))
            })
    }

    pub async fn get_application_key(&self, name: &str) -> Result<String> {
        let app = self
            .find_application(|app| app.name == name, format!("App Name: {name}"))
            .await?;
        Ok(app.key)
    }

    pub async fn get_application_name(&self, key: &str) -> Result<String> {
        let app = self
            .find_application(|app| app.key == key, format!("App Key: {key}"))
            .await?;
        Ok(app.name)
    }

    pub async fn resolve_application(&self, app: AppRef<'_>) -> Result<Named> {
        match app {
            AppRef::Name(name) => Ok(Named {
                name: name.to_string(),
                key: self.get_application_key(name).await?,
            }),
            AppRef::Key(key) => Ok(Named {
                name: self.get_application_name(key).await?,
                key: key.to_string(),
            }),
        }
    }

    /// `GET applications/{key}`, cached as `application_data/{name}.cache`.
    pub async fn get_application_data(
        &self,
        app: AppRef<'_>,
        extra_data: bool,
    ) -> Result<Application> {
        let app = self.resolve_application(app).await?;
        let path = format!("applications/{}", app.key);
        let query = [
            ("IncludeModules", flag(extra_data)),
            ("IncludeEnvStatus", flag(extra_data)),
        ];
        let response = self.client.get(&path, &query).await?;
        let body = DETAILS.expect(response, &app.name)?;
        self.store.store(&CacheFile::application(&app.name), &body)?;
        decode(body, &path)
    }

    /// Latest `count` tagged versions, newest first.
    pub async fn get_application_versions(
        &self,
        app: AppRef<'_>,
        count: u32,
    ) -> Result<Vec<ApplicationVersion>> {
        let app = self.resolve_application(app).await?;
        let path = format!("applications/{}/versions", app.key);
        let query = [("MaximumVersionsToReturn", count.to_string())];
        let response = self.client.get(&path, &query).await?;
        let body = VERSIONS.expect(response, &app.name)?;
        self.store
            .store(&CacheFile::application_versions(&app.name), &body)?;
        decode(body, &path)
    }

    pub async fn get_application_version(
        &self,
        app: AppRef<'_>,
        version_key: &str,
    ) -> Result<ApplicationVersion> {
        let app = self.resolve_application(app).await?;
        let path = format!("applications/{}/versions/{version_key}", app.key);
        let response = self.client.get(&path, &[]).await?;
        let body = VERSION.expect(response, &format!("{} ({version_key})", app.name))?;
        self.store.store(
            &CacheFile::application_version(&app.name, version_key),
            &body,
        )?;
        decode(body, &path)
    }

    /// Version tag currently deployed for `app` in the environment `env_key`.
    pub async fn get_running_app_version(
        &self,
        env_key: &str,
        app: AppRef<'_>,
    ) -> Result<RunningAppVersion> {
        let named = self.resolve_application(app).await?;
        let status = self
            .get_environment_app_version(EnvRef::Key(env_key), AppRef::Key(&named.key), true)
            .await?;
        let in_env = status.status_in(env_key).ok_or_else(|| {
            LifetimeError::AppDoesNotExist(format!(
                "Application {} is not deployed in environment {env_key}",
                named.name
            ))
        })?;
        let version = self
            .get_application_version(AppRef::Key(&named.key), &in_env.base_application_version_key)
            .await?;
        Ok(RunningAppVersion {
            name: named.name,
            key: named.key,
            version: version.version,
            version_key: version.key,
            change_log: version.change_log,
            created_on: version.created_on,
            deployment_zone_key: in_env.deployment_zone_key.clone(),
        })
    }

    /// Tag the running version of `app_key` in `env_key`; returns the new version key.
    ///
    /// Modified native shells of a mobile app are tagged along with it.
    pub async fn set_application_version(
        &self,
        env_key: &str,
        app_key: &str,
        change_log: &str,
        version: &str,
        mobile_versions: &[MobileVersion],
    ) -> Result<String> {
        let path = format!("environments/{env_key}/applications/{app_key}/versions");
        let body = json!({
            "ChangeLog": change_log,
            "Version": version,
            "MobileVersions": mobile_versions,
        });
        let response = self.client.post(&path, &[], Some(&body)).await?;
        let created = TAG.expect(response, &format!("{app_key} as {version}"))?;
        Ok(returned_key(&created))
    }

    /// Export an application version as an OAP under `application_oap/`.
    pub async fn export_app_oap(
        &self,
        env_key: &str,
        app_key: &str,
        version_key: &str,
        file_name: &str,
    ) -> Result<PathBuf> {
        let path =
            format!("environments/{env_key}/applications/{app_key}/versions/{version_key}/content");
        let response = self.client.get(&path, &[]).await?;
        let body = EXPORT.expect(response, app_key)?;
        let link: DownloadLink = decode(body, &path)?;
        let stored = self
            .download_package(&CacheFile::oap(file_name), &link.url)
            .await?;
        info!(app = app_key, file = file_name, "application package exported");
        Ok(stored)
    }
}
