//! Environment listing and lookups.

use super::{AppRef, EnvRef, Lifetime, Named, decode};
use crate::cache::CacheFile;
use crate::client::{ErrorKind, Outcome, StatusTable, flag};
use crate::errors::{LifetimeError, Result};
use crate::lifetime::types::{DeploymentZone, Environment, EnvironmentApplication};
use serde_json::Value;
use tracing::debug;

const LIST: StatusTable = StatusTable::new(
    "list the environments",
    &[
        (200, Outcome::Success),
        (404, Outcome::Fail(ErrorKind::EnvironmentNotFound)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

const APP_VERSION: StatusTable = StatusTable::new(
    "get the running version of",
    &[
        (200, Outcome::Success),
        (400, Outcome::Fail(ErrorKind::InvalidParameters)),
        (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
        (404, Outcome::Fail(ErrorKind::AppDoesNotExist)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

const DEPLOYMENT_ZONES: StatusTable = StatusTable::new(
    "list the deployment zones of",
    &[
        (200, Outcome::Success),
        (400, Outcome::Fail(ErrorKind::InvalidParameters)),
        (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
        (404, Outcome::Fail(ErrorKind::EnvironmentNotFound)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

impl Lifetime {
    /// `GET environments`, cached as `environments.cache`.
    pub async fn get_environments(&self) -> Result<Vec<Environment>> {
        let response = self.client.get("environments", &[]).await?;
        let body = LIST.expect(response, "")?;
        self.store.store(CacheFile::ENVIRONMENTS, &body)?;
        decode(body, "environments")
    }

    async fn find_environment<F>(&self, matches: F, missing: String) -> Result<Environment>
    where
        F: Fn(&Environment) -> bool,
    {
        if let Some(cached) = self
            .store
            .load_optional::<Vec<Environment>>(CacheFile::ENVIRONMENTS)?
        {
            if let Some(env) = cached.into_iter().find(|env| matches(env)) {
                return Ok(env);
            }
            debug!("environment not in cache, refetching");
            self.store.clear(CacheFile::ENVIRONMENTS)?;
        }
        self.get_environments()
            .await?
            .into_iter()
            .find(|env| matches(env))
            .ok_or_else(|| {
                LifetimeError::EnvironmentNotFound(format!(
                    "Failed to retrieve the environment. \
                     Please make sure the environment exists. {missing}"
                ))
            })
    }

    pub async fn get_environment_key(&self, name: &str) -> Result<String> {
        let env = self
            .find_environment(|env| env.name == name, format!("Environment name: {name}"))
            .await?;
        Ok(env.key)
    }

    pub async fn get_environment_name(&self, key: &str) -> Result<String> {
        let env = self
            .find_environment(|env| env.key == key, format!("Environment key: {key}"))
            .await?;
        Ok(env.name)
    }

    pub async fn get_environment_url(&self, name: &str) -> Result<String> {
        let env = self
            .find_environment(
                |env| env.name == name && env.host_name.as_deref().is_some_and(|h| !h.is_empty()),
                format!("Environment name: {name}"),
            )
            .await?;
        Ok(env.host_name.unwrap_or_default())
    }

    pub async fn resolve_environment(&self, env: EnvRef<'_>) -> Result<Named> {
        match env {
            EnvRef::Name(name) => Ok(Named {
                name: name.to_string(),
                key: self.get_environment_key(name).await?,
            }),
            EnvRef::Key(key) => Ok(Named {
                name: self.get_environment_name(key).await?,
                key: key.to_string(),
            }),
        }
    }

    /// Running version of an application in one environment.
    ///
    /// Cached as `environment_data/{env}.{app}.applications.cache`.
    pub async fn get_environment_app_version(
        &self,
        env: EnvRef<'_>,
        app: AppRef<'_>,
        extra_data: bool,
    ) -> Result<EnvironmentApplication> {
        let app = self.resolve_application(app).await?;
        let env = self.resolve_environment(env).await?;
        let path = format!("environments/{}/applications/{}", env.key, app.key);
        let query = [
            ("IncludeEnvStatus", flag(extra_data)),
            ("IncludeModules", flag(extra_data)),
        ];
        let response = self.client.get(&path, &query).await?;
        let body = APP_VERSION.expect(response, &format!("{} in {}", app.name, env.name))?;
        self.store.store(
            &CacheFile::environment_application(&env.name, &app.name),
            &body,
        )?;
        decode(body, &path)
    }

    /// Deployment zones of an environment, cached per environment name.
    pub async fn get_environment_deployment_zones(
        &self,
        env: EnvRef<'_>,
    ) -> Result<Vec<DeploymentZone>> {
        let env = self.resolve_environment(env).await?;
        let path = format!("environments/{}/deploymentzones", env.key);
        let response = self.client.get(&path, &[]).await?;
        let body = DEPLOYMENT_ZONES
            .dispatch(response, &env.name)?
            .unwrap_or_else(|| Value::Array(Vec::new()));
        self.store
            .store(&CacheFile::environment_deployment_zones(&env.name), &body)?;
        decode(body, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiResponse;
    use serde_json::json;

    #[test]
    fn test_list_table() {
        assert!(matches!(
            LIST.dispatch(ApiResponse { status: 404, body: json!({}) }, ""),
            Err(LifetimeError::EnvironmentNotFound(_))
        ));
    }

    #[test]
    fn test_app_version_table_maps_not_found_to_app() {
        let err = APP_VERSION
            .dispatch(ApiResponse { status: 404, body: json!("no app") }, "Portal in QA")
            .unwrap_err();
        assert!(matches!(err, LifetimeError::AppDoesNotExist(m) if m.contains("Portal in QA")));
    }

    #[test]
    fn test_deployment_zone_table() {
        assert!(matches!(
            DEPLOYMENT_ZONES.dispatch(ApiResponse { status: 403, body: json!({}) }, "QA"),
            Err(LifetimeError::NotEnoughPermissions(_))
        ));
    }
}
