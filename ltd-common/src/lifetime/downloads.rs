//! Binary downloads from LifeTime links.

use super::Lifetime;
use crate::client::{ApiResponse, ErrorKind, Outcome, StatusTable};
use crate::errors::{LifetimeError, Result};
use crate::util::humanize_bytes;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

const DOWNLOAD: StatusTable = StatusTable::new(
    "download the package from",
    &[
        (200, Outcome::Empty),
        (400, Outcome::Fail(ErrorKind::InvalidParameters)),
        (403, Outcome::Fail(ErrorKind::NotEnoughPermissions)),
        (404, Outcome::Fail(ErrorKind::EnvironmentNotFound)),
        (500, Outcome::Fail(ErrorKind::ServerError)),
    ],
);

impl Lifetime {
    /// Download `url` into the artifact store under `name`.
    pub async fn download_package(&self, name: &str, url: &str) -> Result<PathBuf> {
        let (status, bytes) = self.client.download(url).await?;
        if status != 200 {
            let body = Value::String(String::from_utf8_lossy(&bytes).into_owned());
            DOWNLOAD
                .dispatch(ApiResponse { status, body }, url)
                .map_err(|source| LifetimeError::PackageDownload {
                    url: url.to_string(),
                    source: Box::new(source),
                })?;
        }
        let path = self.store.store_bytes(name, &bytes)?;
        debug!(
            path = %path.display(),
            size = %humanize_bytes(bytes.len() as u64),
            "package downloaded"
        );
        Ok(path)
    }
}
