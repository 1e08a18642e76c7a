use std::{
    env, fs,
    path::{Component, Path, PathBuf},
    time::Duration,
};

use reqwest::{blocking::Client, StatusCode};

use crate::{EncoderError, HubSource};

/// Environment variable consulted when [`HubSource::auth_token`] is unset.
pub const HF_TOKEN_ENV: &str = "HF_TOKEN";

impl HubSource {
    /// Local directory holding this revision's files.
    pub fn revision_dir(&self) -> PathBuf {
        self.cache_dir
            .join(format!("models--{}", self.model_id.replace('/', "--")))
            .join(&self.revision)
    }

    pub fn cached_path(&self, filename: &str) -> PathBuf {
        self.revision_dir().join(filename)
    }

    pub fn file_url(&self, filename: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.model_id,
            self.revision,
            filename
        )
    }

    /// Returns the cached copy of `filename`, downloading it first when absent.
    pub fn fetch(&self, filename: &str) -> Result<PathBuf, EncoderError> {
        self.validate(filename)?;
        let target = self.cached_path(filename);
        if target.exists() {
            tracing::debug!(path = %target.display(), "using cached hub file");
            return Ok(target);
        }

        let url = self.file_url(filename);
        tracing::info!(%url, "downloading hub file");
        download_to_path(&target, &url, self.token().as_deref(), self.timeout_secs)?;
        Ok(target)
    }

    fn token(&self) -> Option<String> {
        self.auth_token
            .clone()
            .or_else(|| env::var(HF_TOKEN_ENV).ok())
            .filter(|t| !t.is_empty())
    }

    fn validate(&self, filename: &str) -> Result<(), EncoderError> {
        if self.model_id.is_empty() || self.revision.is_empty() {
            return Err(EncoderError::InvalidConfig(
                "hub model_id and revision must be set".into(),
            ));
        }
        for part in [self.model_id.as_str(), self.revision.as_str(), filename] {
            if !is_plain_relative(part) {
                return Err(EncoderError::InvalidConfig(format!(
                    "`{part}` is not a plain relative hub path"
                )));
            }
        }
        Ok(())
    }
}

fn is_plain_relative(part: &str) -> bool {
    !part.is_empty()
        && Path::new(part)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Downloads `url` into `target` through a sibling `.part` file, creating
/// parent directories as needed.
fn download_to_path(
    target: &Path,
    url: &str,
    token: Option<&str>,
    timeout_secs: Option<u64>,
) -> Result<(), EncoderError> {
    if let Some(parent) = target.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let client = Client::builder()
        .timeout(timeout_secs.map(Duration::from_secs))
        .build()
        .map_err(|e| EncoderError::Download(e.to_string()))?;
    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let mut response = request
        .send()
        .map_err(|e| EncoderError::Download(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(EncoderError::RemoteFileMissing(url.to_string()));
    }
    if !status.is_success() {
        return Err(EncoderError::Download(format!(
            "unexpected status {} while fetching {}",
            status, url
        )));
    }

    let part = part_path(target);
    let mut file = fs::File::create(&part)?;
    let bytes = response
        .copy_to(&mut file)
        .map_err(|e| EncoderError::Download(e.to_string()))?;
    file.sync_all()?;
    drop(file);
    fs::rename(&part, target)?;

    tracing::info!(path = %target.display(), bytes, "download complete");
    Ok(())
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}
