//! HTTP access: release metadata and asset downloads.
//!
//! Downloads land in `<cache>/downloads/<kernel>/<version>/<file>` and are
//! reused on later installs unless a reinstall is forced. Files are streamed
//! to a `.part` sibling and renamed into place once complete.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::Config;
use crate::consts::APP_NAME;
use crate::util::hash::short_hash;

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("request to {url} failed: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("request to {url} returned HTTP {status}")]
  Status { url: String, status: u16 },

  #[error("invalid JSON from {url}: {source}")]
  Decode {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("failed to write {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl FetchError {
  /// HTTP status of the failed request, when the server answered.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Status { status, .. } => Some(*status),
      _ => None,
    }
  }
}

/// Thin wrapper over a configured `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpClient {
  client: reqwest::Client,
  token: Option<String>,
}

impl HttpClient {
  pub fn new(config: &Config) -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .user_agent(format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION")))
      .timeout(config.http_timeout)
      .build()
      .map_err(FetchError::Client)?;

    Ok(Self {
      client,
      token: config.github_token.clone(),
    })
  }

  /// GET a JSON document from the release API.
  pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
    debug!(url, "GET json");
    let mut request = self
      .client
      .get(url)
      .header(reqwest::header::ACCEPT, "application/vnd.github+json");
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(|e| FetchError::Request {
      url: url.to_string(),
      source: e,
    })?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }

    response.json::<T>().await.map_err(|e| FetchError::Decode {
      url: url.to_string(),
      source: e,
    })
  }

  /// Stream `url` into `dest`, returning the number of bytes written.
  pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
    info!(url, "fetching URL");

    let io_err = |source| FetchError::Io {
      path: dest.to_path_buf(),
      source,
    };

    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut response = self.client.get(url).send().await.map_err(|e| FetchError::Request {
      url: url.to_string(),
      source: e,
    })?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }

    let part = dest.with_file_name(format!(
      "{}.part",
      dest.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    ));
    // No `.part` file outlives a failed download.
    let written = match stream_to(&mut response, &part, url).await {
      Ok(written) => written,
      Err(e) => {
        let _ = fs::remove_file(&part).await;
        return Err(e);
      }
    };
    if let Err(e) = fs::rename(&part, dest).await {
      let _ = fs::remove_file(&part).await;
      return Err(io_err(e));
    }

    info!(path = %dest.display(), size = written, "download complete");
    Ok(written)
  }

  /// Download `url` to `dest`, reusing an earlier download unless `force`.
  pub async fn download_cached(&self, url: &str, dest: &Path, force: bool) -> Result<PathBuf, FetchError> {
    if !force && fs::try_exists(dest).await.unwrap_or(false) {
      info!(path = %dest.display(), "using cached download");
      return Ok(dest.to_path_buf());
    }

    self.download(url, dest).await?;
    Ok(dest.to_path_buf())
  }
}

/// Convert a URL or asset name to a safe filename.
///
/// Takes the last path component and sanitizes it. Falls back to hash of URL
/// if no suitable filename can be extracted.
pub fn url_to_filename(url: &str) -> String {
  if let Some(filename) = url.rsplit('/').next() {
    // Remove query string
    let filename = filename.split('?').next().unwrap_or(filename);

    // Sanitize: only allow alphanumeric, dash, underscore, dot
    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  format!("download_{}", short_hash(url.as_bytes()))
}

async fn stream_to(response: &mut reqwest::Response, part: &Path, url: &str) -> Result<u64, FetchError> {
  let io_err = |source| FetchError::Io {
    path: part.to_path_buf(),
    source,
  };

  let mut file = fs::File::create(part).await.map_err(io_err)?;
  let mut written = 0u64;
  while let Some(chunk) = response.chunk().await.map_err(|e| FetchError::Request {
    url: url.to_string(),
    source: e,
  })? {
    file.write_all(&chunk).await.map_err(io_err)?;
    written += chunk.len() as u64;
  }
  file.flush().await.map_err(io_err)?;
  Ok(written)
}
