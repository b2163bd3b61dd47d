//! Interval-gated reinstall of the active kernel when a newer release exists.

use tracing::{debug, info, warn};

use super::cache::{KernelUpdateCache, is_due};
use crate::config::Config;
use crate::fetch::HttpClient;
use crate::install::{InstallOptions, Installer};
use crate::kernel::KernelKind;
use crate::manifest::ManifestStore;
use crate::release::ReleaseResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelUpdateOutcome {
  /// Auto-update is off, or the kernel is not a versioned built-in install.
  Skipped,
  NotDue,
  UpToDate { version: String },
  Updated { from: String, to: String },
  /// The check or reinstall failed; the installed version stays in use.
  Failed { version: String, error: String },
}

pub struct KernelUpdater<'a> {
  config: &'a Config,
  client: &'a HttpClient,
}

impl<'a> KernelUpdater<'a> {
  pub fn new(config: &'a Config, client: &'a HttpClient) -> Self {
    Self { config, client }
  }

  /// Check kernel `id` and reinstall it when its release moved on.
  ///
  /// Never fails: problems are logged and reported as [`KernelUpdateOutcome::Failed`].
  pub async fn check(&self, id: &str, now: u64) -> KernelUpdateOutcome {
    if !self.config.auto_update {
      return KernelUpdateOutcome::Skipped;
    }

    let store = ManifestStore::new(&self.config.manifest_path);
    let entry = match store.get(id) {
      Ok(Some(entry)) => entry,
      Ok(None) => return KernelUpdateOutcome::Skipped,
      Err(e) => {
        warn!(id, error = %e, "cannot read manifest, skipping kernel update");
        return KernelUpdateOutcome::Skipped;
      }
    };
    let (Some(kind), Some(current)) = (KernelKind::from_id(id), entry.version) else {
      debug!(id, "kernel has no release to track");
      return KernelUpdateOutcome::Skipped;
    };

    let mut cache = KernelUpdateCache::load(&self.config.cache_dir);
    if !is_due(cache.last_check(id), now, self.config.update_interval) {
      return KernelUpdateOutcome::NotDue;
    }

    let outcome = self.update(id, kind, &current, entry.repo).await;

    let recorded = match &outcome {
      KernelUpdateOutcome::Updated { to, .. } => to.clone(),
      _ => current.clone(),
    };
    cache.record(id, Some(recorded), now);
    if let Err(e) = cache.save(&self.config.cache_dir) {
      warn!(error = %e, "failed to record kernel update check");
    }
    if let Err(e) = store.touch_update_check(now) {
      warn!(error = %e, "failed to record update check in manifest");
    }

    outcome
  }

  /// `repo` is the repository the kernel was installed from, when overridden.
  async fn update(&self, id: &str, kind: KernelKind, current: &str, repo: Option<String>) -> KernelUpdateOutcome {
    let resolver = ReleaseResolver::new(self.config, self.client);
    let source = repo.as_deref().unwrap_or_else(|| self.config.repo_for(kind));
    let latest = match resolver.latest(source, Some(id)).await {
      Ok(latest) => latest,
      Err(e) => {
        warn!(id, error = %e, "kernel update check failed");
        return KernelUpdateOutcome::Failed {
          version: current.to_string(),
          error: e.to_string(),
        };
      }
    };

    if latest.version == current {
      debug!(id, version = current, "kernel is up to date");
      return KernelUpdateOutcome::UpToDate {
        version: current.to_string(),
      };
    }

    info!(id, from = current, to = %latest.version, "updating kernel");
    let options = InstallOptions {
      force: true,
      repo,
      ..Default::default()
    };
    match Installer::new(self.config, self.client)
      .install_release_ref(id, &latest, &options)
      .await
    {
      Ok(_) => KernelUpdateOutcome::Updated {
        from: current.to_string(),
        to: latest.version,
      },
      Err(e) => {
        warn!(id, error = %e, "kernel update failed, keeping installed version");
        KernelUpdateOutcome::Failed {
          version: current.to_string(),
          error: e.to_string(),
        }
      }
    }
  }
}
