//! Constants shared across the crate.

/// Application name used for directory names and user-agent strings.
pub const APP_NAME: &str = "runkit";

/// Repository that hosts runkit and kernel releases unless overridden.
pub const DEFAULT_REPO: &str = "runkit-dev/runkit";

/// Default GitHub REST API base.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default base for release asset downloads.
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com";

/// Seconds between update checks when not configured.
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 86_400;

/// Seconds before an HTTP request is abandoned when not configured.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

/// Name of the structured release manifest attached to each release.
pub const RELEASE_MANIFEST_ASSET: &str = "release-manifest.json";

/// Tag prefix used when a version is pinned explicitly.
pub const PINNED_TAG_PREFIX: &str = "v";
