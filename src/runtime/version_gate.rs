//! # Version Gate
//!
//! Startup check that the Kubernetes API server reports a version inside the
//! range the operator supports. Advisory: nothing here mutates cluster state.

use crate::constants::{MAX_KUBE_API_VERSION, MIN_KUBE_API_VERSION};
use semver::{BuildMetadata, Version};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("unable to parse Kubernetes version '{version}': {source}")]
    Invalid {
        version: String,
        #[source]
        source: semver::Error,
    },
    #[error("minimum supported Kubernetes version is {min}, but the server version is {server}")]
    TooOld { server: Version, min: Version },
    #[error("maximum supported Kubernetes version is {max}, but the server version is {server}")]
    TooNew { server: Version, max: Version },
}

/// Parse a Kubernetes `gitVersion` such as `v1.15.3`, `v1.14.8-eks-b8860f` or `v1.16`.
///
/// Pre-release suffixes keep semver ordering, so `v1.14.8-eks-b8860f` sorts
/// below `v1.14.8`. Build metadata (`+k3s1`) is dropped.
pub fn parse_kube_version(raw: &str) -> Result<Version, VersionError> {
    let trimmed = raw.trim();
    let unprefixed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);

    let mut parsed = match Version::parse(unprefixed) {
        Ok(version) => version,
        Err(_) => Version::parse(&pad_missing_components(unprefixed)).map_err(|source| {
            VersionError::Invalid {
                version: raw.to_string(),
                source,
            }
        })?,
    };

    parsed.build = BuildMetadata::EMPTY;
    Ok(parsed)
}

/// `1.16-gke.1` -> `1.16.0-gke.1`
fn pad_missing_components(version: &str) -> String {
    let split_at = version.find(['-', '+']).unwrap_or(version.len());
    let (core, rest) = version.split_at(split_at);
    let components = core.split('.').count();
    let padding = ".0".repeat(3usize.saturating_sub(components));
    format!("{core}{padding}{rest}")
}

/// Check a reported server version against the supported bounds
pub fn check_supported(reported: &str) -> Result<(), VersionError> {
    check_supported_within(reported, MIN_KUBE_API_VERSION, MAX_KUBE_API_VERSION)
}

/// Check a reported server version against explicit inclusive bounds
pub fn check_supported_within(reported: &str, min: &str, max: &str) -> Result<(), VersionError> {
    let server = parse_kube_version(reported)?;
    let min = parse_kube_version(min)?;
    let max = parse_kube_version(max)?;

    if server < min {
        return Err(VersionError::TooOld { server, min });
    }
    if server > max {
        return Err(VersionError::TooNew { server, max });
    }
    Ok(())
}

/// Ask the API server for its version and run it through the gate
pub async fn check_cluster_version(client: &kube::Client) -> anyhow::Result<String> {
    let info = client.apiserver_version().await?;
    check_supported(&info.git_version)?;
    info!(
        server_version = %info.git_version,
        min = MIN_KUBE_API_VERSION,
        max = MAX_KUBE_API_VERSION,
        "Kubernetes API server version is supported"
    );
    Ok(info.git_version)
}
