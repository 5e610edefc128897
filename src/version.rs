//! Cluster version parsing and upgrade path calculation.

use semver::Version;

use crate::error::KuskError;

/// Parse a cluster version string into a normalized (major, minor, patch) version.
///
/// Accepts an optional `v` prefix and a missing patch component (`1.18` is
/// read as `1.18.0`). Pre-release and build metadata are dropped: skew
/// decisions are made on the numeric triple only.
pub fn parse_cluster_version(version: &str) -> Result<Version, KuskError> {
    let trimmed = version.trim().trim_start_matches('v');
    if trimmed.is_empty() {
        return Err(KuskError::InvalidVersion(version.to_string()));
    }

    let parsed = Version::parse(trimmed)
        .or_else(|_| Version::parse(&format!("{trimmed}.0")))
        .map_err(|_| KuskError::InvalidVersion(version.to_string()))?;

    Ok(Version::new(parsed.major, parsed.minor, parsed.patch))
}

/// Parse a component version as reported by a node.
///
/// Node status strings carry packaging noise the skew logic must not see:
/// a runtime scheme (`cri-o://1.18.0`), a `v` prefix (`v1.18.0`), or an
/// image-tag revision suffix (`1.18.0-rev2`).
pub fn parse_component_version(version: &str) -> Result<Version, KuskError> {
    let without_scheme = match version.split_once("://") {
        Some((_, rest)) => rest,
        None => version,
    };

    // `-rev2` style suffixes parse as semver pre-release identifiers, so a
    // plain parse followed by triple normalization handles them too. The
    // digits-only fallback covers tags like `1.18.0_suse.1`.
    parse_cluster_version(without_scheme).or_else(|_| {
        let numeric: String = without_scheme
            .trim_start_matches('v')
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        parse_cluster_version(&numeric)
            .map_err(|_| KuskError::InvalidVersion(version.to_string()))
    })
}

/// Calculate the upgrade path from the current cluster version given the
/// catalog's available platform versions (ascending).
///
/// The path contains only versions strictly above the current one, one entry
/// per minor, each exactly one minor above its predecessor. A catalog entry
/// that would skip a minor ends the path: the platform is upgraded one minor
/// release at a time.
pub fn upgrade_path_with_available_versions(
    current: &Version,
    available: &[Version],
) -> Vec<Version> {
    let mut candidates: Vec<Version> = available.iter().filter(|v| *v > current).cloned().collect();
    candidates.sort();

    let mut path: Vec<Version> = Vec::new();
    for candidate in candidates {
        let previous = path.last().unwrap_or(current);
        if candidate.major == previous.major && candidate.minor == previous.minor {
            // Newer patch of a minor already on the path replaces it.
            if let Some(last) = path.last_mut() {
                *last = candidate;
            }
            continue;
        }
        if candidate.major == previous.major && candidate.minor == previous.minor + 1 {
            path.push(candidate);
        } else {
            break;
        }
    }
    path
}
