//! Version stamps on generated grocery rows.
//!
//! A row's source key is `v<plan version>|<bucket key>`. The prefix is the only
//! record of which plan version produced the row, so staleness is decided by
//! comparing it with the plan's current version.

use super::normalize::KEY_DELIMITER;

pub fn version_prefix(version: i32) -> String {
    format!("v{version}{KEY_DELIMITER}")
}

pub fn source_key(version: i32, bucket_key: &str) -> String {
    format!("{}{bucket_key}", version_prefix(version))
}

pub fn is_stamped_with(source_key: &str, version: i32) -> bool {
    source_key.starts_with(&version_prefix(version))
}

/// The bucket part of a source key, if it carries a version prefix.
pub fn bucket_of(source_key: &str) -> Option<&str> {
    let rest = source_key.strip_prefix('v')?;
    let (version, bucket) = rest.split_once(KEY_DELIMITER)?;
    version.parse::<i32>().ok()?;
    Some(bucket)
}
