use std::path::PathBuf;

use crate::{context::ExecutionContext, models::StoreType};

/// A caller-supplied key after normalization for its store type.
///
/// Cache keys are cleaned paths without a trailing slash. Artifact keys
/// only lose a leading `./`, and log keys are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn normalize(store_type: StoreType, key: &str, ctx: &ExecutionContext) -> Self {
        match store_type {
            StoreType::Cache => Self(normalize_cache_key(key, ctx)),
            StoreType::Artifact => Self(key.strip_prefix("./").unwrap_or(key).to_string()),
            StoreType::Log => Self(key.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for keys such as `/` that name no entry once normalized.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The key of a sibling entry, such as the `_md5.json` sidecar of a
    /// cache archive.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self(format!("{}{suffix}", self.0))
    }

    /// The key interpreted as a local filesystem path.
    pub fn local_path(&self, ctx: &ExecutionContext) -> PathBuf {
        ctx.working_dir.join(&self.0)
    }
}

impl std::fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_cache_key(key: &str, ctx: &ExecutionContext) -> String {
    let mut key = clean_path(key);

    if let Some(rest) = key.strip_prefix("~/") {
        key = match &ctx.home_dir {
            Some(home) => clean_path(&format!("{}/{rest}", home.to_string_lossy())),
            None => clean_path(rest),
        };
    }

    if key.starts_with("../") {
        key = clean_path(&format!("{}/{key}", ctx.working_dir.to_string_lossy()));
    }

    key.trim_end_matches('/').to_string()
}

/// Lexically clean a slash-separated path: collapse repeated separators,
/// drop `.` segments and resolve `..` against preceding segments. The
/// empty path cleans to `.`.
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            segment => segments.push(segment),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
