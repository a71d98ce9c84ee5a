//! Path to storage key translation
//!
//! Filesystem callers hand us paths like `./data/x.json`, `/data//x.json` or
//! `data/x.json`; object storage needs one exact key for all of them. A
//! configured namespace prefix is prepended so several adapters can share a
//! bucket without colliding.

/// Normalize a filesystem-style path into a prefix-free key
///
/// Leading `./` segments and leading slashes are stripped and every run of
/// interior slashes collapses to one. Total and idempotent:
/// `normalize_path(normalize_path(p)) == normalize_path(p)`.
pub fn normalize_path(path: &str) -> String {
    let mut rest = path;
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }

    let mut key = String::with_capacity(rest.len());
    let mut prev_slash = false;
    for c in rest.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        key.push(c);
    }
    key
}

/// Turn a key into a listing prefix with exactly one trailing slash
///
/// The empty key (bucket root) stays empty so listings cover the whole bucket.
pub fn dir_prefix(key: &str) -> String {
    let trimmed = key.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// Maps filesystem paths to storage keys under an optional namespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMapper {
    prefix: String,
}

impl KeyMapper {
    /// Create a mapper for the given namespace prefix
    ///
    /// The prefix is normalized like any path and loses its trailing slashes,
    /// so `"myapp"`, `"/myapp/"` and `"myapp//"` are equivalent.
    pub fn new(prefix: &str) -> Self {
        let prefix = normalize_path(prefix).trim_end_matches('/').to_string();
        Self { prefix }
    }

    /// The normalized namespace prefix (empty when none is configured)
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Compute the storage key for a path
    ///
    /// With no prefix this is [`normalize_path`]. With a prefix the key is
    /// `prefix/normalized`, or the bare prefix for an empty path.
    pub fn to_key(&self, path: &str) -> String {
        let normalized = normalize_path(path);
        if self.prefix.is_empty() {
            normalized
        } else if normalized.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}/{}", self.prefix, normalized)
        }
    }

    /// Listing prefix for the virtual directory at `path`
    pub fn to_dir_prefix(&self, path: &str) -> String {
        dir_prefix(&self.to_key(path))
    }
}
