//! Content-type inference from file extensions

/// Content type sent for unknown or missing extensions
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Guess the content type of `path` from its extension
pub fn content_type_for(path: &str) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}
