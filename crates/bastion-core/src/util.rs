use std::path::{Path, PathBuf};

use url::Url;

use crate::error::AppError;

/// Parse an absolute http(s) URL with a host.
pub fn parse_http_url(raw: &str) -> Result<Url, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("URL is required".to_string()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| AppError::InvalidInput(format!("Invalid URL '{trimmed}': {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::InvalidInput(format!(
                "URL must start with http:// or https:// (got '{scheme}')"
            )));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(AppError::InvalidInput(format!("URL has no host: {trimmed}")));
    }

    Ok(url)
}

/// Derive the sibling path that receives only the failed batch items.
///
/// Example: `"out/results.json"` → `"out/results-failed.json"`
pub fn failed_items_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("results");

    let name = match output.extension().and_then(|e| e.to_str()) {
        Some("json") | None => format!("{stem}-failed.json"),
        Some(ext) => format!("{stem}.{ext}-failed.json"),
    };

    output.with_file_name(name)
}
