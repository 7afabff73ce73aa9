//! URL input: positional arguments and URL list files.

use prism_core::Url;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// Schemes the pipeline can fetch.
const SUPPORTED_SCHEMES: &[&str] = &["http", "https", "file"];

/// Gather URLs from the command line and an optional list file (`-` for stdin).
///
/// Invalid entries are warned about and skipped; duplicates keep their first
/// position.
pub fn collect_urls(args: &[String], list: Option<&Path>) -> anyhow::Result<Vec<Url>> {
    let mut entries: Vec<String> = args.to_vec();

    if let Some(path) = list {
        let content = if path == Path::new("-") {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        } else {
            std::fs::read_to_string(path).map_err(|e| {
                anyhow::anyhow!("Cannot read URL list {}: {e}", path.display())
            })?
        };
        entries.extend(list_entries(&content).map(str::to_string));
    }

    Ok(parse_entries(&entries))
}

/// Non-empty, non-comment lines of a URL list.
fn list_entries(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

fn parse_entries(entries: &[String]) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut urls = Vec::with_capacity(entries.len());

    for entry in entries {
        match parse_entry(entry) {
            Ok(url) => {
                if seen.insert(url.to_string()) {
                    urls.push(url);
                } else {
                    tracing::debug!("Skipping duplicate URL: {url}");
                }
            }
            Err(reason) => tracing::warn!("Skipping '{entry}': {reason}"),
        }
    }
    urls
}

/// Parse one entry. Existing local paths become `file://` URLs.
fn parse_entry(entry: &str) -> Result<Url, String> {
    match Url::parse(entry) {
        Ok(url) if SUPPORTED_SCHEMES.contains(&url.scheme()) => Ok(url),
        Ok(url) => Err(format!("unsupported scheme '{}'", url.scheme())),
        Err(e) => {
            let path = Path::new(entry);
            if path.is_file() {
                let absolute = path.canonicalize().map_err(|e| e.to_string())?;
                Url::from_file_path(&absolute)
                    .map_err(|_| format!("cannot convert {} to a URL", absolute.display()))
            } else {
                Err(e.to_string())
            }
        }
    }
}
