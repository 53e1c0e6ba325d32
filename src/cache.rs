use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};

const CACHE_DIR: &str = "dota_rewind";

/// Serve a previously stored body for `url`, if present and young enough.
/// `max_age: None` means entries never expire (match payloads are immutable
/// once parsed upstream).
pub fn lookup(url: &str, max_age: Option<Duration>) -> Option<String> {
    let path = entry_path(url)?;
    let meta = fs::metadata(&path).ok()?;

    if let Some(max_age) = max_age {
        let modified = meta.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).ok()?;
        if age > max_age {
            log::debug!("cache entry for {url} expired ({}s old)", age.as_secs());
            return None;
        }
    }

    let body = fs::read_to_string(&path).ok()?;
    log::debug!("serving {url} from cache");
    Some(body)
}

pub fn store(url: &str, body: &str) -> Result<()> {
    let Some(path) = entry_path(url) else {
        return Ok(());
    };
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(dir).ok();
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body).context("write cache entry")?;
    fs::rename(&tmp, &path).context("swap cache entry")?;
    Ok(())
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn entry_path(url: &str) -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(filename_for(url)))
}

// One file per resource, named after the URL so the cache is inspectable.
fn filename_for(url: &str) -> String {
    let stripped = url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let mut name: String = stripped
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    name.push_str(".json");
    name
}
