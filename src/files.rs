// src/files.rs
//
// Local download directory: creation, clearing, listing, and collision-safe
// destination names.

use log::{debug, info, warn};
use regex::Regex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Suffix of files still being written; never listed as finished downloads.
pub const PARTIAL_SUFFIX: &str = ".chip-sync-partial";

pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        debug!("Directory already exists: {}", dir.display());
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    info!("Created directory {}", dir.display());
    Ok(())
}

/// Delete every regular file directly inside `dir`; sub-directories are kept.
pub fn clear_files(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path)?;
            debug!("Removed {}", path.display());
            removed += 1;
        }
    }
    info!("🧹 Removed {} file(s) from {}", removed, dir.display());
    Ok(removed)
}

/// Regular files directly inside `dir`, sorted by name. Partial downloads are skipped.
pub fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX))
        {
            warn!("Skipping partial download {}", path.display());
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// File name without its last extension (`A1.pdf` → `A1`).
pub fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

fn reserved_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("valid filename regex"))
}

/// Make a provider-supplied attachment name safe to use as a local file name.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = reserved_chars().replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `dir/name` if free, else `dir/stem_1.ext`, `dir/stem_2.ext`, ...
pub fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let original = Path::new(name);
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, ext));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Write `data` to `dest` via a synced temporary file so a crash never
/// leaves a truncated file under the final name.
pub fn write_durably(dest: &Path, data: &[u8]) -> io::Result<()> {
    let mut tmp_name = dest.as_os_str().to_owned();
    tmp_name.push(PARTIAL_SUFFIX);
    let tmp = PathBuf::from(tmp_name);

    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp, dest)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
