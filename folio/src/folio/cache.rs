use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Marker recording the `last_edited_time` a post was last rendered from.
pub fn marker_path(cache_root: &Path, slug: &str) -> PathBuf {
    cache_root.join("posts").join(format!("{slug}.edited"))
}

pub fn ensure_cache_root(cache_root: &Path) -> io::Result<()> {
    fs::create_dir_all(cache_root.join("posts"))
}

/// A rendered post can be reused when it was built from the same edit, is not
/// older than any dependency, and is younger than `max_age`.
pub fn post_is_fresh(
    marker: &Path,
    output: &Path,
    edited: &str,
    deps: &[SystemTime],
    max_age: Duration,
) -> io::Result<bool> {
    let recorded = match fs::read_to_string(marker) {
        Ok(recorded) => recorded,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if recorded.trim() != edited {
        return Ok(false);
    }

    let output_meta = match fs::metadata(output) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    let output_time = output_meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

    let newest_dep = deps.iter().copied().max().unwrap_or(SystemTime::UNIX_EPOCH);
    if output_time < newest_dep {
        return Ok(false);
    }

    let age = SystemTime::now()
        .duration_since(output_time)
        .unwrap_or_default();
    Ok(age < max_age)
}

pub fn write_output(path: &Path, html: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, html)
}

pub fn write_marker(marker: &Path, edited: &str) -> io::Result<()> {
    write_output(marker, edited)
}

/// Changes whenever folio itself is rebuilt, so new renderer code invalidates old pages.
pub fn binary_mtime() -> SystemTime {
    std::env::current_exe()
        .and_then(fs::metadata)
        .and_then(|meta| meta.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// SHA-256 over every file with the given extension under `dir`, in path order.
pub fn hash_files_with_extension(dir: &Path, ext: &str) -> io::Result<String> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .filter(|e| e.path().extension().map(|e| e == ext).unwrap_or(false))
        .map(|e| e.into_path())
        .collect();
    paths.sort();

    let mut hasher = Sha256::new();
    for path in paths {
        let rel = path.strip_prefix(dir).unwrap_or(&path);
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update(fs::read(&path)?);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Store `hash` under `.{name}_hash` and return the marker's mtime, which
/// only moves when the hash differs from the stored one.
pub fn update_hash_marker(cache_root: &Path, name: &str, hash: &str) -> io::Result<SystemTime> {
    let marker = cache_root.join(format!(".{name}_hash"));
    let unchanged = fs::read_to_string(&marker)
        .map(|stored| stored.trim() == hash)
        .unwrap_or(false);

    if !unchanged {
        fs::create_dir_all(cache_root)?;
        fs::write(&marker, hash)?;
    }

    Ok(fs::metadata(&marker)?
        .modified()
        .unwrap_or(SystemTime::UNIX_EPOCH))
}
