use std::path::{Path, PathBuf};

/// Find the nearest directory at or above `start` that contains a `node_modules` directory.
///
/// The walk is inclusive of `start` and stops at the file-system root.
/// Returns `None` if no ancestor has one; that is not an error.
pub async fn find_dependency_root(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        if is_dir(&dir.join("node_modules")).await {
            return Some(dir.to_path_buf());
        }
    }
    None
}

/// Find the nearest `package.json` at or above `start`.
pub async fn find_package_json(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join("package.json");
        if is_file(&candidate).await {
            return Some(candidate);
        }
    }
    None
}

/// Absolute, non-UNC form of `path`.
///
/// Falls back to joining onto `base` when the path cannot be canonicalized
/// (for example because it does not exist yet).
#[must_use]
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    dunce::canonicalize(&joined).unwrap_or(joined)
}

/// Directory containing `path`, or `path` itself when it has no parent.
#[must_use]
pub fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or(path)
}

pub(crate) async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

pub(crate) async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
