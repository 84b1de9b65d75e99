//! Relative path handling.

use gallerist_error::{StorageError, StorageErrorKind};
use std::path::{Component, Path, PathBuf};

/// Join a destination subpath and a filename into a `/`-separated relative
/// path, rejecting anything that would escape the store root.
///
/// # Examples
///
/// ```
/// use gallerist_storage::join_relative;
///
/// assert_eq!(join_relative("user/2024", "a.png").unwrap(), "user/2024/a.png");
/// assert_eq!(join_relative("", "a.png").unwrap(), "a.png");
/// assert!(join_relative("../etc", "passwd").is_err());
/// assert!(join_relative("user", "nested/a.png").is_err());
/// ```
pub fn join_relative(sub_path: &str, filename: &str) -> Result<String, StorageError> {
    if filename.is_empty() || filename.contains(['/', '\\']) || filename == "." || filename == ".." {
        return Err(StorageError::new(StorageErrorKind::InvalidPath(format!(
            "filename '{}' must be a single path component",
            filename
        ))));
    }

    let mut parts = normal_components(sub_path)?;
    parts.push(filename.to_string());
    Ok(parts.join("/"))
}

/// Split a relative path into its components, rejecting absolute paths and
/// parent references.
pub(crate) fn normal_components(relative: &str) -> Result<Vec<String>, StorageError> {
    let mut parts = Vec::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
            Component::CurDir => {}
            _ => {
                return Err(StorageError::new(StorageErrorKind::InvalidPath(format!(
                    "'{}' escapes the storage root",
                    relative
                ))));
            }
        }
    }
    Ok(parts)
}

/// Resolve a relative path under `base`.
pub(crate) fn resolve(base: &Path, relative: &str) -> Result<PathBuf, StorageError> {
    let parts = normal_components(relative)?;
    if parts.is_empty() {
        return Err(StorageError::new(StorageErrorKind::InvalidPath(
            "empty relative path".to_string(),
        )));
    }
    Ok(parts.iter().fold(base.to_path_buf(), |acc, p| acc.join(p)))
}

/// Location of `relative` under `base`, keeping only plain components.
///
/// Root, prefix and parent components are dropped, so the result can never
/// leave `base`. No I/O.
pub(crate) fn confine(base: &Path, relative: &str) -> PathBuf {
    Path::new(relative)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .fold(base.to_path_buf(), |acc, part| acc.join(part))
}

/// Prefix and suffix of in-flight temp files.
const PARTIAL_PREFIX: char = '.';
const PARTIAL_SUFFIX: &str = ".part";

/// Name of the temp file a write streams into before it is renamed.
pub(crate) fn partial_name(token: &str) -> String {
    format!("{}{}{}", PARTIAL_PREFIX, token, PARTIAL_SUFFIX)
}

/// True for names produced by [`partial_name`].
pub(crate) fn is_partial(name: &str) -> bool {
    name.starts_with(PARTIAL_PREFIX) && name.ends_with(PARTIAL_SUFFIX)
}

/// Express `path` relative to `base` with `/` separators.
pub(crate) fn relative_to(base: &Path, path: &Path) -> Option<String> {
    let stripped = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = stripped
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rejects_traversal() {
        let base = Path::new("/srv/media");
        assert!(resolve(base, "a/../../b").is_err());
        assert!(resolve(base, "/etc/passwd").is_err());
        assert!(resolve(base, "").is_err());
        assert_eq!(
            resolve(base, "./u/x.png").unwrap(),
            PathBuf::from("/srv/media/u/x.png")
        );
    }

    #[test]
    fn test_confine_never_leaves_base() {
        let base = Path::new("/srv/media");
        assert_eq!(confine(base, "u/x.png"), PathBuf::from("/srv/media/u/x.png"));
        assert_eq!(
            confine(base, "/etc/passwd"),
            PathBuf::from("/srv/media/etc/passwd")
        );
        assert_eq!(
            confine(base, "../../etc/passwd"),
            PathBuf::from("/srv/media/etc/passwd")
        );
        assert_eq!(confine(base, ""), PathBuf::from("/srv/media"));
    }

    #[test]
    fn test_partial_names_are_recognised() {
        let name = partial_name("0123abcd");
        assert_eq!(name, ".0123abcd.part");
        assert!(is_partial(&name));
        assert!(!is_partial("photo.part"));
        assert!(!is_partial(".hidden.jpg"));
    }

    #[test]
    fn test_relative_to_uses_forward_slashes() {
        let base = Path::new("/srv/media");
        let path = base.join("u").join("x.png");
        assert_eq!(relative_to(base, &path).unwrap(), "u/x.png");
    }
}
