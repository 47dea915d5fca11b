//! Storage path validation.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Validate and normalize a path relative to the storage root.
///
/// `.` components and repeated or trailing separators are dropped and `..`
/// is resolved lexically. A path that would leave the root, carries a null
/// byte or a platform prefix, or normalizes to nothing is an
/// [`InvalidPath`](ErrorKind::InvalidPath).
///
/// ```
/// use std::path::Path;
/// use catalog_storage::validate_path;
///
/// assert_eq!(validate_path("covers//ab/./abcd.jpg").unwrap(), Path::new("covers/ab/abcd.jpg"));
/// assert_eq!(validate_path("covers/tmp/../ab.jpg").unwrap(), Path::new("covers/ab.jpg"));
/// assert!(validate_path("../outside.jpg").is_err());
/// assert!(validate_path("covers/../../outside.jpg").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(original.to_path_buf());
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(part) => {
                // Components keep null bytes on Unix; syscalls would truncate at them.
                if part.as_encoded_bytes().contains(&0) {
                    exn::bail!(invalid());
                }
                components.push(part);
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(invalid());
    }
    Ok(components.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes() {
        assert_eq!(validate("covers/ab/abcd.jpg").unwrap(), Path::new("covers/ab/abcd.jpg"));
        assert_eq!(validate("/covers/ab/").unwrap(), Path::new("covers/ab"));
        assert_eq!(validate("covers//ab///abcd.png").unwrap(), Path::new("covers/ab/abcd.png"));
        assert_eq!(validate("covers/ab/..").unwrap(), Path::new("covers"));
    }

    #[test]
    fn test_rejects_escapes() {
        assert!(validate("..").is_err());
        assert!(validate("../covers/a.jpg").is_err());
        assert!(validate("covers/../../a.jpg").is_err());
    }

    #[test]
    fn test_rejects_empty_and_null() {
        for path in ["", ".", "./.", "//", "a\0b"] {
            let err = validate(path).unwrap_err();
            assert!(matches!(&*err, ErrorKind::InvalidPath(_)), "{path:?}");
        }
    }
}
