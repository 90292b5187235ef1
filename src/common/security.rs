use std::path::{Component, Path};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilenameError {
    #[error("filename is empty")]
    Empty,

    #[error("filename contains a null byte")]
    NullByte,

    #[error("filename contains a directory separator")]
    ContainsSeparator,

    #[error("filename escapes the target directory")]
    Traversal,
}

/// Wire-supplied filenames end up on disk verbatim, so they must stay a
/// single path component.
pub fn validate_filename(name: &str) -> Result<(), FilenameError> {
    if name.is_empty() {
        return Err(FilenameError::Empty);
    }

    // \0 can terminate the string early once it reaches a C-style API
    if name.contains('\0') {
        return Err(FilenameError::NullByte);
    }

    if name.contains('/') || name.contains('\\') {
        return Err(FilenameError::ContainsSeparator);
    }

    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) | Component::CurDir => continue,
            _ => return Err(FilenameError::Traversal),
        }
    }

    Ok(())
}
