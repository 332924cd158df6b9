use std::io::{Error, ErrorKind};
use std::path::Path;

/// Creates `fs_path` together with its missing parents. A concurrent
/// creation by someone else is not an error.
pub fn ensure_directory(fs_path: &Path) -> Result<(), Error> {
    if fs_path.is_dir() {
        return Ok(());
    }
    if fs_path.exists() {
        return Err(Error::new(
            ErrorKind::Other,
            format!("{} exists and is not a directory", fs_path.display()),
        ));
    }
    match std::fs::create_dir_all(fs_path) {
        Err(e) if e.kind() != ErrorKind::AlreadyExists => Err(e),
        _ => Ok(()),
    }
}
