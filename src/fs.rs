//! File system utilities.

use std::fs;
use std::io;
use std::path::Path;

/// Copy a directory recursively. Symbolic links are followed so the copy
/// never refers back into the source tree.
pub fn copy_dir_all(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> io::Result<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    // Refuse to copy a directory into itself
    let src_canon = fs::canonicalize(src)?;
    let dst_parent = dst
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .and_then(|p| fs::canonicalize(p).ok());
    if dst_parent.is_some_and(|p| p.starts_with(&src_canon)) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Cannot copy directory into itself: {:?} is inside {:?}",
                dst, src_canon
            ),
        ));
    }

    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let dst_path = dst.join(entry.file_name());

        if fs::metadata(entry.path())?.is_dir() {
            copy_dir_all(entry.path(), &dst_path)?;
        } else {
            fs::copy(entry.path(), &dst_path)?;
        }
    }
    Ok(())
}

/// Whether `path` is a directory with no entries.
pub fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}
