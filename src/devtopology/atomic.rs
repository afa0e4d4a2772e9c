//! One atomic-write primitive shared by every artifact writer, the
//! hosts-file manager, and the release state store: write-temp + fsync +
//! rename-into-place within the target directory.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::StagecraftError;

/// Writes `contents` to `path` atomically. Creates parent directories with
/// `0o755` if missing.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StagecraftError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    create_dir_0755(dir).map_err(|e| io_err(path, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_err(path, e))?;
    tmp.write_all(contents).map_err(|e| io_err(path, e))?;
    tmp.as_file().sync_all().map_err(|e| io_err(path, e))?;
    tmp.persist(path)
        .map_err(|e| io_err(path, e.error))?;
    Ok(())
}

fn create_dir_0755(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

fn io_err(path: &Path, source: std::io::Error) -> StagecraftError {
    StagecraftError::Hosts(crate::error::HostsError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_full_contents_and_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("file.yaml");
        write_atomic(&target, b"hello: world\n").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello: world\n");
    }

    #[test]
    fn two_writes_to_different_dirs_are_byte_identical() {
        let dir1 = tempfile::tempdir().unwrap();
        let dir2 = tempfile::tempdir().unwrap();
        let p1 = dir1.path().join("out.yaml");
        let p2 = dir2.path().join("out.yaml");
        write_atomic(&p1, b"same bytes\n").unwrap();
        write_atomic(&p2, b"same bytes\n").unwrap();
        assert_eq!(
            std::fs::read(&p1).unwrap(),
            std::fs::read(&p2).unwrap()
        );
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("file.yaml");
        write_atomic(&target, b"first\n").unwrap();
        write_atomic(&target, b"second\n").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "second\n");
    }
}
