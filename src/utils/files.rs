use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Persists exported containers.
pub trait FileWriter {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Writes to the local filesystem, owner read/write only on unix.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsWriter;

impl FileWriter for FsWriter {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600); // Owner read/write only
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }
}

/// Keeps written files in memory.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    files: RefCell<Vec<(PathBuf, Vec<u8>)>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.files.borrow().clone()
    }
}

impl FileWriter for MemoryWriter {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.files
            .borrow_mut()
            .push((path.to_path_buf(), bytes.to_vec()));
        Ok(())
    }
}

/// Replace characters that are awkward in file names
pub fn sanitize_filename(name: &str) -> String {
    name.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_")
}
