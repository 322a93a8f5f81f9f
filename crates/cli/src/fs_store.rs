use graft_merge::FileStore;
use std::io;
use std::path::Path;

/// File store backed by the local filesystem
pub struct FsStore {
    dry_run: bool,
}

impl FsStore {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl FileStore for FsStore {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_file(&self, path: &Path, text: &str) -> io::Result<()> {
        if self.dry_run {
            log::info!("dry run: would write {} bytes to {}", text.len(), path.display());
            return Ok(());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)
    }
}
