use std::fs::File;
use std::fs::OpenOptions;
use std::io;

use codeq::error_context_ext::ErrorContextExt;
use fs2::FileExt;
use log::info;

use crate::Config;

/// Exclusive lock on a journal directory, held for the lifetime of a journal.
#[derive(Debug)]
pub(crate) struct FileLock {
    path: String,
    f: File,
}

impl FileLock {
    pub const LOCK_FILE_NAME: &'static str = "LOCK";

    pub(crate) fn new(config: &Config) -> Result<Self, io::Error> {
        let path = Self::lock_path(config);

        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .context(|| format!("open lock file {}", path))?;

        f.try_lock_exclusive().map_err(|e| {
            io::Error::new(
                io::ErrorKind::WouldBlock,
                format!(
                    "Journal directory '{}' is already locked by another \
                    journal instance; error:({})",
                    config.dir, e
                ),
            )
        })?;

        info!("Journal directory lock acquired: {}", path);

        Ok(Self { path, f })
    }

    pub(crate) fn lock_path(config: &Config) -> String {
        format!("{}/{}", config.dir, Self::LOCK_FILE_NAME)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.f.unlock();
        info!("Journal directory lock released: {}", self.path);
    }
}

#[cfg(test)]
mod tests {
    use crate::file_lock::FileLock;
    use crate::Config;

    #[test]
    fn test_lock_journal_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::new(temp_dir.path().to_str().unwrap());

        let lock = FileLock::new(&config).unwrap();

        let err = FileLock::new(&config).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);

        drop(lock);
        let _relocked = FileLock::new(&config).unwrap();
    }
}
