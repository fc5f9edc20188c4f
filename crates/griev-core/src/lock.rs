use crate::error::ErrorCode;
use crate::model::Category;
use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// Default wait before giving up on a contended partition.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Advisory lock errors for the per-category commit partitions.
#[derive(Debug)]
pub enum LockError {
    Timeout { path: PathBuf, waited: Duration },
    IoError(io::Error),
}

impl From<io::Error> for LockError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

impl LockError {
    /// Machine-readable code associated with this lock error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::IoError(_) => ErrorCode::InternalUnexpected,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { path, waited } => {
                write!(
                    f,
                    "{}: lock timed out after {:?} at {}",
                    self.code().code(),
                    waited,
                    path.display()
                )
            }
            Self::IoError(err) => write!(f, "{}: {}", self.code().code(), err),
        }
    }
}

impl std::error::Error for LockError {}

#[derive(Debug)]
struct FileGuard {
    file: File,
    path: PathBuf,
}

impl FileGuard {
    fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "lock path has no parent")
        })?;
        fs::create_dir_all(parent)?;

        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;

            if file.try_lock_exclusive().is_ok() {
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    fn release(self) {
        let _ = self.file.unlock();
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Directory holding partition lock files.
#[must_use]
pub fn lock_dir(project_root: &Path) -> PathBuf {
    project_root.join(crate::config::GRV_DIR).join("locks")
}

/// RAII guard serializing the detect-and-commit critical section for one
/// category. Submissions in different categories proceed in parallel.
#[derive(Debug)]
pub struct PartitionLock {
    guard: FileGuard,
}

impl PartitionLock {
    /// Acquire the exclusive lock for a category partition.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] when another writer holds the same
    /// partition past `timeout`.
    pub fn acquire_category(
        project_root: &Path,
        category: Category,
        timeout: Duration,
    ) -> Result<Self, LockError> {
        let path = lock_dir(project_root).join(format!("{}.lock", category.slug()));
        Self::acquire(&path, timeout)
    }

    /// Acquire an exclusive advisory lock on an explicit lock path.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] when the lock stays held past `timeout`.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        Ok(Self {
            guard: FileGuard::acquire(path, timeout)?,
        })
    }

    /// Explicitly release the lock. Release also happens automatically on drop.
    pub fn release(self) {
        self.guard.release();
    }

    /// Return the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.guard.path()
    }
}

#[cfg(test)]
mod tests {
    use super::{LockError, PartitionLock};
    use crate::error::ErrorCode;
    use crate::model::Category;
    use std::{
        path::PathBuf,
        sync::{Arc, Barrier},
        thread,
        time::Duration,
    };

    fn lock_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push("griev_lock_tests");
        path.push(name);
        path
    }

    #[test]
    fn partition_lock_allows_acquire_and_release() -> Result<(), LockError> {
        let path = lock_path("basic.lock");
        let lock = PartitionLock::acquire(&path, Duration::from_millis(50))?;
        assert_eq!(lock.path(), path.as_path());
        lock.release();
        Ok(())
    }

    #[test]
    fn partition_lock_times_out_when_held() {
        let path = lock_path("timeout.lock");
        let _guard = PartitionLock::acquire(&path, Duration::from_millis(50)).unwrap();
        let err = PartitionLock::acquire(&path, Duration::from_millis(20)).unwrap_err();

        assert!(matches!(err, LockError::Timeout { path: p, .. } if p == path));
    }

    #[test]
    fn lock_error_maps_to_machine_code() {
        let timeout = LockError::Timeout {
            path: lock_path("code.lock"),
            waited: Duration::from_millis(10),
        };
        assert_eq!(timeout.code(), ErrorCode::LockContention);
        assert!(timeout.hint().is_some());
    }

    #[test]
    fn distinct_categories_do_not_contend() -> Result<(), LockError> {
        let root = std::env::temp_dir().join("griev_lock_tests/categories");
        let _ = std::fs::create_dir_all(&root);

        let electricity =
            PartitionLock::acquire_category(&root, Category::Electricity, Duration::from_millis(50))?;
        let water =
            PartitionLock::acquire_category(&root, Category::WaterSupply, Duration::from_millis(50))?;

        electricity.release();
        water.release();
        Ok(())
    }

    #[test]
    fn same_category_serializes() {
        let root = std::env::temp_dir().join("griev_lock_tests/same-category");
        let _ = std::fs::create_dir_all(&root);

        let _held =
            PartitionLock::acquire_category(&root, Category::Other, Duration::from_millis(50))
                .unwrap();
        let second =
            PartitionLock::acquire_category(&root, Category::Other, Duration::from_millis(20));

        assert!(matches!(second, Err(LockError::Timeout { .. })));
    }

    #[test]
    fn lock_release_allows_follow_up_lock() -> Result<(), LockError> {
        let path = lock_path("release-followup.lock");
        {
            let _first = PartitionLock::acquire(&path, Duration::from_millis(50))?;
        }

        let _second = PartitionLock::acquire(&path, Duration::from_millis(50))?;
        Ok(())
    }

    #[test]
    fn contention_is_resolved_after_writer_releases() -> Result<(), LockError> {
        let path = lock_path("thread.lock");

        let blocker = Arc::new(Barrier::new(2));
        let waiter = Arc::new(Barrier::new(2));

        let blocker_thread = Arc::clone(&blocker);
        let waiter_thread = Arc::clone(&waiter);
        let path_in_thread = path.clone();
        let handle = thread::spawn(move || {
            let _writer =
                PartitionLock::acquire(&path_in_thread, Duration::from_millis(200)).unwrap();
            blocker_thread.wait();
            waiter_thread.wait();
        });

        blocker.wait();
        assert!(matches!(
            PartitionLock::acquire(&path, Duration::from_millis(20)),
            Err(LockError::Timeout { .. })
        ));
        waiter.wait();
        handle.join().unwrap();

        let follow_up = PartitionLock::acquire(&path, Duration::from_millis(50))?;
        follow_up.release();
        Ok(())
    }
}
