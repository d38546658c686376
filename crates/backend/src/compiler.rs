//! Memoized source-compiler handle.
//!
//! The backend exposes an optional contract-source compiler to the API
//! layer. Probing the configured path is not free, so the handle is built
//! lazily on first use and memoized; changing the path invalidates the memo
//! and rebuilds. Rebuilds are idempotent, so the memo needs no more than a
//! plain mutex.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

/// Failure to construct a compiler handle.
#[derive(Debug, Error)]
pub enum CompilerError {
    /// Nothing exists at the configured path.
    #[error("compiler not found at {0}")]
    NotFound(PathBuf),

    /// The configured path is not a regular file.
    #[error("compiler path is not a file: {0}")]
    NotAFile(PathBuf),
}

/// Handle to an external contract-source compiler binary.
///
/// Construction validates the path; invoking the binary is the API layer's
/// business.
#[derive(Debug)]
pub struct SourceCompiler {
    path: PathBuf,
}

impl SourceCompiler {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, CompilerError> {
        let path = path.into();
        let meta = std::fs::metadata(&path).map_err(|_| CompilerError::NotFound(path.clone()))?;
        if !meta.is_file() {
            return Err(CompilerError::NotAFile(path));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct Slot {
    path: PathBuf,
    handle: Option<Arc<SourceCompiler>>,
}

/// Memoize-with-invalidation cache for the compiler handle.
pub struct CompilerCache {
    slot: Mutex<Slot>,
}

impl CompilerCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            slot: Mutex::new(Slot {
                path: path.into(),
                handle: None,
            }),
        }
    }

    /// The currently configured path.
    pub fn path(&self) -> PathBuf {
        self.slot.lock().path.clone()
    }

    /// The memoized handle, building it on first use.
    pub fn get(&self) -> Result<Arc<SourceCompiler>, CompilerError> {
        let mut slot = self.slot.lock();
        if let Some(handle) = &slot.handle {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(SourceCompiler::new(&slot.path)?);
        slot.handle = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Swap the configured path, drop the memo, and rebuild eagerly.
    pub fn set_path(&self, path: impl Into<PathBuf>) -> Result<Arc<SourceCompiler>, CompilerError> {
        let mut slot = self.slot.lock();
        slot.path = path.into();
        slot.handle = None;
        let handle = Arc::new(SourceCompiler::new(&slot.path)?);
        slot.handle = Some(Arc::clone(&handle));
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Temp file that exists for the duration of a test.
    struct TempBinary(PathBuf);

    impl TempBinary {
        fn create(tag: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "wisp-compiler-{}-{tag}",
                std::process::id()
            ));
            std::fs::write(&path, b"#!/bin/sh\n").expect("temp file should be writable");
            Self(path)
        }
    }

    impl Drop for TempBinary {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn handle_is_memoized() {
        let bin = TempBinary::create("memo");
        let cache = CompilerCache::new(&bin.0);

        let first = cache.get().expect("first build should succeed");
        let second = cache.get().expect("memoized get should succeed");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn set_path_invalidates_and_rebuilds() {
        let old = TempBinary::create("old");
        let new = TempBinary::create("new");
        let cache = CompilerCache::new(&old.0);

        let before = cache.get().expect("initial build should succeed");
        let after = cache
            .set_path(&new.0)
            .expect("rebuild at new path should succeed");

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.path(), new.0.as_path());
        let memoized = cache.get().expect("get after set should succeed");
        assert!(Arc::ptr_eq(&after, &memoized));
    }

    #[test]
    fn missing_binary_is_reported() {
        let cache = CompilerCache::new("/nonexistent/wisp-solc");
        let err = cache.get().expect_err("missing binary must fail");
        assert!(matches!(err, CompilerError::NotFound(_)));
    }

    #[test]
    fn directory_path_is_rejected() {
        let cache = CompilerCache::new(std::env::temp_dir());
        let err = cache.get().expect_err("directory must be rejected");
        assert!(matches!(err, CompilerError::NotAFile(_)));
    }
}
