//! Fixed-size pool of revision source handles.
//!
//! Each worker checks out a handle for the duration of one task and the
//! guard puts it back on drop, so a handle is never used by two threads at
//! once.

use std::ops::Deref;
use std::path::Path;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::source::RevisionSource;

pub struct SourcePool<S> {
    handles: Mutex<Vec<S>>,
    available: Condvar,
    size: usize,
}

impl<S: RevisionSource> SourcePool<S> {
    /// Opens `size` handles on the repository at `path`.
    pub fn open(path: &Path, size: usize) -> Result<Self> {
        let size = size.max(1);
        let handles = (0..size)
            .map(|_| S::open(path))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!("Opened {} source handles on {}", size, path.display());
        Ok(Self::from_handles(handles))
    }
}

impl<S> SourcePool<S> {
    pub fn from_handles(handles: Vec<S>) -> Self {
        let size = handles.len();
        Self {
            handles: Mutex::new(handles),
            available: Condvar::new(),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<S>>> {
        self.handles
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))
    }

    /// Blocks until a handle is free.
    pub fn acquire(&self) -> Result<PooledSource<'_, S>> {
        if self.size == 0 {
            return Err(Error::Internal("Source pool is empty".to_string()));
        }

        let mut handles = self.lock()?;
        loop {
            if let Some(handle) = handles.pop() {
                return Ok(PooledSource {
                    pool: self,
                    handle: Some(handle),
                });
            }
            handles = self
                .available
                .wait(handles)
                .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;
        }
    }

    fn release(&self, handle: S) {
        if let Ok(mut handles) = self.handles.lock() {
            handles.push(handle);
            self.available.notify_one();
        }
    }
}

/// A handle checked out of a [`SourcePool`].
pub struct PooledSource<'a, S> {
    pool: &'a SourcePool<S>,
    handle: Option<S>,
}

impl<S> Deref for PooledSource<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        // Only taken in drop.
        self.handle.as_ref().expect("pooled handle present until drop")
    }
}

impl<S> Drop for PooledSource<'_, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.release(handle);
        }
    }
}
