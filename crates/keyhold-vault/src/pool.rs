// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded pool for CPU-bound crypto work (PBKDF2, AES-GCM).
//!
//! Jobs run on tokio's blocking threads; a semaphore caps how many run at
//! once so a burst of logins cannot starve the async runtime.

use std::sync::Arc;

use keyhold_config::model::CryptoConfig;
use keyhold_core::KeyholdError;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct CryptoPool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl Default for CryptoPool {
    fn default() -> Self {
        Self::new(4)
    }
}

impl CryptoPool {
    /// A pool running at most `workers` jobs concurrently (minimum 1).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn from_config(config: &CryptoConfig) -> Self {
        Self::new(config.worker_threads)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` off the async executor once a worker slot is free.
    ///
    /// The permit is held by the blocking thread, so a cancelled caller does
    /// not release the slot before the job finishes.
    pub async fn run<T, F>(&self, job: F) -> Result<T, KeyholdError>
    where
        F: FnOnce() -> Result<T, KeyholdError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| KeyholdError::Internal("crypto pool is closed".to_string()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| KeyholdError::Internal(format!("crypto job panicked: {e}")))?
    }
}
