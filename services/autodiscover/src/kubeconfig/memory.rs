//! In-memory kubeconfig store, used by tests and dry runs

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ConfigStore, Kubeconfig};
use crate::error::{AutodiscoverError, Result};

#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: Mutex<Kubeconfig>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryConfigStore {
    pub fn new(config: Kubeconfig) -> Self {
        Self {
            config: Mutex::new(config),
            saves: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Current persisted document
    pub fn current(&self) -> Kubeconfig {
        self.config
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every following save fail, to exercise write-back errors.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Kubeconfig> {
        Ok(self.current())
    }

    fn save(&self, config: &Kubeconfig) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AutodiscoverError::store_save("memory", "save rejected"));
        }

        *self
            .config
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = config.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
