//! Where target contract sets come from.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, bounded};

use crate::contract::RawContract;
use crate::error::{ChainError, Result};

/// Fetches the contracts a target (municipality or department) issued.
///
/// `target` is matched exactly against the issuing-entity name and at most
/// `limit` rows are returned. An unknown target is an empty result, not an
/// error.
pub trait ContractSource: Send + Sync {
    /// # Errors
    /// Implementation specific; the assembler logs the error and skips the
    /// target.
    fn fetch(&self, target: &str, limit: usize) -> Result<Vec<RawContract>>;
}

impl<S: ContractSource + ?Sized> ContractSource for Arc<S> {
    fn fetch(&self, target: &str, limit: usize) -> Result<Vec<RawContract>> {
        (**self).fetch(target, limit)
    }
}

impl<S: ContractSource + ?Sized> ContractSource for &S {
    fn fetch(&self, target: &str, limit: usize) -> Result<Vec<RawContract>> {
        (**self).fetch(target, limit)
    }
}

/// Contract sets held in memory, keyed by target name.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    contracts: HashMap<String, Vec<RawContract>>,
}

impl InMemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON object mapping target name to an array of contracts.
    ///
    /// # Errors
    /// [`ChainError::Json`] if the document does not have that shape.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let contracts: HashMap<String, Vec<RawContract>> = serde_json::from_reader(reader)?;
        Ok(Self { contracts })
    }

    pub fn insert(&mut self, target: impl Into<String>, contracts: Vec<RawContract>) {
        self.contracts.insert(target.into(), contracts);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

impl ContractSource for InMemorySource {
    fn fetch(&self, target: &str, limit: usize) -> Result<Vec<RawContract>> {
        Ok(self
            .contracts
            .get(target)
            .map(|rows| rows.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Bounds every fetch of the wrapped source by a deadline.
///
/// The fetch runs on a helper thread; if it has not answered in time the
/// target is treated as having no contracts. The helper thread is left to
/// finish on its own.
#[derive(Debug)]
pub struct TimeoutSource<S> {
    inner: Arc<S>,
    timeout: Duration,
}

impl<S> TimeoutSource<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }
}

impl<S: ContractSource + 'static> ContractSource for TimeoutSource<S> {
    fn fetch(&self, target: &str, limit: usize) -> Result<Vec<RawContract>> {
        let (tx, rx) = bounded(1);
        let inner = Arc::clone(&self.inner);
        let owned_target = target.to_string();
        thread::Builder::new()
            .name("contract-fetch".into())
            .spawn(move || {
                // The receiver may be gone after a timeout.
                let _ = tx.send(inner.fetch(&owned_target, limit));
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Fetching contracts for {target} timed out after {:?}; treating as empty",
                    self.timeout
                );
                Ok(Vec::new())
            }
            Err(RecvTimeoutError::Disconnected) => Err(ChainError::Source {
                target: target.to_string(),
                reason: "fetch worker exited without a result".into(),
            }),
        }
    }
}
