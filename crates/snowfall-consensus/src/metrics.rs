//! Lightweight metrics counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// A monotonically increasing counter.
#[derive(Debug)]
pub struct Counter {
    name: String,
    help: String,
    value: AtomicU64,
}

impl Counter {
    /// Creates a new counter.
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            help: help.into(),
            value: AtomicU64::new(0),
        })
    }

    /// The counter's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The counter's help text.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Increments the counter by one.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds `n` to the counter.
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// The current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A registry of counters gathered per chain.
#[derive(Debug, Default)]
pub struct Registry {
    counters: RwLock<Vec<Arc<Counter>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a counter so it shows up in [`gather`].
    ///
    /// [`gather`]: Registry::gather
    pub fn register(&self, counter: Arc<Counter>) {
        self.counters.write().push(counter);
    }

    /// Snapshots all registered counters as (name, value) pairs.
    pub fn gather(&self) -> Vec<(String, u64)> {
        self.counters
            .read()
            .iter()
            .map(|c| (c.name().to_string(), c.get()))
            .collect()
    }
}
