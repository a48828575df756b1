use super::types::Counter;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Label key: a vector of (key, value) pairs in declaration order.
pub type LabelKey = Vec<(String, String)>;

/// A labeled counter, one independent counter per label set.
///
/// A repeated observation increments the existing series; a label set is only
/// created on its first observation, so the series cardinality is bounded by
/// what the cluster actually emits.
#[derive(Debug, Default, Clone)]
pub struct LabeledCounter {
    entries: Arc<RwLock<HashMap<LabelKey, Counter>>>,
}

impl LabeledCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1 for the given label set.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        let key: LabelKey = labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();

        let counters = self.entries.read().unwrap_or_else(|e| e.into_inner());
        if let Some(c) = counters.get(&key) {
            c.inc();
            return;
        }
        drop(counters);

        let mut counters = self.entries.write().unwrap_or_else(|e| e.into_inner());
        counters.entry(key).or_default().inc();
    }

    /// Current value for the given label set (0 when never observed).
    #[must_use]
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        let key: LabelKey = labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let counters = self.entries.read().unwrap_or_else(|e| e.into_inner());
        counters.get(&key).map(Counter::get).unwrap_or(0)
    }

    /// All series as (label set, value), unordered.
    #[must_use]
    pub fn entries(&self) -> Vec<(LabelKey, u64)> {
        let counters = self.entries.read().unwrap_or_else(|e| e.into_inner());
        counters
            .iter()
            .map(|(labels, c)| (labels.clone(), c.get()))
            .collect()
    }

    /// Number of distinct label sets.
    #[must_use]
    pub fn series_count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

/// Format label pairs as a Prometheus label string: `{key1="val1",key2="val2"}`.
#[must_use]
pub fn format_labels(labels: &[(String, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("{{{}}}", parts.join(","))
}
