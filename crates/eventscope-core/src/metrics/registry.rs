use super::labeled::{format_labels, LabeledCounter};
use super::types::{Counter, Gauge};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry of named metrics with Prometheus text exposition.
#[derive(Default, Clone)]
pub struct MetricsRegistry {
    counters: Arc<RwLock<HashMap<String, Counter>>>,
    gauges: Arc<RwLock<HashMap<String, Gauge>>>,
    labeled_counters: Arc<RwLock<HashMap<String, LabeledCounter>>>,
}

impl MetricsRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a counter.
    pub fn counter(&self, name: &str) -> Counter {
        let counters = self.counters.read().unwrap_or_else(|e| e.into_inner());
        if let Some(counter) = counters.get(name) {
            return counter.clone();
        }
        drop(counters);

        let mut counters = self.counters.write().unwrap_or_else(|e| e.into_inner());
        counters.entry(name.to_string()).or_default().clone()
    }

    /// Get or create a gauge.
    pub fn gauge(&self, name: &str) -> Gauge {
        let gauges = self.gauges.read().unwrap_or_else(|e| e.into_inner());
        if let Some(gauge) = gauges.get(name) {
            return gauge.clone();
        }
        drop(gauges);

        let mut gauges = self.gauges.write().unwrap_or_else(|e| e.into_inner());
        gauges.entry(name.to_string()).or_default().clone()
    }

    /// Get or create a labeled counter.
    pub fn labeled_counter(&self, name: &str) -> LabeledCounter {
        let lc = self
            .labeled_counters
            .read()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(c) = lc.get(name) {
            return c.clone();
        }
        drop(lc);

        let mut lc = self
            .labeled_counters
            .write()
            .unwrap_or_else(|e| e.into_inner());
        lc.entry(name.to_string()).or_default().clone()
    }

    /// Export all metrics in the Prometheus text exposition format.
    #[must_use]
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        let mut counters: Vec<_> = {
            let guard = self.counters.read().unwrap_or_else(|e| e.into_inner());
            guard.iter().map(|(n, c)| (n.clone(), c.get())).collect()
        };
        counters.sort();
        for (name, value) in counters {
            output.push_str(&format!("# TYPE {name} counter\n{name} {value}\n"));
        }

        let mut gauges: Vec<_> = {
            let guard = self.gauges.read().unwrap_or_else(|e| e.into_inner());
            guard.iter().map(|(n, g)| (n.clone(), g.get())).collect()
        };
        gauges.sort();
        for (name, value) in gauges {
            output.push_str(&format!("# TYPE {name} gauge\n{name} {value}\n"));
        }

        let mut labeled: Vec<_> = {
            let guard = self
                .labeled_counters
                .read()
                .unwrap_or_else(|e| e.into_inner());
            guard.iter().map(|(n, c)| (n.clone(), c.clone())).collect()
        };
        labeled.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, lc) in labeled {
            output.push_str(&format!("# TYPE {name} counter\n"));
            let mut series = lc.entries();
            series.sort();
            for (labels, value) in series {
                let label_str = format_labels(&labels);
                output.push_str(&format!("{name}{label_str} {value}\n"));
            }
        }

        output
    }
}
