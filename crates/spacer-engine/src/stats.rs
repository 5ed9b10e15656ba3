//! Named counters and timers.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

/// String key to numeric value, in insertion order. Updating an existing key
/// accumulates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    values: IndexMap<String, f64>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, key: &str, value: impl Into<f64>) {
        *self.values.entry(key.to_string()).or_insert(0.0) += value.into();
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Accumulating timer.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    total: Rc<Cell<Duration>>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing; the elapsed time is added when the guard drops.
    pub fn scoped(&self) -> ScopedWatch {
        ScopedWatch {
            total: Rc::clone(&self.total),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.total.get()
    }

    pub fn seconds(&self) -> f64 {
        self.total.get().as_secs_f64()
    }
}

/// RAII guard returned by [`Stopwatch::scoped`].
#[must_use = "the watch stops as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopedWatch {
    total: Rc<Cell<Duration>>,
    start: Instant,
}

impl Drop for ScopedWatch {
    fn drop(&mut self) {
        self.total.set(self.total.get() + self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_accumulate_in_insertion_order() {
        let mut st = Statistics::new();
        st.update("b", 1u32);
        st.update("a", 2u32);
        st.update("b", 3u32);
        let keys: Vec<_> = st.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(st.get("b"), Some(4.0));
        assert_eq!(st.get("missing"), None);
    }

    #[test]
    fn scoped_watch_records_on_early_exit() {
        let watch = Stopwatch::new();
        let run = |fail: bool| -> Result<(), ()> {
            let _w = watch.scoped();
            std::thread::sleep(Duration::from_millis(2));
            if fail {
                return Err(());
            }
            Ok(())
        };
        let _ = run(true);
        assert!(watch.elapsed() >= Duration::from_millis(2));
    }
}
