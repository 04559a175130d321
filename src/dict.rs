//! Reference-counted string interning
//!
//! The context owns a single dictionary; every name and lexical value held
//! by schema or data structures is an `Arc<str>` handed out by it. The
//! dictionary keeps a use count per entry so that a string inserted from
//! several places survives until the last user releases it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Deduplicating string store
#[derive(Debug, Default)]
pub struct Dict {
    entries: Mutex<HashMap<Arc<str>, usize>>,
}

impl Dict {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, bumping its use count
    pub fn insert(&self, s: &str) -> Arc<str> {
        let mut entries = self.entries.lock().unwrap();
        if let Some((key, count)) = entries.get_key_value(s) {
            let key = Arc::clone(key);
            let count = count + 1;
            entries.insert(Arc::clone(&key), count);
            return key;
        }
        let key: Arc<str> = Arc::from(s);
        entries.insert(Arc::clone(&key), 1);
        key
    }

    /// Intern an owned string without copying when it is new
    pub fn insert_owned(&self, s: String) -> Arc<str> {
        let mut entries = self.entries.lock().unwrap();
        if let Some((key, count)) = entries.get_key_value(s.as_str()) {
            let key = Arc::clone(key);
            let count = count + 1;
            entries.insert(Arc::clone(&key), count);
            return key;
        }
        let key: Arc<str> = Arc::from(s);
        entries.insert(Arc::clone(&key), 1);
        key
    }

    /// Release one use of a string, dropping the entry at zero
    pub fn remove(&self, s: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some((key, count)) = entries.get_key_value(s) {
            if *count <= 1 {
                let key = Arc::clone(key);
                entries.remove(&*key);
            } else {
                let key = Arc::clone(key);
                let count = count - 1;
                entries.insert(key, count);
            }
        }
    }

    /// Current use count of a string, zero when absent
    pub fn refcount(&self, s: &str) -> usize {
        self.entries.lock().unwrap().get(s).copied().unwrap_or(0)
    }

    /// Number of distinct entries
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// True when the dictionary holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_deduplicates() {
        let dict = Dict::new();
        let a = dict.insert("interface");
        let b = dict.insert("interface");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.refcount("interface"), 2);
    }

    #[test]
    fn test_remove_counts_down() {
        let dict = Dict::new();
        dict.insert("mtu");
        dict.insert("mtu");
        dict.remove("mtu");
        assert_eq!(dict.refcount("mtu"), 1);
        dict.remove("mtu");
        assert_eq!(dict.refcount("mtu"), 0);
        assert!(dict.is_empty());
    }

    #[test]
    fn test_insert_owned() {
        let dict = Dict::new();
        let a = dict.insert_owned(String::from("address"));
        let b = dict.insert("address");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
