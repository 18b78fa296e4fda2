//! A single stream record, before and after it has been admitted into the
//! engine.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::cluster::ClusterId;

/// A record as it arrives from upstream: a person id, a sensitive value,
/// a map of quasi-identifier values, and an opaque passthrough payload for
/// any non-quasi columns the caller wants to carry through to the sink
/// untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord<P, Sv, Payload = ()> {
    pub pid: P,
    pub sensitive: Sv,
    pub quasi: HashMap<String, f64>,
    pub payload: Payload,
}

impl<P, Sv, Payload> RawRecord<P, Sv, Payload> {
    pub fn new(pid: P, sensitive: Sv, quasi: HashMap<String, f64>, payload: Payload) -> Self {
        Self {
            pid,
            sensitive,
            quasi,
            payload,
        }
    }
}

/// `RawRecord` plus the engine's bookkeeping: a unique id stable for the
/// item's whole active lifetime, and a non-owning handle to the cluster
/// currently holding it. The cluster owns the `Item` by value; `cluster_id`
/// is a lookup key only, never an ownership edge (see the arena note in the
/// crate's design notes). `id` is what lets the engine's global queue refer
/// to a tuple without holding a second copy of it.
#[derive(Clone, Debug)]
pub(crate) struct Item<P, Sv, Payload = ()> {
    pub id: u64,
    pub record: RawRecord<P, Sv, Payload>,
    pub cluster_id: Option<ClusterId>,
}

impl<P, Sv, Payload> Item<P, Sv, Payload>
where
    P: Clone + Eq + Hash + Debug,
    Sv: Clone + Eq + Hash + Debug,
{
    pub fn new(id: u64, record: RawRecord<P, Sv, Payload>) -> Self {
        Self {
            id,
            record,
            cluster_id: None,
        }
    }

    pub fn value(&self, header: &str) -> Option<f64> {
        self.record.quasi.get(header).copied()
    }

    /// Euclidean distance between this item and `other` over the given
    /// quasi-identifier headers.
    pub fn distance(&self, other: &Self, headers: &[String]) -> f64 {
        let sum_sq: f64 = headers
            .iter()
            .map(|h| {
                let a = self.value(h).unwrap_or(0.0);
                let b = other.value(h).unwrap_or(0.0);
                (a - b).powi(2)
            })
            .sum();
        (sum_sq / headers.len().max(1) as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pid: u32, val: f64) -> RawRecord<u32, &'static str> {
        let mut quasi = HashMap::new();
        quasi.insert("age".to_string(), val);
        RawRecord::new(pid, "flu", quasi, ())
    }

    #[test]
    fn distance_is_zero_for_identical_items() {
        let a = Item::new(1, record(1, 30.0));
        let b = Item::new(2, record(2, 30.0));
        let headers = vec!["age".to_string()];
        assert_eq!(a.distance(&b, &headers), 0.0);
    }

    #[test]
    fn distance_reflects_value_gap() {
        let a = Item::new(1, record(1, 10.0));
        let b = Item::new(2, record(2, 20.0));
        let headers = vec!["age".to_string()];
        assert_eq!(a.distance(&b, &headers), 10.0);
    }

    #[test]
    fn fresh_item_has_no_parent() {
        let item = Item::new(1, record(1, 10.0));
        assert!(item.cluster_id.is_none());
    }
}
