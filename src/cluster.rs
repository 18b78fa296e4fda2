//! A group of [`Item`]s considered interchangeable for release, together
//! with the per-attribute [`Range`] envelopes that bound the information
//! loss of generalizing them.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use crate::item::{Item, RawRecord};
use crate::range::Range;

/// Non-owning handle into the engine's cluster arena. Clusters are owned by
/// `Castle`'s Γ/Ω maps; `Item::cluster_id` is a lookup key into those maps,
/// never an ownership edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(pub(crate) u64);

/// A single quasi-identifier field in a generalized output record: the
/// cluster's current envelope for that header, plus the tuple's own
/// specific value (kept for traceability, mirroring the
/// `min<H>`/`spc<H>`/`max<H>` triple the reference CSV output uses).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeneralizedField {
    pub lower: f64,
    pub upper: f64,
    pub specific: f64,
}

/// A released record: quasi-identifier fields replaced by their cluster's
/// range envelope, everything else passed through.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneralizedRecord<P, Sv, Payload = ()> {
    pub pid: P,
    pub sensitive: Sv,
    pub quasi: HashMap<String, GeneralizedField>,
    pub payload: Payload,
}

pub(crate) struct Cluster<P, Sv, Payload = ()> {
    pub contents: Vec<Item<P, Sv, Payload>>,
    pub ranges: HashMap<String, Range>,
}

impl<P, Sv, Payload> Cluster<P, Sv, Payload>
where
    P: Clone + Eq + Hash + Debug,
    Sv: Clone + Eq + Hash + Debug,
{
    pub fn new(headers: &[String]) -> Self {
        let ranges = headers.iter().cloned().map(|h| (h, Range::new())).collect();
        Self {
            contents: Vec::new(),
            ranges,
        }
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Distinct sensitive values present in `contents`.
    pub fn diversity(&self) -> HashSet<Sv> {
        self.contents
            .iter()
            .map(|t| t.record.sensitive.clone())
            .collect()
    }

    /// Appends `item` to `contents`, sets its cluster back-reference (done
    /// by the caller, which owns the arena and therefore the `ClusterId`),
    /// and widens every range to cover the item's values.
    pub fn insert(&mut self, item: Item<P, Sv, Payload>) {
        for (header, range) in self.ranges.iter_mut() {
            if let Some(v) = item.record.quasi.get(header) {
                range.update(*v);
            }
        }
        self.contents.push(item);
    }

    /// Removes the item with the given index from `contents`. Ranges are
    /// *not* shrunk: a cluster's envelope is monotone for its whole active
    /// lifetime (spec invariant, matches the published algorithm).
    pub fn remove_at(&mut self, index: usize) -> Item<P, Sv, Payload> {
        self.contents.remove(index)
    }

    pub fn position_of_id(&self, id: u64) -> Option<usize> {
        self.contents.iter().position(|t| t.id == id)
    }

    pub fn position_of_pid(&self, pid: &P) -> Option<usize>
    where
        P: PartialEq,
    {
        self.contents.iter().position(|t| &t.record.pid == pid)
    }

    pub fn information_loss(&self, global_ranges: &HashMap<String, Range>) -> f64 {
        self.ranges
            .iter()
            .map(|(header, range)| range.normalized(&global_ranges[header]))
            .sum()
    }

    /// Information loss if `t` were (hypothetically) inserted into this
    /// cluster, without mutating it.
    pub fn information_loss_given_t(
        &self,
        t: &Item<P, Sv, Payload>,
        global_ranges: &HashMap<String, Range>,
    ) -> f64 {
        self.ranges
            .iter()
            .map(|(header, range)| {
                let extended = match t.record.quasi.get(header) {
                    Some(v) => range.extended(*v),
                    None => *range,
                };
                extended.normalized(&global_ranges[header])
            })
            .sum()
    }

    /// Information loss if `other` were (hypothetically) merged into this
    /// cluster, without mutating either.
    pub fn information_loss_given_c(
        &self,
        other: &Self,
        global_ranges: &HashMap<String, Range>,
    ) -> f64 {
        self.ranges
            .iter()
            .map(|(header, range)| {
                let merged = range.merged(&other.ranges[header]);
                merged.normalized(&global_ranges[header])
            })
            .sum()
    }

    pub fn tuple_enlargement(
        &self,
        t: &Item<P, Sv, Payload>,
        global_ranges: &HashMap<String, Range>,
    ) -> f64 {
        let delta = self.information_loss_given_t(t, global_ranges) - self.information_loss(global_ranges);
        delta / self.ranges.len().max(1) as f64
    }

    pub fn cluster_enlargement(
        &self,
        other: &Self,
        global_ranges: &HashMap<String, Range>,
    ) -> f64 {
        let delta =
            self.information_loss_given_c(other, global_ranges) - self.information_loss(global_ranges);
        delta / self.ranges.len().max(1) as f64
    }

    /// Euclidean distance from `t`'s quasi-identifier values to this
    /// cluster's envelope midpoints. Used by `split`/`split_l` to scatter
    /// leftover tuples into the nearest freshly created subcluster.
    pub fn distance_to(&self, t: &Item<P, Sv, Payload>) -> f64 {
        let sum_sq: f64 = self
            .ranges
            .iter()
            .map(|(header, range)| {
                let v = t.record.quasi.get(header).copied().unwrap_or(0.0);
                (range.midpoint() - v).powi(2)
            })
            .sum();
        (sum_sq / self.ranges.len().max(1) as f64).sqrt()
    }

    /// True iff every quasi-identifier of `t` falls within this cluster's
    /// current envelope.
    pub fn within_bounds(&self, t: &Item<P, Sv, Payload>) -> bool {
        self.ranges.iter().all(|(header, range)| {
            t.record
                .quasi
                .get(header)
                .is_some_and(|v| range.contains(*v))
        })
    }

    /// Produces a generalized output record for `t`: quasi fields replaced
    /// by this cluster's range envelope, non-quasi fields passed through.
    pub fn generalise(&self, t: &Item<P, Sv, Payload>) -> GeneralizedRecord<P, Sv, Payload>
    where
        Payload: Clone,
    {
        let quasi = self
            .ranges
            .iter()
            .map(|(header, range)| {
                let specific = t.record.quasi.get(header).copied().unwrap_or(0.0);
                (
                    header.clone(),
                    GeneralizedField {
                        lower: range.lower.unwrap_or(specific),
                        upper: range.upper.unwrap_or(specific),
                        specific,
                    },
                )
            })
            .collect();

        GeneralizedRecord {
            pid: t.record.pid.clone(),
            sensitive: t.record.sensitive.clone(),
            quasi,
            payload: t.record.payload.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        vec!["age".to_string(), "gpa".to_string()]
    }

    fn item(pid: u32, age: f64, gpa: f64, sensitive: &'static str) -> Item<u32, &'static str> {
        let mut quasi = HashMap::new();
        quasi.insert("age".to_string(), age);
        quasi.insert("gpa".to_string(), gpa);
        Item::new(pid as u64, RawRecord::new(pid, sensitive, quasi, ()))
    }

    fn global_ranges() -> HashMap<String, Range> {
        let mut g = HashMap::new();
        let mut age = Range::new();
        age.update(0.0);
        age.update(100.0);
        let mut gpa = Range::new();
        gpa.update(0.0);
        gpa.update(4.0);
        g.insert("age".to_string(), age);
        g.insert("gpa".to_string(), gpa);
        g
    }

    #[test]
    fn insert_widens_ranges_and_never_shrinks_on_remove() {
        let mut c = Cluster::new(&headers());
        c.insert(item(1, 20.0, 3.0, "a"));
        c.insert(item(2, 40.0, 2.0, "b"));
        assert_eq!(c.ranges["age"].lower, Some(20.0));
        assert_eq!(c.ranges["age"].upper, Some(40.0));

        c.remove_at(0);
        // envelope does not shrink after removing the tuple that set lower
        assert_eq!(c.ranges["age"].lower, Some(20.0));
    }

    #[test]
    fn diversity_counts_distinct_sensitive_values() {
        let mut c = Cluster::new(&headers());
        c.insert(item(1, 10.0, 1.0, "flu"));
        c.insert(item(2, 20.0, 2.0, "flu"));
        c.insert(item(3, 30.0, 3.0, "cold"));
        assert_eq!(c.diversity().len(), 2);
    }

    #[test]
    fn information_loss_given_t_never_decreases_loss() {
        let mut c = Cluster::new(&headers());
        c.insert(item(1, 20.0, 2.0, "a"));
        let g = global_ranges();
        let before = c.information_loss(&g);
        let t = item(2, 90.0, 1.0, "b");
        let after = c.information_loss_given_t(&t, &g);
        assert!(after >= before);
    }

    #[test]
    fn within_bounds_respects_envelope() {
        let mut c = Cluster::new(&headers());
        c.insert(item(1, 20.0, 2.0, "a"));
        c.insert(item(2, 40.0, 3.0, "b"));
        let inside = item(3, 30.0, 2.5, "c");
        let outside = item(4, 90.0, 2.5, "c");
        assert!(c.within_bounds(&inside));
        assert!(!c.within_bounds(&outside));
    }

    #[test]
    fn generalise_covers_original_value() {
        let mut c = Cluster::new(&headers());
        c.insert(item(1, 20.0, 2.0, "a"));
        c.insert(item(2, 40.0, 3.0, "b"));
        let t = item(1, 20.0, 2.0, "a");
        let gen = c.generalise(&t);
        let age = &gen.quasi["age"];
        assert!(age.lower <= age.specific && age.specific <= age.upper);
    }
}
