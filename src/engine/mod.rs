//! The CASTLE engine (spec §4): the Γ/Ω cluster arena, the global tuple
//! queue, and the admission path that ties the rest of the crate together.
//!
//! Submodules hold the heavier pieces of the algorithm so this file stays
//! readable: [`selection`] picks a cluster for an incoming tuple and keeps
//! τ current, [`delay`] implements the delay-bounded release decision, and
//! [`split`] implements the two cluster-splitting strategies.

mod delay;
mod selection;
mod split;

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;

use indexmap::IndexMap;
use log::{debug, trace};
use rand::Rng;

use crate::cluster::{Cluster, ClusterId, GeneralizedRecord};
use crate::dp;
use crate::error::{ConfigError, RecordError};
use crate::item::{Item, RawRecord};
use crate::params::Parameters;
use crate::range::Range;

pub(crate) use split::split;

/// What happened to a tuple handed to [`Castle::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Dropped by the differential-privacy retention gate before any state
    /// was touched.
    Dropped,
    /// Admitted into Γ (possibly triggering a release cycle downstream).
    Admitted,
}

/// The streaming (k,l)-anonymity clustering engine.
///
/// `P` is the person/record id type, `Sv` the sensitive attribute type, and
/// `Payload` whatever non-quasi data the caller wants carried through to
/// released records untouched. `R` is the source of randomness driving
/// cluster-selection ties, τ sampling, DP perturbation and splitting –
/// generic the same way `NexmarkGenerator<R: Rng>` is, so callers can wire
/// in a seeded RNG for reproducible runs and `rand::thread_rng()` otherwise.
pub struct Castle<P, Sv, Payload, R> {
    pub(crate) headers: Vec<String>,
    pub(crate) sensitive_attr: String,
    pub(crate) params: Parameters,
    pub(crate) rng: R,
    sink: Box<dyn FnMut(GeneralizedRecord<P, Sv, Payload>)>,

    next_item_id: u64,
    next_cluster_id: u64,

    pub(crate) big_gamma: IndexMap<ClusterId, Cluster<P, Sv, Payload>>,
    pub(crate) big_omega: IndexMap<ClusterId, Cluster<P, Sv, Payload>>,
    pub(crate) item_location: HashMap<u64, ClusterId>,
    pub(crate) global_tuples: VecDeque<u64>,

    pub(crate) global_ranges: HashMap<String, Range>,
    pub(crate) sensitive_values_seen: HashSet<Sv>,
    pub(crate) recent_losses: VecDeque<f64>,
    pub(crate) tau: f64,

    pub(crate) history: Vec<RawRecord<P, Sv, Payload>>,
}

impl<P, Sv, Payload, R> Castle<P, Sv, Payload, R>
where
    P: Clone + Eq + Hash + Debug,
    Sv: Clone + Eq + Hash + Debug,
    R: Rng,
{
    /// Builds a new engine. `sink` receives every generalized record the
    /// algorithm releases, in release order. Fails fast on an inconsistent
    /// configuration (see [`Parameters::validate`]) rather than letting a
    /// bad run silently misbehave downstream.
    pub fn new(
        headers: Vec<String>,
        sensitive_attr: impl Into<String>,
        params: Parameters,
        rng: R,
        sink: impl FnMut(GeneralizedRecord<P, Sv, Payload>) + 'static,
    ) -> Result<Self, ConfigError> {
        let sensitive_attr = sensitive_attr.into();
        params.validate(&headers, &sensitive_attr)?;

        let global_ranges = headers.iter().cloned().map(|h| (h, Range::new())).collect();

        Ok(Self {
            headers,
            sensitive_attr,
            params,
            rng,
            sink: Box::new(sink),
            next_item_id: 0,
            next_cluster_id: 0,
            big_gamma: IndexMap::new(),
            big_omega: IndexMap::new(),
            item_location: HashMap::new(),
            global_tuples: VecDeque::new(),
            global_ranges,
            sensitive_values_seen: HashSet::new(),
            recent_losses: VecDeque::new(),
            tau: f64::INFINITY,
            history: Vec::new(),
        })
    }

    /// Number of active clusters in Γ.
    pub fn active_cluster_count(&self) -> usize {
        self.big_gamma.len()
    }

    /// Number of retired clusters still sheltering in Ω.
    pub fn retired_cluster_count(&self) -> usize {
        self.big_omega.len()
    }

    /// Number of tuples currently sitting in the global queue, awaiting a
    /// release decision.
    pub fn pending_count(&self) -> usize {
        self.global_tuples.len()
    }

    /// Sum of `|c.contents|` over every cluster in Γ. Always equal to
    /// [`Castle::pending_count`] (spec §3, invariant I1); exposed so callers
    /// and property tests can check that equality from outside the crate.
    pub fn active_tuple_count(&self) -> usize {
        self.big_gamma.values().map(Cluster::len).sum()
    }

    /// Current value of the adaptive information-loss threshold τ.
    pub fn tau(&self) -> f64 {
        self.tau
    }

    /// The global envelope observed so far for `header`, or `None` if
    /// `header` was never configured. Monotonically widens over the life of
    /// the engine (spec §8, P6) and never shrinks.
    pub fn global_range(&self, header: &str) -> Option<Range> {
        self.global_ranges.get(header).copied()
    }

    /// Every released original, if `Parameters::history` was set.
    pub fn history(&self) -> &[RawRecord<P, Sv, Payload>] {
        &self.history
    }

    fn mint_item_id(&mut self) -> u64 {
        let id = self.next_item_id;
        self.next_item_id += 1;
        id
    }

    fn mint_cluster_id(&mut self) -> ClusterId {
        let id = ClusterId(self.next_cluster_id);
        self.next_cluster_id += 1;
        id
    }

    fn new_empty_cluster(&mut self) -> ClusterId {
        let id = self.mint_cluster_id();
        self.big_gamma.insert(id, Cluster::new(&self.headers));
        id
    }

    /// Widens the global per-header ranges and the set of sensitive values
    /// observed, from a tuple that has just arrived (spec §4.2,
    /// `update_global_ranges`).
    fn update_global_ranges(&mut self, record: &RawRecord<P, Sv, Payload>) {
        for (header, range) in self.global_ranges.iter_mut() {
            if let Some(v) = record.quasi.get(header) {
                range.update(*v);
            }
        }
        self.sensitive_values_seen.insert(record.sensitive.clone());
    }

    /// Moves `item` into `cluster_id`, updating its back-reference and the
    /// arena's reverse index. Does not touch the global queue: callers
    /// decide separately whether the item is new or being reparented.
    fn place_item(&mut self, cluster_id: ClusterId, mut item: Item<P, Sv, Payload>) {
        item.cluster_id = Some(cluster_id);
        self.item_location.insert(item.id, cluster_id);
        self.big_gamma
            .get_mut(&cluster_id)
            .expect("place_item called with an inactive cluster id")
            .insert(item);
    }

    /// Removes an item from the global queue and from whichever cluster
    /// currently holds it, without touching the cluster's membership in Γ
    /// even if this empties it. Used mid-release, where the cluster as a
    /// whole is about to be retired regardless of momentarily being empty.
    fn detach_item(&mut self, item_id: u64) -> Item<P, Sv, Payload> {
        if let Some(pos) = self.global_tuples.iter().position(|&id| id == item_id) {
            self.global_tuples.remove(pos);
        }
        let cluster_id = self
            .item_location
            .remove(&item_id)
            .expect("detach_item called on an item with no known parent");
        let cluster = self
            .big_gamma
            .get_mut(&cluster_id)
            .expect("detach_item's parent cluster must still be active");
        let idx = cluster
            .position_of_id(item_id)
            .expect("detach_item's item must be present in its recorded parent");
        cluster.remove_at(idx)
    }

    /// Removes a tuple that will never be released: detaches it, then drops
    /// its parent cluster from Γ if that emptied it (spec §4.5).
    fn suppress_tuple(&mut self, item_id: u64) {
        let cluster_id = *self
            .item_location
            .get(&item_id)
            .expect("suppress_tuple called on an item with no known parent");
        self.detach_item(item_id);
        if self
            .big_gamma
            .get(&cluster_id)
            .is_some_and(Cluster::is_empty)
        {
            self.big_gamma.shift_remove(&cluster_id);
        }
    }

    fn parent_cluster_id(&self, item_id: u64) -> ClusterId {
        *self
            .item_location
            .get(&item_id)
            .expect("item must have an active parent while it is in the global queue")
    }

    fn item_ref(&self, item_id: u64) -> &Item<P, Sv, Payload> {
        let cluster_id = self.parent_cluster_id(item_id);
        self.big_gamma[&cluster_id]
            .contents
            .iter()
            .find(|it| it.id == item_id)
            .expect("item must be present in the cluster item_location points at")
    }

    /// Admits one record into the engine (spec §4.4): the DP retention
    /// gate, global range/perturbation bookkeeping, cluster selection, and
    /// (if the queue has grown past δ) a release cycle.
    pub fn insert(
        &mut self,
        record: RawRecord<P, Sv, Payload>,
    ) -> Result<InsertOutcome, RecordError>
    where
        Payload: Clone,
    {
        for header in &self.headers {
            if !record.quasi.contains_key(header) {
                return Err(RecordError::MissingField(header.clone()));
            }
        }

        if self.params.dp && !dp::should_retain(&mut self.rng, self.params.beta_big) {
            trace!("dropped incoming tuple under the DP retention gate");
            return Ok(InsertOutcome::Dropped);
        }

        let mut record = record;
        self.update_global_ranges(&record);

        if self.params.dp {
            dp::perturb(
                &mut self.rng,
                &mut record.quasi,
                &self.global_ranges,
                self.params.phi,
            );
        }

        let id = self.mint_item_id();
        let item = Item::new(id, record);

        let cluster_id = match self.best_selection(&item) {
            Some(id) => id,
            None => self.new_empty_cluster(),
        };
        self.place_item(cluster_id, item);
        self.global_tuples.push_back(id);
        debug!(
            "admitted tuple {id} into cluster {cluster_id:?} (|Γ|={})",
            self.big_gamma.len()
        );

        if self.global_tuples.len() > self.params.delta {
            self.cycle();
        }
        self.update_tau();

        Ok(InsertOutcome::Admitted)
    }

    /// Runs the delay constraint on the oldest queued tuple (spec §4.4,
    /// the "cycle" step that fires once the queue outgrows δ).
    fn cycle(&mut self)
    where
        Payload: Clone,
    {
        if let Some(&oldest) = self.global_tuples.front() {
            self.delay_constraint(oldest);
        }
    }
}
