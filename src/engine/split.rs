//! Cluster splitting (spec §4.6): `split_l`, wired into `output_cluster` to
//! keep large releases from over-generalizing, and `split`, the
//! diversity-agnostic variant the published algorithm also defines but
//! never actually calls from the release path. Kept here as a building
//! block and exercised directly by its own tests.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::cluster::{Cluster, ClusterId};
use crate::item::Item;
use crate::range::Range;

use super::Castle;

impl<P, Sv, Payload, R> Castle<P, Sv, Payload, R>
where
    P: Clone + Eq + Hash + Debug,
    Sv: Clone + Eq + Hash + Debug,
    R: Rng,
{
    /// `split_l` (spec §4.6): buckets a cluster's contents by sensitive
    /// value, seeds a new subcluster from a random bucket, and rounds it
    /// out with the least-enlarging tuples from the other buckets, so each
    /// subcluster keeps roughly the same mix of sensitive values as the
    /// whole. Leftovers that can't form another full bucket are scattered
    /// to the nearest subcluster by envelope distance, then any tuples
    /// sharing a pid are reunited into a single subcluster.
    ///
    /// Returns the ids of the resulting subclusters, already registered in
    /// Γ. If there aren't enough distinct sensitive values to split at all,
    /// returns `[cluster_id]` unchanged.
    pub(crate) fn split_l(&mut self, cluster_id: ClusterId) -> Vec<ClusterId> {
        let bucket_count = self.big_gamma[&cluster_id].diversity().len();
        if bucket_count < self.params.l {
            return vec![cluster_id];
        }

        let mut original = self
            .big_gamma
            .shift_remove(&cluster_id)
            .expect("split_l called with an inactive cluster id");
        let mut buckets: HashMap<Sv, Vec<Item<P, Sv, Payload>>> = HashMap::new();
        for item in original.contents.drain(..) {
            buckets
                .entry(item.record.sensitive.clone())
                .or_default()
                .push(item);
        }

        let mut sc_ids: Vec<ClusterId> = Vec::new();

        while buckets.len() >= self.params.l
            && buckets.values().map(Vec::len).sum::<usize>() >= self.params.k
        {
            let seed_key = buckets
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .choose(&mut self.rng)
                .expect("buckets is non-empty by the loop guard")
                .clone();
            let seed_bucket = buckets.get_mut(&seed_key).expect("seed_key was just drawn from buckets");
            let seed_idx = self.rng.gen_range(0..seed_bucket.len());
            let seed_item = seed_bucket.remove(seed_idx);
            if seed_bucket.is_empty() {
                buckets.remove(&seed_key);
            }

            let mut cnew = Cluster::new(&self.headers);
            cnew.insert(seed_item);

            let remaining_keys: Vec<Sv> = buckets.keys().cloned().collect();
            for key in remaining_keys {
                // N is recomputed per bucket (castle.py's `total_tuples`),
                // not frozen at the start of the pass: earlier buckets in
                // this same pass have already drained by the time a later
                // one is considered.
                let total_remaining: usize = buckets.values().map(Vec::len).sum();
                let bucket = buckets
                    .get_mut(&key)
                    .expect("key was just collected from buckets");
                bucket.sort_by(|a, b| {
                    let ea = original.tuple_enlargement(a, &self.global_ranges);
                    let eb = original.tuple_enlargement(b, &self.global_ranges);
                    ea.partial_cmp(&eb).unwrap()
                });
                let share = (self.params.k as f64) * (bucket.len() as f64)
                    / (total_remaining.max(1) as f64);
                let take = (share.max(1.0) as usize).min(bucket.len());
                for item in bucket.drain(..take) {
                    cnew.insert(item);
                }
                if bucket.is_empty() {
                    buckets.remove(&key);
                }
            }

            let new_id = self.mint_cluster_id();
            for item in &cnew.contents {
                self.item_location.insert(item.id, new_id);
            }
            self.big_gamma.insert(new_id, cnew);
            sc_ids.push(new_id);
        }

        // leftovers: not enough left to form another bucket of size >= l
        // or >= k. scatter them to whichever subcluster they'd enlarge
        // least, measured against the now-frozen envelope of `original`.
        for (_, bucket) in buckets {
            for item in bucket {
                let nearest = sc_ids
                    .iter()
                    .copied()
                    .min_by(|&a, &b| {
                        let da = self.big_gamma[&a].distance_to(&item);
                        let db = self.big_gamma[&b].distance_to(&item);
                        da.partial_cmp(&db).unwrap()
                    })
                    .expect("split_l produces at least one subcluster before scattering leftovers");
                self.reparent_item(nearest, item);
            }
        }

        // pid integrity: a person's tuples should not end up scattered
        // across multiple still-active subclusters just because they
        // happened to land in different sensitive-value buckets.
        let sc_ids_snapshot = sc_ids.clone();
        for &home in &sc_ids_snapshot {
            let pids: Vec<P> = self.big_gamma[&home]
                .contents
                .iter()
                .map(|it| it.record.pid.clone())
                .collect();
            for pid in pids {
                for &other in &sc_ids_snapshot {
                    if other == home {
                        continue;
                    }
                    while let Some(idx) = self.big_gamma[&other]
                        .contents
                        .iter()
                        .position(|it| it.record.pid == pid)
                    {
                        let item = self.big_gamma.get_mut(&other).unwrap().remove_at(idx);
                        self.reparent_item(home, item);
                    }
                }
            }
        }

        sc_ids
    }
}

/// `split` (spec §4.6): the diversity-agnostic sibling of `split_l`. Buckets
/// a cluster's contents by pid instead of sensitive value, seeds each new
/// subcluster the same way, and fills it with the closest representative
/// from every other still-open bucket. The published algorithm defines
/// this but never calls it from the release path (only `split_l` is
/// diversity-aware enough to preserve l-diversity on output) — kept here as
/// a tested, reusable building block.
pub(crate) fn split<P, Sv, Payload, R>(
    headers: &[String],
    k: usize,
    global_ranges: &HashMap<String, Range>,
    mut cluster: Cluster<P, Sv, Payload>,
    rng: &mut R,
) -> Vec<Cluster<P, Sv, Payload>>
where
    P: Clone + Eq + Hash + Debug,
    Sv: Clone + Eq + Hash + Debug,
    R: Rng,
{
    let mut buckets: HashMap<P, Vec<Item<P, Sv, Payload>>> = HashMap::new();
    for item in cluster.contents.drain(..) {
        buckets.entry(item.record.pid.clone()).or_default().push(item);
    }

    let mut sc: Vec<Cluster<P, Sv, Payload>> = Vec::new();

    while buckets.len() >= k {
        let seed_pid = buckets
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .choose(rng)
            .expect("buckets is non-empty by the loop guard")
            .clone();
        let seed_bucket = buckets.get_mut(&seed_pid).expect("seed_pid was just drawn from buckets");
        let seed_idx = rng.gen_range(0..seed_bucket.len());
        let seed_item = seed_bucket.remove(seed_idx);
        if seed_bucket.is_empty() {
            buckets.remove(&seed_pid);
        }

        let mut cnew = Cluster::new(headers);

        let mut candidate_ids: Vec<u64> = Vec::new();
        for (pid, bucket) in buckets.iter() {
            if *pid == seed_pid || bucket.is_empty() {
                continue;
            }
            let idx = rng.gen_range(0..bucket.len());
            candidate_ids.push(bucket[idx].id);
        }
        candidate_ids.sort_by(|&a, &b| {
            let da = find_item_by_id(&buckets, a).distance(&seed_item, headers);
            let db = find_item_by_id(&buckets, b).distance(&seed_item, headers);
            da.partial_cmp(&db).unwrap()
        });

        cnew.insert(seed_item);
        for id in candidate_ids {
            let owner = buckets
                .iter()
                .find(|(_, bucket)| bucket.iter().any(|it| it.id == id))
                .map(|(pid, _)| pid.clone());
            if let Some(pid) = owner {
                let bucket = buckets.get_mut(&pid).expect("owner was just located in buckets");
                let idx = bucket
                    .iter()
                    .position(|it| it.id == id)
                    .expect("id was just confirmed present in this bucket");
                let item = bucket.remove(idx);
                if bucket.is_empty() {
                    buckets.remove(&pid);
                }
                cnew.insert(item);
            }
        }

        sc.push(cnew);
    }

    // leftover buckets: too few distinct pids remain to seed another
    // subcluster. each whole bucket moves together to whichever subcluster
    // its first tuple would enlarge least.
    for (_, bucket) in buckets {
        if bucket.is_empty() {
            continue;
        }
        let representative = &bucket[0];
        let nearest = (0..sc.len())
            .min_by(|&a, &b| {
                let ea = sc[a].tuple_enlargement(representative, global_ranges);
                let eb = sc[b].tuple_enlargement(representative, global_ranges);
                ea.partial_cmp(&eb).unwrap()
            })
            .expect("split only reaches the leftover pass once sc is non-empty");
        for item in bucket {
            sc[nearest].insert(item);
        }
    }

    sc
}

fn find_item_by_id<'a, P, Sv, Payload>(
    buckets: &'a HashMap<P, Vec<Item<P, Sv, Payload>>>,
    id: u64,
) -> &'a Item<P, Sv, Payload> {
    buckets
        .values()
        .flat_map(|bucket| bucket.iter())
        .find(|it| it.id == id)
        .expect("candidate id must still be present in some bucket")
}
