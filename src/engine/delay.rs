//! The delay-bounded release decision (spec §4.5): `delay_constraint`,
//! `output_cluster`, `merge_clusters`, and the plain suppression path.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::cluster::ClusterId;
use crate::item::Item;

use super::Castle;

impl<P, Sv, Payload, R> Castle<P, Sv, Payload, R>
where
    P: Clone + Eq + Hash + Debug,
    Sv: Clone + Eq + Hash + Debug,
    Payload: Clone,
    R: Rng,
{
    /// `delay_constraint` (spec §4.5): the five-way decision made on the
    /// oldest queued tuple once the queue has grown past δ.
    pub(crate) fn delay_constraint(&mut self, item_id: u64) {
        let parent_id = self.parent_cluster_id(item_id);

        let (parent_len, parent_diversity) = {
            let parent = &self.big_gamma[&parent_id];
            (parent.len(), parent.diversity().len())
        };

        // 1. the tuple's own cluster already satisfies k-anonymity and
        //    l-diversity: release it (and whatever else is ready) now.
        if parent_len >= self.params.k && parent_diversity > self.params.l {
            self.output_cluster(parent_id);
            return;
        }

        // 2. a retired cluster in Ω still shelters this tuple's values:
        //    generalize against that envelope instead of waiting further.
        let sheltering: Vec<ClusterId> = self
            .big_omega
            .iter()
            .filter(|(_, c)| c.within_bounds(self.item_ref(item_id)))
            .map(|(id, _)| *id)
            .collect();
        if !sheltering.is_empty() {
            let chosen = *sheltering
                .choose(&mut self.rng)
                .expect("sheltering is non-empty by the branch guard");
            let generalized = {
                let omega_cluster = &self.big_omega[&chosen];
                omega_cluster.generalise(self.item_ref(item_id))
            };
            if self.params.history {
                self.history.push(self.item_ref(item_id).record.clone());
            }
            self.detach_item(item_id);
            debug!("sheltered tuple {item_id} against retired cluster {chosen:?}");
            self.emit(generalized);
            return;
        }

        // 3. most active clusters are already bigger than this tuple's
        //    parent: releasing it now would cost more information than
        //    waiting, so give up on it.
        let bigger_clusters = self
            .big_gamma
            .values()
            .filter(|c| parent_len < c.len())
            .count();
        if bigger_clusters > self.big_gamma.len() / 2 {
            warn!("suppressing tuple {item_id}: most active clusters already outgrew its parent");
            self.suppress_tuple(item_id);
            return;
        }

        // 4. even counting every active cluster together there isn't
        //    enough material in flight to ever satisfy k or l: give up.
        let distinct_pids: HashSet<&P> = self
            .global_tuples
            .iter()
            .map(|&id| &self.item_ref(id).record.pid)
            .collect();
        let distinct_sensitive: HashSet<&Sv> = self
            .big_gamma
            .values()
            .flat_map(|c| c.contents.iter().map(|t| &t.record.sensitive))
            .collect();
        if distinct_pids.len() < self.params.k || distinct_sensitive.len() < self.params.l {
            warn!("suppressing tuple {item_id}: Γ as a whole cannot satisfy k or l yet");
            self.suppress_tuple(item_id);
            return;
        }

        // 5. there is enough material somewhere in Γ: merge neighbouring
        //    clusters into this tuple's parent until it qualifies, then
        //    release it.
        let merged_id = self.merge_clusters(parent_id);
        self.output_cluster(merged_id);
    }

    fn emit(&mut self, record: crate::cluster::GeneralizedRecord<P, Sv, Payload>) {
        (self.sink)(record);
    }

    /// `output_cluster` (spec §4.6): optionally splits a large, diverse
    /// cluster before releasing it, then releases every tuple in each
    /// resulting subcluster and retires the subcluster into Ω.
    pub(crate) fn output_cluster(&mut self, cluster_id: ClusterId) {
        let needs_split = {
            let c = &self.big_gamma[&cluster_id];
            c.len() >= 2 * self.params.k && c.diversity().len() >= self.params.l
        };

        let subclusters = if needs_split {
            self.split_l(cluster_id)
        } else {
            vec![cluster_id]
        };

        for sc_id in subclusters {
            self.release_and_retire(sc_id);
        }
    }

    fn release_and_retire(&mut self, sc_id: ClusterId) {
        // ranges never shrink, so the loss can be captured before the
        // release loop below empties the cluster's contents.
        let info_loss = self.big_gamma[&sc_id].information_loss(&self.global_ranges);

        let ids: Vec<u64> = self.big_gamma[&sc_id]
            .contents
            .iter()
            .map(|it| it.id)
            .collect();

        let mut released_pids = HashSet::new();
        let mut released_diversity = HashSet::new();

        for item_id in ids {
            let generalized = self.big_gamma[&sc_id].generalise(self.item_ref(item_id));

            if self.params.history {
                self.history.push(self.item_ref(item_id).record.clone());
            }

            let item: Item<P, Sv, Payload> = self.detach_item(item_id);
            released_pids.insert(item.record.pid.clone());
            released_diversity.insert(item.record.sensitive.clone());

            self.emit(generalized);
        }

        assert!(
            released_pids.len() >= self.params.k,
            "output_cluster released fewer than k distinct pids"
        );
        assert!(
            released_diversity.len() >= self.params.l,
            "output_cluster released fewer than l distinct sensitive values"
        );

        self.recent_losses.push_back(info_loss);
        while self.recent_losses.len() > self.params.mu {
            self.recent_losses.pop_front();
        }
        self.update_tau();

        let retired = self
            .big_gamma
            .shift_remove(&sc_id)
            .expect("release_and_retire's cluster must still be active in Γ");
        debug_assert!(retired.is_empty(), "retired cluster must be fully drained");
        debug!("retired cluster {sc_id:?} into Ω (loss={info_loss:.4})");
        self.big_omega.insert(sc_id, retired);
    }

    /// `merge_clusters` (spec §4.5): absorbs the nearest neighbouring
    /// cluster (by cluster-enlargement) into `c_id`, repeating until `c_id`
    /// satisfies k-anonymity and l-diversity on its own.
    pub(crate) fn merge_clusters(&mut self, c_id: ClusterId) -> ClusterId {
        loop {
            let (len, diversity) = {
                let c = &self.big_gamma[&c_id];
                (c.len(), c.diversity().len())
            };
            if len >= self.params.k && diversity >= self.params.l {
                break;
            }

            let candidates: Vec<ClusterId> = self
                .big_gamma
                .keys()
                .copied()
                .filter(|id| *id != c_id)
                .collect();
            let c_min_id = candidates
                .into_iter()
                .min_by(|a, b| {
                    let ea = self.big_gamma[&c_id].cluster_enlargement(&self.big_gamma[a], &self.global_ranges);
                    let eb = self.big_gamma[&c_id].cluster_enlargement(&self.big_gamma[b], &self.global_ranges);
                    ea.partial_cmp(&eb).unwrap()
                })
                .expect(
                    "merge_clusters reached with no other cluster to absorb; \
                     delay_constraint's step 4 should have ruled this out",
                );

            let mut absorbed = self
                .big_gamma
                .shift_remove(&c_min_id)
                .expect("candidate cluster must be active");
            for item in absorbed.contents.drain(..) {
                self.reparent_item(c_id, item);
            }
        }
        c_id
    }

    pub(crate) fn reparent_item(&mut self, cluster_id: ClusterId, mut item: Item<P, Sv, Payload>) {
        item.cluster_id = Some(cluster_id);
        self.item_location.insert(item.id, cluster_id);
        self.big_gamma
            .get_mut(&cluster_id)
            .expect("reparent_item called with an inactive cluster id")
            .insert(item);
    }
}
