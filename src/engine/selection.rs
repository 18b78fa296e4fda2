//! Picking a home for an incoming tuple, and keeping τ current (spec §4.2).

use std::fmt::Debug;
use std::hash::Hash;

use rand::seq::{index, SliceRandom};
use rand::Rng;

use crate::cluster::ClusterId;
use crate::item::Item;

use super::Castle;

impl<P, Sv, Payload, R> Castle<P, Sv, Payload, R>
where
    P: Clone + Eq + Hash + Debug,
    Sv: Clone + Eq + Hash + Debug,
    R: Rng,
{
    /// `best_selection` (spec §4.2): among the clusters Γ that would grow
    /// least by admitting `item`, prefer one whose resulting loss stays at
    /// or below τ; failing that, only force a re-use once Γ has hit its
    /// β ceiling. Returns `None` to signal "open a new cluster".
    pub(crate) fn best_selection(&mut self, item: &Item<P, Sv, Payload>) -> Option<ClusterId> {
        if self.big_gamma.is_empty() {
            return None;
        }

        let enlargements: Vec<(ClusterId, f64)> = self
            .big_gamma
            .iter()
            .map(|(id, c)| (*id, c.tuple_enlargement(item, &self.global_ranges)))
            .collect();

        let e_min = enlargements
            .iter()
            .map(|(_, e)| *e)
            .fold(f64::INFINITY, f64::min);

        let set_c_min: Vec<ClusterId> = enlargements
            .iter()
            .filter(|(_, e)| *e == e_min)
            .map(|(id, _)| *id)
            .collect();

        let set_c_ok: Vec<ClusterId> = set_c_min
            .iter()
            .copied()
            .filter(|id| {
                self.big_gamma[id].information_loss_given_t(item, &self.global_ranges) <= self.tau
            })
            .collect();

        if !set_c_ok.is_empty() {
            set_c_ok.choose(&mut self.rng).copied()
        } else if self.big_gamma.len() >= self.params.beta {
            set_c_min.choose(&mut self.rng).copied()
        } else {
            None
        }
    }

    /// `update_tau` (spec §4.2): the mean of recent release losses once any
    /// exist, else the mean loss over a sample of up to five active
    /// clusters, else +∞ while Γ is empty (no information to anchor τ to
    /// yet, so every tuple looks equally costly until the first cluster
    /// exists).
    pub(crate) fn update_tau(&mut self) {
        if !self.recent_losses.is_empty() {
            self.tau = self.recent_losses.iter().sum::<f64>() / self.recent_losses.len() as f64;
            return;
        }

        if self.big_gamma.is_empty() {
            self.tau = f64::INFINITY;
            return;
        }

        let sample_size = self.big_gamma.len().min(5);
        let ids: Vec<ClusterId> = self.big_gamma.keys().copied().collect();
        let picked = index::sample(&mut self.rng, ids.len(), sample_size);
        let total: f64 = picked
            .iter()
            .map(|i| self.big_gamma[&ids[i]].information_loss(&self.global_ranges))
            .sum();
        self.tau = total / sample_size as f64;
    }
}
