use std::str::FromStr;
use std::sync::{Arc, Mutex};

use fnv::FnvHashMap;

use crate::catalog::Catalog;
use crate::stats::{ItemStatsTable, UserStats};
use crate::types::{AisleId, ProductId};

/// Number of products kept per aisle in the popularity cache.
pub const MAX_AISLE_POPULAR: usize = 10;

/// Ranking strategy selected by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Rank only products from the user's own purchase history.
    Naive,
    /// Blend the history with products popular in the user's aisles.
    Hybrid,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "naive" => Ok(Strategy::Naive),
            "hybrid" => Ok(Strategy::Hybrid),
            other => Err(format!("unknown strategy '{}', expected 'naive' or 'hybrid'", other)),
        }
    }
}

/// Top products of each aisle by their in-aisle count share, computed once
/// per aisle on first demand and shared across all predictions.
///
/// Entries are only valid for the item statistics they were computed from.
/// The owning service clears the cache whenever items are relearned.
pub struct AislePopularityCache {
    max_popular: usize,
    entries: Mutex<FnvHashMap<AisleId, Arc<Vec<(ProductId, f64)>>>>,
}

impl AislePopularityCache {
    pub fn new(max_popular: usize) -> Self {
        AislePopularityCache {
            max_popular,
            entries: Mutex::new(FnvHashMap::default()),
        }
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Returns the cached top products of `aisle`, computing them on first
    /// touch. The entry is computed outside the lock, so concurrent first
    /// touches of the same aisle at worst recompute the same value once and
    /// never observe a partial entry.
    pub fn top_products(
        &self,
        aisle: AisleId,
        catalog: &Catalog,
        items: &ItemStatsTable,
    ) -> Arc<Vec<(ProductId, f64)>> {
        if let Some(entry) = self.entries.lock().unwrap().get(&aisle) {
            return Arc::clone(entry);
        }

        let computed = Arc::new(top_products_of_aisle(aisle, catalog, items, self.max_popular));

        let mut entries = self.entries.lock().unwrap();
        Arc::clone(entries.entry(aisle).or_insert(computed))
    }
}

fn top_products_of_aisle(
    aisle: AisleId,
    catalog: &Catalog,
    items: &ItemStatsTable,
    max_popular: usize,
) -> Vec<(ProductId, f64)> {
    let mut scored: Vec<(ProductId, f64)> = catalog
        .aisle_members(aisle)
        .iter()
        .filter_map(|&product| items.get(product).map(|stats| (product, stats.aisle_p)))
        .collect();

    sort_by_score(&mut scored);
    scored.truncate(max_popular);

    scored
}

/// Ranks the user's own purchases by historical frequency. Returns at most
/// `k` product ids, fewer if the user bought fewer distinct products.
pub fn rank_naive(user: &UserStats, k: usize) -> Vec<ProductId> {
    let scored: Vec<(ProductId, f64)> =
        user.item_p.iter().map(|(&product, &p)| (product, p)).collect();

    take_top(scored, k)
}

/// Ranks the user's history extended with products popular in the aisles the
/// user buys from. An uncached aisle is scored and cached on the way.
///
/// A non-historical candidate from aisle `a` is scored `P(I|a) * P(a|user)`.
/// The product term is used directly as a proxy for `P(I|user)`, without
/// normalization by `P(I)` or summation over competing aisles. Historical
/// probabilities always win: a product already scored from the user's own
/// history is never overwritten by a blended score.
pub fn rank_hybrid(
    user: &UserStats,
    k: usize,
    catalog: &Catalog,
    items: &ItemStatsTable,
    cache: &AislePopularityCache,
) -> Vec<ProductId> {
    let mut candidates = user.item_p.clone();

    for (&aisle, &aisle_affinity) in user.aisle_p.iter() {
        let popular = cache.top_products(aisle, catalog, items);

        for &(product, p_product_given_aisle) in popular.iter() {
            if candidates.contains_key(&product) {
                continue;
            }
            candidates.insert(product, p_product_given_aisle * aisle_affinity);
        }
    }

    take_top(candidates.into_iter().collect(), k)
}

/// Probability descending, product id ascending on ties. "Most probable
/// first" alone would be ambiguous on equal probabilities.
fn sort_by_score(scored: &mut Vec<(ProductId, f64)>) {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
}

fn take_top(mut scored: Vec<(ProductId, f64)>, k: usize) -> Vec<ProductId> {
    sort_by_score(&mut scored);
    scored.truncate(k);

    scored.into_iter().map(|(product, _)| product).collect()
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::catalog::Catalog;
    use crate::io::{ProductRecord, TransactionRecord};
    use crate::stats::learn_items;

    fn product(product_id: u32, aisle_id: u32, department_id: u32) -> ProductRecord {
        ProductRecord { product_id, aisle_id, department_id }
    }

    fn line(
        user_id: u32,
        order_id: u32,
        order_number: u32,
        add_to_cart_order: u32,
        product_id: u32,
    ) -> TransactionRecord {
        TransactionRecord { user_id, order_id, order_number, add_to_cart_order, product_id }
    }

    fn user_with(items: &[(u32, f64)], aisles: &[(u32, f64)]) -> UserStats {
        let mut user = UserStats::default();
        for &(product, p) in items {
            user.item_p.insert(product, p);
        }
        for &(aisle, p) in aisles {
            user.aisle_p.insert(aisle, p);
        }
        user
    }

    /// Aisle 7 holds products 10 and 11 with counts 2 and 3, so their
    /// in-aisle shares are 0.4 and 0.6. Product 99 lives elsewhere.
    fn aisle_fixture() -> (Catalog, ItemStatsTable) {
        let catalog = Catalog::from_records(&[
            product(10, 7, 1),
            product(11, 7, 1),
            product(99, 8, 2),
        ]);

        let transactions = vec![
            line(1, 1000, 1, 1, 10),
            line(1, 1001, 2, 1, 10),
            line(1, 1002, 3, 1, 11),
            line(2, 1003, 1, 1, 11),
            line(2, 1004, 2, 1, 11),
            line(2, 1005, 3, 1, 99),
        ];

        let items = learn_items(&catalog, &transactions).unwrap();
        (catalog, items)
    }

    #[test]
    fn naive_ranks_by_descending_frequency() {
        let user = user_with(&[(5, 0.2), (3, 0.5), (8, 0.3)], &[]);

        assert_eq!(rank_naive(&user, 10), vec![3, 8, 5]);
        assert_eq!(rank_naive(&user, 2), vec![3, 8]);
    }

    #[test]
    fn naive_breaks_ties_by_product_id() {
        let user = user_with(&[(9, 0.25), (2, 0.5), (4, 0.25)], &[]);

        assert_eq!(rank_naive(&user, 3), vec![2, 4, 9]);
    }

    #[test]
    fn naive_returns_at_most_the_history_size() {
        let user = user_with(&[(1, 1.0)], &[]);

        assert_eq!(rank_naive(&user, 10), vec![1]);
        assert!(rank_naive(&UserStats::default(), 10).is_empty());
    }

    #[test]
    fn cache_keeps_top_products_sorted_and_truncated() {
        let (catalog, items) = aisle_fixture();
        let cache = AislePopularityCache::new(1);

        let popular = cache.top_products(7, &catalog, &items);
        assert_eq!(popular.as_slice(), &[(11, 0.6)]);

        // second touch reuses the entry
        let again = cache.top_products(7, &catalog, &items);
        assert_eq!(popular, again);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_clears_for_relearned_items() {
        let (catalog, items) = aisle_fixture();
        let cache = AislePopularityCache::new(MAX_AISLE_POPULAR);

        cache.top_products(7, &catalog, &items);
        assert!(!cache.is_empty());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn hybrid_blends_aisle_popularity_into_the_history() {
        let (catalog, items) = aisle_fixture();
        let cache = AislePopularityCache::new(MAX_AISLE_POPULAR);

        // history {99: 1.0}, aisle affinity {7: 0.5}; candidates from aisle 7
        // score 0.6 * 0.5 = 0.3 for product 11 and 0.4 * 0.5 = 0.2 for 10
        let user = user_with(&[(99, 1.0)], &[(7, 0.5)]);

        let ranked = rank_hybrid(&user, 10, &catalog, &items, &cache);
        assert_eq!(ranked, vec![99, 11, 10]);
    }

    #[test]
    fn hybrid_never_overwrites_historical_scores() {
        let (catalog, items) = aisle_fixture();
        let cache = AislePopularityCache::new(MAX_AISLE_POPULAR);

        // product 11 has a tiny historical probability; the blended score
        // 0.6 would outrank product 99, the historical 0.1 must not
        let user = user_with(&[(99, 0.9), (11, 0.1)], &[(7, 1.0)]);

        let ranked = rank_hybrid(&user, 10, &catalog, &items, &cache);
        assert_eq!(ranked, vec![99, 10, 11]);
    }

    #[test]
    fn hybrid_candidates_come_from_the_users_aisles() {
        let (catalog, items) = aisle_fixture();
        let cache = AislePopularityCache::new(MAX_AISLE_POPULAR);

        let user = user_with(&[(99, 1.0)], &[(7, 0.5)]);
        let ranked = rank_hybrid(&user, 10, &catalog, &items, &cache);

        for product_id in ranked {
            let in_history = user.item_p.contains_key(&product_id);
            let in_user_aisle = user
                .aisle_p
                .keys()
                .any(|&aisle| catalog.aisle_members(aisle).contains(&product_id));

            assert!(in_history || in_user_aisle);
        }
    }

    #[test]
    fn hybrid_is_deterministic() {
        let (catalog, items) = aisle_fixture();
        let cache = AislePopularityCache::new(MAX_AISLE_POPULAR);

        let mut user = user_with(&[(99, 1.0)], &[(7, 0.5), (8, 0.5)]);
        user.item_p.insert(10, 0.000001);

        let first = rank_hybrid(&user, 10, &catalog, &items, &cache);
        let second = rank_hybrid(&user, 10, &catalog, &items, &cache);
        assert_eq!(first, second);
    }

    #[test]
    fn strategy_names_parse() {
        assert_eq!("naive".parse::<Strategy>().unwrap(), Strategy::Naive);
        assert_eq!("hybrid".parse::<Strategy>().unwrap(), Strategy::Hybrid);
        assert!("bayes".parse::<Strategy>().is_err());
    }
}
