//! Next-basket product recommendations from purchase histories.
//!
//! The model is rebuilt from the full transaction history on every learning
//! run: [`stats::learn_items`] derives per-product probabilities over the
//! two-level category hierarchy, [`stats::learn_users`] derives per-user
//! purchase distributions, and [`rank`] turns them into ranked top-k
//! candidate lists, either from the user's own history alone or blended with
//! products popular in the user's aisles.

use std::sync::Mutex;
use std::time::Instant;

use scoped_pool::Pool;
use tracing::info;

pub mod catalog;
pub mod errors;
pub mod io;
pub mod rank;
pub mod stats;
pub mod types;
pub mod utils;


use crate::catalog::Catalog;
use crate::io::{ProductRecord, TransactionRecord};
use crate::rank::AislePopularityCache;
use crate::stats::{ItemStatsTable, UserStats, UserStatsTable};
use crate::types::{ProductId, UserId};

pub use crate::errors::RecommenderError;
pub use crate::rank::Strategy;

/// Facade coordinating the two-phase life cycle: load the tables, learn
/// items, learn users, then predict. Prediction is read-only except for
/// first-touch population of the aisle popularity cache, which makes
/// [`Recommender::predict`] safe to call from many threads at once.
pub struct Recommender {
    catalog: Option<Catalog>,
    transactions: Vec<TransactionRecord>,
    items: Option<ItemStatsTable>,
    users: Option<UserStatsTable>,
    aisle_cache: AislePopularityCache,
}

impl Recommender {
    pub fn new() -> Self {
        Recommender {
            catalog: None,
            transactions: Vec::new(),
            items: None,
            users: None,
            aisle_cache: AislePopularityCache::new(rank::MAX_AISLE_POPULAR),
        }
    }

    /// Reads both CSV tables and builds the catalog indices. Any previously
    /// learned statistics are discarded.
    pub fn load(
        &mut self,
        products_path: &str,
        transactions_path: &str,
    ) -> Result<(), RecommenderError> {
        let started = Instant::now();

        let products = io::read_products(products_path)?;
        let transactions = io::read_transactions(transactions_path)?;

        info!(
            products = products.len(),
            transactions = transactions.len(),
            elapsed_ms = utils::to_millis(started.elapsed()),
            "tables loaded"
        );

        self.load_from_records(&products, transactions);
        Ok(())
    }

    /// Programmatic variant of [`Recommender::load`] for callers that already
    /// hold the records in memory.
    pub fn load_from_records(
        &mut self,
        products: &[ProductRecord],
        transactions: Vec<TransactionRecord>,
    ) {
        self.catalog = Some(Catalog::from_records(products));
        self.transactions = transactions;
        self.items = None;
        self.users = None;
        self.aisle_cache.clear();
    }

    /// Learning phase 1: per-product statistics. Invalidates the aisle
    /// popularity cache, whose entries are derived from these statistics.
    pub fn learn_items(&mut self) -> Result<(), RecommenderError> {
        let catalog = self.catalog.as_ref().ok_or(RecommenderError::NotReady("load"))?;

        let started = Instant::now();
        let items = stats::learn_items(catalog, &self.transactions)?;

        info!(
            products = items.len(),
            total_orders = items.total_orders(),
            elapsed_ms = utils::to_millis(started.elapsed()),
            "items learned"
        );

        self.items = Some(items);
        self.users = None;
        self.aisle_cache.clear();
        Ok(())
    }

    /// Learning phase 2, requires [`Recommender::learn_items`] to have run.
    pub fn learn_users(&mut self) -> Result<(), RecommenderError> {
        let catalog = self.catalog.as_ref().ok_or(RecommenderError::NotReady("load"))?;
        if self.items.is_none() {
            return Err(RecommenderError::NotReady("learn_items"));
        }

        let started = Instant::now();
        let users = stats::learn_users(catalog, &self.transactions)?;

        info!(
            users = users.len(),
            elapsed_ms = utils::to_millis(started.elapsed()),
            "users learned"
        );

        self.users = Some(users);
        Ok(())
    }

    /// Returns up to `k` product ids for the user, best first.
    pub fn predict(
        &self,
        user_id: UserId,
        k: usize,
        strategy: Strategy,
    ) -> Result<Vec<ProductId>, RecommenderError> {
        let (catalog, items, users) = self.learned()?;

        let user = users.get(&user_id).ok_or(RecommenderError::UnknownUser(user_id))?;

        let ranked = match strategy {
            Strategy::Naive => rank::rank_naive(user, k),
            Strategy::Hybrid => rank::rank_hybrid(user, k, catalog, items, &self.aisle_cache),
        };

        Ok(ranked)
    }

    /// Predicts for many users on a worker pool, one result per input id, in
    /// input order. A failed user yields an error marker in its slot instead
    /// of aborting the whole batch.
    pub fn predict_many(
        &self,
        user_ids: &[UserId],
        k: usize,
        strategy: Strategy,
    ) -> Result<Vec<Result<Vec<ProductId>, RecommenderError>>, RecommenderError> {
        // fail before spinning up the pool if learning has not completed
        self.learned()?;

        let started = Instant::now();

        let mut slots: Vec<Mutex<Option<Result<Vec<ProductId>, RecommenderError>>>> =
            Vec::with_capacity(user_ids.len());
        for _ in 0..user_ids.len() {
            slots.push(Mutex::new(None));
        }

        let pool = Pool::new(num_cpus::get());

        pool.scoped(|scope| {
            for (slot, &user_id) in slots.iter().zip(user_ids.iter()) {
                scope.execute(move || {
                    let result = self.predict(user_id, k, strategy);
                    *slot.lock().unwrap() = Some(result);
                });
            }
        });

        pool.shutdown();

        info!(
            users = user_ids.len(),
            elapsed_ms = utils::to_millis(started.elapsed()),
            "batch prediction finished"
        );

        let results = slots
            .into_iter()
            .map(|slot| slot.into_inner().unwrap().unwrap())
            .collect();

        Ok(results)
    }

    /// All learned user ids, ascending.
    pub fn user_ids(&self) -> Result<Vec<UserId>, RecommenderError> {
        let (_, _, users) = self.learned()?;

        let mut ids: Vec<UserId> = users.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn user_stats(&self, user_id: UserId) -> Option<&UserStats> {
        self.users.as_ref().and_then(|users| users.get(&user_id))
    }

    pub fn item_stats(&self) -> Option<&ItemStatsTable> {
        self.items.as_ref()
    }

    fn learned(
        &self,
    ) -> Result<(&Catalog, &ItemStatsTable, &UserStatsTable), RecommenderError> {
        let catalog = self.catalog.as_ref().ok_or(RecommenderError::NotReady("load"))?;
        let items = self.items.as_ref().ok_or(RecommenderError::NotReady("learn_items"))?;
        let users = self.users.as_ref().ok_or(RecommenderError::NotReady("learn_users"))?;

        Ok((catalog, items, users))
    }
}

impl Default for Recommender {
    fn default() -> Self {
        Recommender::new()
    }
}
