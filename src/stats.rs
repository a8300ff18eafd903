use std::collections::BTreeMap;

use fnv::{FnvHashMap, FnvHashSet};
use tracing::debug;

use crate::catalog::{Catalog, Placement};
use crate::errors::RecommenderError;
use crate::io::TransactionRecord;
use crate::types::{
    new_count_map, new_probability_map, ProbabilityMap, ProductId, UserId,
};

/// Learned per-product probabilities.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ItemStats {
    /// Number of order lines referencing the product across the whole history.
    pub global_count: u64,
    /// Share of all distinct orders the product appears in.
    pub global_p: f64,
    /// Count share of the product within its department, 0.0 for a department
    /// with zero total count.
    pub department_p: f64,
    /// Count share of the product within its aisle, 0.0 for an aisle with
    /// zero total count.
    pub aisle_p: f64,
}

/// Per-product statistics over the full transaction history. Covers every
/// product of the catalog, including never-purchased ones.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemStatsTable {
    stats: FnvHashMap<ProductId, ItemStats>,
    total_orders: u64,
}

impl ItemStatsTable {
    pub fn get(&self, product: ProductId) -> Option<&ItemStats> {
        self.stats.get(&product)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Count of distinct order ids in the history.
    pub fn total_orders(&self) -> u64 {
        self.total_orders
    }
}

/// Learned per-user distributions, plus the reconstructed order history.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserStats {
    /// Past orders, ordered by order number, products within an order ordered
    /// by cart position. Provenance order only, the rankings never read it.
    pub orders: Vec<Vec<ProductId>>,
    /// Product frequency over all item instances in the user's history.
    pub item_p: ProbabilityMap,
    /// Average per-order department distribution.
    pub department_p: ProbabilityMap,
    /// Average per-order aisle distribution.
    pub aisle_p: ProbabilityMap,
}

pub type UserStatsTable = FnvHashMap<UserId, UserStats>;

/// Learns the item statistics: global counts and probabilities from the
/// transaction history, and the conditional count shares within every
/// department and aisle.
///
/// A transaction referencing a product absent from the catalog is a
/// data-integrity error. A department or aisle whose members were never
/// purchased keeps all conditional probabilities at 0.0 instead of dividing
/// by zero.
pub fn learn_items(
    catalog: &Catalog,
    transactions: &[TransactionRecord],
) -> Result<ItemStatsTable, RecommenderError> {
    let mut stats: FnvHashMap<ProductId, ItemStats> =
        FnvHashMap::with_capacity_and_hasher(catalog.num_products(), Default::default());

    for product in catalog.products() {
        stats.insert(product, ItemStats::default());
    }

    let mut order_ids = FnvHashSet::default();

    for transaction in transactions {
        order_ids.insert(transaction.order_id);

        match stats.get_mut(&transaction.product_id) {
            Some(entry) => entry.global_count += 1,
            None => {
                return Err(RecommenderError::UnknownProduct {
                    product: transaction.product_id,
                    order: transaction.order_id,
                })
            }
        }
    }

    let total_orders = order_ids.len() as u64;

    if total_orders > 0 {
        for entry in stats.values_mut() {
            entry.global_p = entry.global_count as f64 / total_orders as f64;
        }
    }

    for (_, members) in catalog.departments() {
        distribute_group_counts(members, &mut stats, |entry, share| entry.department_p = share);
    }

    for (_, members) in catalog.aisles() {
        distribute_group_counts(members, &mut stats, |entry, share| entry.aisle_p = share);
    }

    debug!(
        products = stats.len(),
        total_orders, "item statistics learned"
    );

    Ok(ItemStatsTable { stats, total_orders })
}

/// Turns the global counts of a department or aisle into in-group count
/// shares. Groups with zero total count are left untouched.
fn distribute_group_counts<F>(
    members: &[ProductId],
    stats: &mut FnvHashMap<ProductId, ItemStats>,
    mut assign: F,
) where
    F: FnMut(&mut ItemStats, f64),
{
    let group_total: u64 = members
        .iter()
        .filter_map(|product| stats.get(product))
        .map(|entry| entry.global_count)
        .sum();

    if group_total == 0 {
        return;
    }

    for product in members {
        if let Some(entry) = stats.get_mut(product) {
            let share = entry.global_count as f64 / group_total as f64;
            assign(entry, share);
        }
    }
}

/// One transaction row after catalog validation, keyed for reconstruction.
struct OrderLine {
    position: u32,
    product: ProductId,
    placement: Placement,
}

/// Learns the user statistics: reconstructs every user's ordered list of
/// orders and derives the item, aisle and department distributions.
///
/// `item_p` is normalized by the total number of item instances across all of
/// the user's orders. The category distributions are averages of the
/// within-order distributions: each order contributes its normalized category
/// frequencies, and the accumulated sums are divided by the number of orders.
pub fn learn_users(
    catalog: &Catalog,
    transactions: &[TransactionRecord],
) -> Result<UserStatsTable, RecommenderError> {
    // user -> order number -> lines, order numbers kept sorted
    let mut grouped: FnvHashMap<UserId, BTreeMap<u32, Vec<OrderLine>>> = FnvHashMap::default();

    for transaction in transactions {
        let placement = catalog.placement(transaction.product_id).ok_or(
            RecommenderError::UnknownProduct {
                product: transaction.product_id,
                order: transaction.order_id,
            },
        )?;

        grouped
            .entry(transaction.user_id)
            .or_insert_with(BTreeMap::new)
            .entry(transaction.order_number)
            .or_insert_with(Vec::new)
            .push(OrderLine {
                position: transaction.add_to_cart_order,
                product: transaction.product_id,
                placement,
            });
    }

    let mut users: UserStatsTable =
        FnvHashMap::with_capacity_and_hasher(grouped.len(), Default::default());

    for (user_id, orders_by_number) in grouped {
        let mut orders: Vec<Vec<ProductId>> = Vec::with_capacity(orders_by_number.len());
        let mut item_counts = new_count_map();
        let mut aisle_acc = new_probability_map();
        let mut department_acc = new_probability_map();
        let mut num_item_instances: u64 = 0;

        for (_, mut lines) in orders_by_number {
            lines.sort_by_key(|line| (line.position, line.product));

            let order_len = lines.len() as f64;
            let mut order_aisle_counts = new_count_map();
            let mut order_department_counts = new_count_map();
            let mut order = Vec::with_capacity(lines.len());

            for line in lines {
                *item_counts.entry(line.product).or_insert(0) += 1;
                *order_aisle_counts.entry(line.placement.aisle).or_insert(0) += 1;
                *order_department_counts.entry(line.placement.department).or_insert(0) += 1;
                order.push(line.product);
            }

            for (aisle, count) in order_aisle_counts {
                *aisle_acc.entry(aisle).or_insert(0.0) += count as f64 / order_len;
            }
            for (department, count) in order_department_counts {
                *department_acc.entry(department).or_insert(0.0) += count as f64 / order_len;
            }

            num_item_instances += order.len() as u64;
            orders.push(order);
        }

        let mut item_p = new_probability_map();
        if num_item_instances > 0 {
            for (product, count) in item_counts {
                item_p.insert(product, count as f64 / num_item_instances as f64);
            }
        }

        // A user without orders cannot occur here, but the guard keeps the
        // degenerate case at empty distributions instead of dividing by zero.
        let num_orders = orders.len() as f64;
        if num_orders > 0.0 {
            for value in aisle_acc.values_mut() {
                *value /= num_orders;
            }
            for value in department_acc.values_mut() {
                *value /= num_orders;
            }
        }

        users.insert(
            user_id,
            UserStats {
                orders,
                item_p,
                department_p: department_acc,
                aisle_p: aisle_acc,
            },
        );
    }

    debug!(users = users.len(), "user statistics learned");

    Ok(users)
}
