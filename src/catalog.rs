use fnv::FnvHashMap;

use crate::io::ProductRecord;
use crate::types::{AisleId, DepartmentId, ProductId};

/// Category placement of a single product. Every product belongs to exactly
/// one aisle and exactly one department.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub aisle: AisleId,
    pub department: DepartmentId,
}

/// Immutable-after-load indices over the two-level category hierarchy:
/// product -> placement, plus the member products of every department and
/// aisle. Member order within a group is irrelevant to all consumers.
pub struct Catalog {
    placements: FnvHashMap<ProductId, Placement>,
    department_items: FnvHashMap<DepartmentId, Vec<ProductId>>,
    aisle_items: FnvHashMap<AisleId, Vec<ProductId>>,
}

impl Catalog {
    pub fn from_records(records: &[ProductRecord]) -> Self {
        let mut placements: FnvHashMap<ProductId, Placement> =
            FnvHashMap::with_capacity_and_hasher(records.len(), Default::default());
        let mut department_items: FnvHashMap<DepartmentId, Vec<ProductId>> =
            FnvHashMap::with_capacity_and_hasher(100, Default::default());
        let mut aisle_items: FnvHashMap<AisleId, Vec<ProductId>> =
            FnvHashMap::with_capacity_and_hasher(100, Default::default());

        for record in records {
            let placement = Placement {
                aisle: record.aisle_id,
                department: record.department_id,
            };

            if placements.insert(record.product_id, placement).is_none() {
                department_items
                    .entry(record.department_id)
                    .or_insert_with(Vec::new)
                    .push(record.product_id);
                aisle_items
                    .entry(record.aisle_id)
                    .or_insert_with(Vec::new)
                    .push(record.product_id);
            }
        }

        Catalog { placements, department_items, aisle_items }
    }

    pub fn num_products(&self) -> usize {
        self.placements.len()
    }

    pub fn placement(&self, product: ProductId) -> Option<Placement> {
        self.placements.get(&product).copied()
    }

    pub fn products(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.placements.keys().copied()
    }

    pub fn departments(&self) -> impl Iterator<Item = (DepartmentId, &[ProductId])> {
        self.department_items.iter().map(|(&id, members)| (id, members.as_slice()))
    }

    pub fn aisles(&self) -> impl Iterator<Item = (AisleId, &[ProductId])> {
        self.aisle_items.iter().map(|(&id, members)| (id, members.as_slice()))
    }

    /// Member products of an aisle, empty for an aisle the catalog never saw.
    pub fn aisle_members(&self, aisle: AisleId) -> &[ProductId] {
        self.aisle_items.get(&aisle).map(Vec::as_slice).unwrap_or(&[])
    }
}
