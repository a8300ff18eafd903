/**
 * NextBasket
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use fnv::FnvHashMap;

/// Identifiers are taken verbatim from the input tables.
pub type UserId = u32;
pub type ProductId = u32;
pub type AisleId = u32;
pub type DepartmentId = u32;

pub type CountMap = FnvHashMap<u32, u64>;
pub type ProbabilityMap = FnvHashMap<u32, f64>;

pub fn new_count_map() -> CountMap {
    FnvHashMap::with_capacity_and_hasher(0, Default::default())
}

pub fn new_probability_map() -> ProbabilityMap {
    FnvHashMap::with_capacity_and_hasher(0, Default::default())
}
