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

use std::fs::File;
use std::io::prelude::*;
use std::io::stdout;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::RecommenderError;
use crate::types::{ProductId, UserId};

/// One row of the product table. We expect a header line; columns beyond the
/// three named ones are ignored.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ProductRecord {
    pub product_id: ProductId,
    pub aisle_id: u32,
    pub department_id: u32,
}

/// One row of the transaction table. `order_number` is the position of the
/// order in the user's purchase sequence, `add_to_cart_order` the position of
/// the product within the order.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct TransactionRecord {
    pub user_id: UserId,
    pub order_id: u32,
    pub order_number: u32,
    pub add_to_cart_order: u32,
    pub product_id: ProductId,
}

/// Reads the headered product CSV file.
pub fn read_products(path: &str) -> Result<Vec<ProductRecord>, RecommenderError> {
    let mut reader = csv::Reader::from_path(path)?;

    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }

    Ok(records)
}

/// Reads the headered transaction CSV file.
pub fn read_transactions(path: &str) -> Result<Vec<TransactionRecord>, RecommenderError> {
    let mut reader = csv::Reader::from_path(path)?;

    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }

    Ok(records)
}

/// Struct used for JSON serialization of per-user predictions. Field names
/// will be used in JSON.
#[derive(Serialize)]
struct Predictions<'a> {
    user: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    products: Option<&'a [ProductId]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Output one JSON object per user, best product first. A failed user keeps
/// its line, carrying the error message instead of products. If an
/// `output_path` is supplied, we write to a file at the specified path,
/// otherwise, we output to stdout.
pub fn write_predictions(
    results: &[(UserId, Result<Vec<ProductId>, RecommenderError>)],
    output_path: Option<String>,
) -> Result<(), RecommenderError> {
    let mut out: Box<dyn Write> = match output_path {
        Some(path) => Box::new(File::create(&Path::new(&path))?),
        _ => Box::new(stdout()),
    };

    for (user, result) in results {
        let predictions = match result {
            Ok(products) => Predictions {
                user: *user,
                products: Some(products),
                error: None,
            },
            Err(failure) => Predictions {
                user: *user,
                products: None,
                error: Some(failure.to_string()),
            },
        };

        let predictions_as_json = serde_json::json!(predictions);

        write!(out, "{}\n", predictions_as_json.to_string())?;
    }

    Ok(())
}
