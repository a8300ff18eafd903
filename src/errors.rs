use thiserror::Error;

use crate::types::{ProductId, UserId};

#[derive(Debug, Error)]
pub enum RecommenderError {
    #[error("order {order} references product {product} which is missing from the catalog")]
    UnknownProduct { product: ProductId, order: u32 },
    #[error("no statistics learned for user {0}")]
    UnknownUser(UserId),
    #[error("prediction requested before `{0}` completed")]
    NotReady(&'static str),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
