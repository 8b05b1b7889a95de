//! Grocery list generation from a meal plan's cook slots.
//!
//! Pipeline: [`expand`] scales each cook slot's recipe ingredients,
//! [`aggregate`] merges them per [`normalize::bucket_key`], [`source_key`]
//! stamps the plan version, [`reconcile`] swaps the stored rows, and
//! [`staleness`] decides when a loaded list has to go through all of it again.

pub mod aggregate;
mod dto;
mod error;
pub mod expand;
mod guard;
pub mod handlers;
pub mod normalize;
pub mod reconcile;
mod services;
pub mod source_key;
pub mod staleness;

use crate::state::AppState;
use axum::Router;

pub use reconcile::ReconcilePolicy;
pub use services::GroceryService;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::grocery_routes())
}
