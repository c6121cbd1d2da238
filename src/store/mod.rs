//! Market data store
//!
//! - `models` - stock records and the persisted market state
//! - `debounce` - keyed cancellable delayed tasks
//! - `market` - the reactive store with debounced write-back

pub mod debounce;
pub mod market;
pub mod models;

pub use market::MarketStore;
pub use models::{sort_stocks, ExtraValue, FieldValue, MarketState, Stock};
