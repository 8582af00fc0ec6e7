pub mod config;
pub mod discord;
pub mod errors;
pub mod feed;
pub mod ledger;
pub mod models;
pub mod monitor;
pub mod quote;
pub mod reporter;
pub mod selector;
pub mod store;
pub mod strategy;
pub mod swap_path;

pub use config::Config;
pub use models::{AccountView, Market, Opportunity, Route};
pub use selector::{AttemptOutcome, SelectorSettings};
