pub mod allocator;
pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod notify;
pub mod rates;
pub mod settlement;
pub mod tournament;
