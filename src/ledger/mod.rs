pub mod models;
pub mod repository;

pub use models::{NewPayout, Payout, PayoutStatus};
pub use repository::{PayoutLedger, PgPayoutLedger};
