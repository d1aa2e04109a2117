pub mod accrual;
pub mod height;
pub mod inspect;
pub mod ledger;
pub mod processor;
pub mod scheduler;
pub mod types;
pub mod validator;

pub use inspect::{LedgerInspector, LedgerSnapshot};
pub use ledger::BatchingLedger;
pub use scheduler::{payout_offset, PayoutScheduler};
pub use validator::compare_payments;
pub use types::*;
