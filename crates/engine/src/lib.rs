//! Conto engine: quantity allocation, amount validation, balance
//! computation and payment reconciliation for one shared bill at a time.
//!
//! The engine is a library. It holds an explicitly injected database
//! connection (see [`Engine::builder`]) and exposes synchronous
//! request/response operations: validate and create bills, claim line-item
//! quantities against a finite allocation pool, fold assignments and
//! completed payments into per-participant balances, and audit the whole
//! bill read-only. Identity and membership facts come from the caller;
//! amounts are integer minor units throughout.

pub use allocation::AllocationPool;
pub use assignments::Assignment;
pub use audit::{AuditIssue, AuditSeverity, ConsistencyReport};
pub use balances::{ParticipantBalance, PaymentStatus};
pub use bills::{Bill, BillStatus};
pub use commands::{AddItemCmd, AssignCmd, CreateBillCmd, RecordPaymentCmd};
pub use error::EngineError;
pub use line_items::LineItem;
pub use money::{Money, TOLERANCE_MINOR, validate_totals};
pub use ops::{Engine, EngineBuilder, PaymentListFilter};
pub use payments::{Payment, PaymentMethod, PaymentState};

mod allocation;
mod assignments;
mod audit;
mod balances;
mod bills;
mod commands;
mod error;
mod line_items;
mod money;
mod ops;
mod participants;
mod payments;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
