//! # treasury-ledger
//!
//! **Ledger Plane**: durable record of every operation and the queries over it.
//!
//! ## Architecture
//!
//! 1. **OperationStore**: storage-agnostic contract (`put` / `get` / `scan`,
//!    compare-and-swap `transition`, atomic `apply` of a [`LedgerBatch`])
//! 2. **InMemoryOperationStore**: reference backend, used by tests and
//!    single-process deployments
//! 3. **Query engine**: resolves raw query parameters into exactly one
//!    [`Filter`] plus a [`Pagination`] window and runs it against a store
//!
//! ## Query Flow
//!
//! ```text
//! OperationQuery → resolve() → (Filter, Pagination) → store.scan() → OperationPage
//! ```
//!
//! The store holds no business rules: lifecycle legality lives on
//! [`treasury_types::Operation::apply`], which every backend must call.

pub mod memory;
pub mod query;
pub mod store;

pub use memory::InMemoryOperationStore;
pub use query::{Filter, OperationPage, OperationQuery, Pagination, Selection, Window, list_operations};
pub use store::{LedgerBatch, OperationStore};
