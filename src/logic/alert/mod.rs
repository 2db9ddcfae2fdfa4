//! Alert Module - Threshold decisions and durable alert storage
//!
//! - `record.rs` - AlertRecord
//! - `policy.rs` - Strict threshold policy
//! - `store.rs` - AlertStore trait + SQLite implementation

pub mod record;
pub mod policy;
pub mod store;

pub use record::AlertRecord;
pub use policy::AlertPolicy;
pub use store::{AlertStore, SqliteAlertStore};
