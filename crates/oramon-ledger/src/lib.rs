//! oramon-ledger: persisted idempotency ledger for analytical snapshots.
//!
//! AWR snapshots are immutable once written, so their derived metrics only
//! need to be emitted once. The ledger remembers which snapshots have been
//! processed, across restarts, as a flat JSON object of
//! `"<dbid>-<instance>-<snap_id>"` keys mapped to the epoch second the
//! mark was written.
//!
//! # Architecture
//!
//! ```text
//! LedgerFile ──load()──▶ Ledger (in memory)
//!      ▲                   ├── processed(key)
//!      │                   ├── mark_processed(key)
//!      └─────save()────────┴── compact(now, retention)
//! ```

pub mod error;
pub mod ledger;

pub use error::{LedgerError, LedgerResult};
pub use ledger::{Ledger, LedgerFile, SnapshotKey, unix_now};
