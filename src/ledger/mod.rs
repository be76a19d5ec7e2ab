//! Slot ledger for publish admission
//!
//! The ledger owns, per lesson, the set of learners currently allowed to
//! publish an upload stream. It is the only place that set changes.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<MemoryLedger>
//!                  ┌──────────────────────────────┐
//!                  │ lessons: HashMap<LessonId,   │
//!                  │   Arc<RwLock<LessonSlots>>   │
//!                  │ >                            │
//!                  │ journal ──► append-only file │
//!                  │ activity──► ActivityLog      │
//!                  │ events  ──► broadcast::Tx    │
//!                  └──────────────┬───────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!   try_acquire()             release()          streaming_learners()
//!   write lock (lesson)       write lock         read lock
//! ```
//!
//! # Atomicity
//!
//! Each mutation takes the lesson's write lock, decides, appends to the
//! journal, applies the change, records activity and emits an event without
//! awaiting in between. A failed journal write aborts before anything is
//! applied, and a cancelled call can only be cancelled while waiting for the
//! lock.

pub mod config;
pub mod entry;
pub mod event;
pub mod journal;
pub mod key;
pub mod store;

pub use config::LedgerConfig;
pub use entry::{AcquireOutcome, LessonState, LessonStats, PublishState, ReleaseOutcome};
pub use event::{SlotEvent, SlotEventKind};
pub use journal::{FileJournal, Journal, JournalRecord, NullJournal};
pub use key::{LearnerId, LessonId};
pub use store::{MemoryLedger, SlotLedger};
