//! # Actor Substrate
//!
//! In-process implementation of the durable actor contract queues and worker trackers
//! are built on.
//!
//! ## Architecture
//!
//! ```text
//! Handler<M> ──→ KeyedExecutor::exclusive(key) ──→ StateStore (memory | postgres)
//!     │                  │
//!     │                  └─→ one writer per key, distinct keys run concurrently
//!     │
//!     ├─→ PromiseRegistry   deferred handles resolved from any task
//!     ├─→ EffectJournal     (key, step) → recorded result, replayed instead of redone
//!     └─→ TimerService      delayed self-addressed messages
//! ```
//!
//! Exclusive operations load typed state under the key's lock and commit it back before
//! releasing. Shared operations read a snapshot without the lock and route every
//! mutation through an exclusive message.

pub mod journal;
pub mod keyed_executor;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod promises;
pub mod state_store;
pub mod timers;
pub mod traits;

pub use journal::EffectJournal;
pub use keyed_executor::{ActorState, ExclusiveState, KeyedExecutor};
#[cfg(feature = "postgres")]
pub use postgres::PgStateStore;
pub use promises::{HandleId, Promise, PromiseRegistry};
pub use state_store::{InMemoryStateStore, StateStore};
pub use timers::TimerService;
pub use traits::{ActorKey, Handler, KeyedActor, Message};
