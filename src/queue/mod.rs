//! # Queue Broker
//!
//! One FIFO broker per queue name, handing bundles from producers to blocked pollers.
//!
//! ```text
//! add_bundle ──┐                         ┌──→ waiting poller (handle resolved)
//!              ├──→ enqueue(bundle, end) ┤
//! push_back ───┘                         └──→ stored at tail / head
//!
//! poll_bundle ──→ create handle ──→ register_callback ──→ stored head bundle
//!                                                     └─→ pollers (wait)
//! ```

pub mod actor;
pub mod broker;
pub mod messages;

pub use actor::{QueueActor, QueueEnd};
pub use broker::QueueBroker;
pub use messages::{
    AddBundle, GetQueueStats, PollBundle, PushBackBundle, RegisterCallback, SealQueue,
};
