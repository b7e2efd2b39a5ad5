//! Logdeck Event Hub
//!
//! Process-wide fan-out between the session registry and every subsystem that
//! reacts to it. Channels are typed and unbuffered:
//! - delivery follows subscription order within one channel
//! - nothing is ordered across channels
//! - nothing is replayed; a late subscriber pulls current state itself

mod channel;
mod hub;

pub use channel::{Channel, Subscription};
pub use hub::{ComponentDescriptor, EventHub, RowsUpdate};
