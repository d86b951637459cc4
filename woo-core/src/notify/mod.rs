//! Change Notification
//!
//! Writes to tracked nodes do not recompute anything immediately. They
//! mark computations stale; a batch tick later merges everything marked
//! since the previous tick and recomputes each stale computation once.
//!
//! Trading a few milliseconds of latency for this coalescing means that a
//! handler writing the same field three times causes one recomputation,
//! not three.

mod notifier;
mod ticker;

pub use notifier::{ChangeNotifier, DispatchReport};
pub use ticker::BatchTicker;
