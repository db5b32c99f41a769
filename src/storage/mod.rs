//! Trial storage backends.
//!
//! The [`Storage`] trait defines how finished trials are persisted and
//! retrieved. Every [`Study`](crate::study::Study) owns an
//! `Arc<dyn Storage>` so storage is shared across worker threads.
//!
//! | Backend | Description |
//! |---------|-------------|
//! | [`MemoryStorage`] | In-memory `Vec` behind a read-write lock (the default) |
//! | [`JournalStorage`] | JSON lines file with `fs2` file locking, for resuming a sweep |

mod journal;
mod memory;

use std::sync::Arc;

use parking_lot::RwLock;

pub use journal::JournalStorage;
pub use memory::MemoryStorage;

use crate::sampler::CompletedTrial;

/// Trait for storing and retrieving finished trials.
///
/// Implementations must be `Send + Sync` because a study may be driven
/// from several worker threads at once.
pub trait Storage: Send + Sync {
    /// Appends a finished trial.
    fn push(&self, trial: CompletedTrial);

    /// The shared in-memory trial buffer.
    fn trials_arc(&self) -> &Arc<RwLock<Vec<CompletedTrial>>>;

    /// Atomically returns the next unique trial id.
    fn next_trial_id(&self) -> u64;

    /// Reloads from an external source. Returns `true` if the buffer changed.
    fn refresh(&self) -> bool {
        false
    }
}
