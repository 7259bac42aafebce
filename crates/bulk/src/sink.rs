use anyhow::Result;

use crate::{action::ActionResult, chunk::Chunk};

/// A remote endpoint accepting batches of actions.
///
/// `submit` is called concurrently from several worker threads, each with its
/// own chunk. It must return exactly one result per action, in chunk order.
/// An `Err` means the whole chunk failed (transport error, unreadable response).
pub trait BulkSink: Sync {
    fn submit(&self, chunk: &Chunk) -> Result<Vec<ActionResult>>;
}

impl<S: BulkSink + ?Sized> BulkSink for Box<S> {
    fn submit(&self, chunk: &Chunk) -> Result<Vec<ActionResult>> {
        (**self).submit(chunk)
    }
}
