//! Settled concurrent execution.
//!
//! Runs a set of independent operations concurrently and collects every
//! outcome instead of failing fast. Both the broadcast fan-out and the
//! downstream forwarding calls run through this so a single slow or failed
//! target never hides the outcome of the others.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Upper bound on operations in flight at once
const MAX_IN_FLIGHT: usize = 100;

/// Run every operation to completion with bounded parallelism and return all
/// outcomes. Completion order is not the input order; operations that need to
/// be matched back to their source should carry their own identity in the
/// output.
pub async fn run_all<F, T>(ops: impl IntoIterator<Item = F>) -> Vec<T>
where
    F: Future<Output = T>,
{
    stream::iter(ops)
        .buffer_unordered(MAX_IN_FLIGHT)
        .collect()
        .await
}
