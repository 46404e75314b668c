//! Parallel decoding of a finished container.
//!
//! A [`ParallelReader`] hands each worker thread a contiguous run of entry
//! positions. The thread decodes every entry in its run (Elias-Fano segments,
//! domain inverse transform) and passes the typed [`Record`] to its own clone of
//! an [`EntryProcessor`]. Clones never share mutable state unless the processor
//! puts it behind an `Arc`, so per-thread tallies are flushed in
//! [`on_batch_complete`](EntryProcessor::on_batch_complete).

use crate::{Record, Result};

/// Consumer of decoded container entries, one clone per decode thread.
///
/// Scans, spectra and read batches all arrive as [`Record`]; match on the
/// variant the container's omics type implies.
pub trait EntryProcessor: Send + Clone {
    /// Receives the record stored at container position `id`.
    ///
    /// Positions are dense over the entries actually written, so they differ
    /// from source indices once the pipeline has dropped records.
    fn process_entry(&mut self, id: usize, record: Record) -> Result<()>;

    /// Runs after every block of decoded entries, the last block of a
    /// thread's run included. Merge per-thread totals into shared state here.
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Receives the decode thread's index before its first entry.
    fn set_tid(&mut self, _tid: usize) {}

    fn get_tid(&self) -> Option<usize> {
        None
    }
}

/// A container that can fan entry decoding out over threads.
pub trait ParallelReader {
    /// Decodes every entry exactly once across `num_threads` threads.
    ///
    /// `num_threads == 0` uses every available core; the count is capped by the
    /// core count and the number of entries. The first error raised by a
    /// processor or by decoding is returned after all threads have stopped.
    fn process_parallel<P: EntryProcessor + 'static>(
        &self,
        processor: P,
        num_threads: usize,
    ) -> Result<()>;
}
