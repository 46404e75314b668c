//! Bounded record queue between the record source and Stage A.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use crate::{Message, OmgError, Record, Result};

/// Constructor namespace for the bounded record queue.
pub struct RecordQueue;

impl RecordQueue {
    /// Creates a queue holding at most `capacity` messages.
    ///
    /// `push` blocks while the queue is full, `pop` while it is empty.
    pub fn bounded(capacity: usize) -> (QueueWriter, QueueReader) {
        let (tx, rx) = sync_channel(capacity.max(1));
        (QueueWriter { tx }, QueueReader { rx })
    }
}

/// Producer half. Consumed by [`finish`](Self::finish), so a stream carries
/// exactly one [`Message::EndOfStream`].
pub struct QueueWriter {
    tx: SyncSender<Message>,
}

impl QueueWriter {
    /// Enqueues one record, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`OmgError::PipelineClosed`] once the consumer is gone.
    pub fn push(&self, record: Record) -> Result<()> {
        self.tx
            .send(Message::Data(record))
            .map_err(|_| OmgError::PipelineClosed("record queue"))
    }

    /// Terminates the stream.
    pub fn finish(self) -> Result<()> {
        self.tx
            .send(Message::EndOfStream)
            .map_err(|_| OmgError::PipelineClosed("record queue"))
    }
}

/// Consumer half.
pub struct QueueReader {
    rx: Receiver<Message>,
}

impl QueueReader {
    /// Dequeues the next message, blocking while the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`OmgError::PipelineClosed`] when the producer went away
    /// without sending [`Message::EndOfStream`].
    pub fn pop(&self) -> Result<Message> {
        self.rx
            .recv()
            .map_err(|_| OmgError::PipelineClosed("record source ended without EndOfStream"))
    }
}
