//! Pull-style iteration over a push parser.
//!
//! The parser runs on a worker thread and hands records over a rendezvous channel: the worker
//! blocks in every send until the consumer asks for the next record, so at most one decoded record
//! is ever waiting ahead of the consumer.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::error::{Error, Result};
use crate::filter::IdFilter;
use crate::options::Format;
use crate::parser::{ParseControl, PushParser, RecordVisitor, Visit};
use crate::record::{Record, RecordBuilder, RecordHeader};

enum Message {
    Record(Record),
    End,
    Failed(Error),
}

/// Records of one stream, in file order, decoded on a background thread.
///
/// [`RecordStream::has_next`] blocks until the worker has produced the next record or reached the
/// end of the stream. A parse error surfaces on the next call after it happens, and the stream is
/// closed from then on. Dropping the stream closes it.
pub struct RecordStream {
    receiver: Option<Receiver<Message>>,
    worker: Option<JoinHandle<()>>,
    halt: Arc<AtomicBool>,
    pending: Option<Record>,
    finished: bool,
    closed: bool,
}

impl RecordStream {
    /// Start parsing `reader` on a new worker thread.
    pub fn spawn<R>(parser: PushParser, reader: R, len: Option<u64>) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        Self::spawn_filtered(parser, reader, len, None)
    }

    /// Like [`RecordStream::spawn`], but records whose ids `filter` rejects are skipped without
    /// decoding their bodies.
    pub fn spawn_filtered<R>(
        parser: PushParser,
        reader: R,
        len: Option<u64>,
        filter: Option<Arc<dyn IdFilter + Send + Sync>>,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (sender, receiver) = bounded(0);
        let halt = Arc::new(AtomicBool::new(false));

        let mut forward = Forward {
            sender,
            halt: halt.clone(),
            filter,
        };
        let worker = std::thread::Builder::new()
            .name("seqstore-stream".to_string())
            .spawn(move || {
                debug!("Stream worker started for {}", parser.origin());
                match parser.parse(reader, len, &mut forward) {
                    Ok(outcome) => debug!("Stream worker finished: {:?}", outcome),
                    Err(e) => {
                        // the consumer may be gone already
                        let _ = forward.sender.send(Message::Failed(e));
                    }
                }
            })?;

        Ok(Self {
            receiver: Some(receiver),
            worker: Some(worker),
            halt,
            pending: None,
            finished: false,
            closed: false,
        })
    }

    /// Stream every record of the file at `path`.
    pub fn open(path: impl AsRef<Path>, format: Format) -> Result<Self> {
        let parser = PushParser::for_path(path.as_ref(), format)?;
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        Self::spawn(parser, file, Some(len))
    }

    /// Whether another record follows. Blocks until the worker has decoded it or hit the end.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.closed {
            return Err(Error::ClosedResource("record stream"));
        }
        if self.pending.is_some() {
            return Ok(true);
        }
        if self.finished {
            return Ok(false);
        }

        let Some(receiver) = &self.receiver else {
            return Err(Error::ClosedResource("record stream"));
        };
        match receiver.recv() {
            Ok(Message::Record(record)) => {
                self.pending = Some(record);
                Ok(true)
            }
            Ok(Message::End) => {
                self.finished = true;
                Ok(false)
            }
            Ok(Message::Failed(e)) => {
                self.close();
                Err(e)
            }
            Err(_) => {
                // the worker dropped its sender without saying why
                self.close();
                Err(Error::WorkerPanicked)
            }
        }
    }

    /// Stop the worker and release the source. Never fails, and can be called repeatedly.
    ///
    /// Does not wait for a worker that is still inside a read: it stops at its next record
    /// boundary and drops the source then.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.halt.store(true, Ordering::Release);
        self.pending = None;

        // unblocks a worker waiting in send
        drop(self.receiver.take());

        if let Some(worker) = self.worker.take() {
            if !worker.is_finished() {
                debug!("Detaching stream worker that is still running");
            } else if worker.join().is_err() {
                warn!("Stream worker panicked");
            }
        }
        debug!("Record stream closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Iterator for RecordStream {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        match self.has_next() {
            Ok(true) => self.pending.take().map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Worker-side visitor: builds every record and sends it to the consumer.
struct Forward {
    sender: Sender<Message>,
    halt: Arc<AtomicBool>,
    filter: Option<Arc<dyn IdFilter + Send + Sync>>,
}

impl RecordVisitor for Forward {
    type Body = RecordBuilder;

    fn visit_record(&mut self, control: &mut ParseControl, header: &RecordHeader) -> Visit<RecordBuilder> {
        if self.halt.load(Ordering::Acquire) {
            control.halt_parsing();
            return Visit::Skip;
        }
        match &self.filter {
            Some(filter) if !filter.accept(header.id()) => Visit::Skip,
            _ => Visit::Body(RecordBuilder::new(header)),
        }
    }

    fn record_done(&mut self, control: &mut ParseControl, body: RecordBuilder) {
        if self.sender.send(Message::Record(body.build())).is_err() {
            control.halt_parsing();
        }
    }

    fn visit_end(&mut self) {
        let _ = self.sender.send(Message::End);
    }
}
