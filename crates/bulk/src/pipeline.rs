use std::{
    collections::{BTreeMap, VecDeque},
    panic::{self, AssertUnwindSafe},
    thread,
};

use anyhow::{Error, Result, anyhow, ensure};
use cdr_runtime::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHUNK_BYTES, DEFAULT_THREADS};
use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error, info};

use crate::{
    action::{Action, ActionResult, EXCEPTION_RESULT, Operation},
    chunk::{Chunk, Chunker},
    sink::BulkSink,
};

/// Longest error detail written to the log for a single failed action.
const MAX_LOGGED_ERROR: usize = 2000;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Worker threads calling the sink concurrently.
    pub threads: usize,
    /// Maximum actions per chunk.
    pub chunk_size: usize,
    /// Maximum serialized bytes per chunk.
    pub max_chunk_bytes: usize,
    /// Abort once more than this many chunks failed as a whole.
    /// `None` keeps going regardless.
    pub max_chunk_errors: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            max_chunk_errors: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.threads > 0, "thread count must be at least 1");
        ensure!(self.chunk_size > 0, "chunk size must be at least 1");
        ensure!(self.max_chunk_bytes > 0, "max chunk bytes must be at least 1");
        Ok(())
    }

    /// Chunks allowed between dispatch and result delivery.
    pub fn max_in_flight(&self) -> usize {
        self.threads + 1
    }
}

/// Counters for one run. Only the driving thread updates them.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    /// Actions handed to workers.
    pub total_submitted: usize,
    /// Actions whose results were delivered.
    pub total_completed: usize,
    pub chunks_submitted: usize,
    pub chunks_completed: usize,
    /// Chunks the sink failed as a whole.
    pub chunk_errors: usize,
    /// Highest number of chunks in flight at once.
    pub peak_in_flight: usize,
    /// Delivered results by result kind.
    pub result_counts: BTreeMap<String, usize>,
    /// Set by any failed action or an aborted stream; decides the exit code.
    pub failed: bool,
}

impl PipelineState {
    pub fn in_flight(&self) -> usize {
        self.chunks_submitted - self.chunks_completed
    }

    fn record(&mut self, result: &ActionResult) {
        self.total_completed += 1;
        *self.result_counts.entry(result.result.clone()).or_insert(0) += 1;

        if result.is_failure() {
            self.failed = true;
            let detail = result.error.as_deref().unwrap_or("");
            let detail: String = detail.chars().take(MAX_LOGGED_ERROR).collect();
            info!(
                "Sink error: {} {}: {}",
                result.operation, result.result, detail
            );
        }
    }
}

struct Job {
    seq: usize,
    chunk: Chunk,
    reply: Sender<Result<Vec<ActionResult>>>,
}

/// A dispatched chunk whose results have not been delivered yet.
struct InFlight {
    seq: usize,
    operations: Vec<Operation>,
    reply: Receiver<Result<Vec<ActionResult>>>,
}

/// Streams actions into chunks and submits them to a sink from a fixed pool
/// of worker threads.
///
/// At most `threads + 1` chunks are in flight: once the window is full the
/// driver waits for the oldest chunk before dispatching another, so reading
/// never outruns the sink and results come back in submission order.
pub struct BoundedPipeline<'a, S: ?Sized> {
    sink: &'a S,
    config: PipelineConfig,
}

impl<'a, S: BulkSink + ?Sized> BoundedPipeline<'a, S> {
    pub fn new(sink: &'a S, config: PipelineConfig) -> Self {
        Self { sink, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run `actions` through the sink, calling `on_result` for each result in
    /// submission order.
    ///
    /// An error in `actions` stops reading; chunks already dispatched are
    /// still awaited and delivered before the error is returned. Check
    /// `state.failed` afterwards: per-action sink failures set it without
    /// producing an error.
    pub fn run<I, F>(&self, actions: I, state: &mut PipelineState, mut on_result: F) -> Result<()>
    where
        I: IntoIterator<Item = Result<Action>>,
        F: FnMut(&ActionResult, &PipelineState),
    {
        self.config.validate()?;

        let chunks = Chunker::new(
            actions.into_iter(),
            self.config.chunk_size,
            self.config.max_chunk_bytes,
        );

        let (job_tx, job_rx) = channel::bounded::<Job>(self.config.max_in_flight());

        thread::scope(|s| {
            for worker_id in 0..self.config.threads {
                let job_rx = job_rx.clone();
                let sink = self.sink;

                s.spawn(move || worker_loop(worker_id, sink, job_rx));
            }
            drop(job_rx);

            self.drive(chunks, job_tx, state, &mut on_result)
        })
    }

    fn drive<C, F>(
        &self,
        chunks: C,
        job_tx: Sender<Job>,
        state: &mut PipelineState,
        on_result: &mut F,
    ) -> Result<()>
    where
        C: Iterator<Item = Result<Chunk>>,
        F: FnMut(&ActionResult, &PipelineState),
    {
        let cap = self.config.max_in_flight();
        let mut in_flight: VecDeque<InFlight> = VecDeque::with_capacity(cap);
        let mut outcome = Ok(());

        for (seq, chunk) in chunks.enumerate() {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    error!("[bulk] reading actions failed: {e:#}");
                    state.failed = true;
                    outcome = Err(e);
                    break;
                }
            };

            while in_flight.len() >= cap {
                if let Some(oldest) = in_flight.pop_front() {
                    self.deliver(oldest, state, on_result);
                }
            }

            if let Err(e) = self.check_chunk_errors(state) {
                outcome = Err(e);
                break;
            }

            let (reply_tx, reply_rx) = channel::bounded(1);
            let len = chunk.len();
            let operations = chunk.operations();

            debug!("[bulk] dispatching chunk {seq}: {len} actions, {} bytes", chunk.bytes());

            let job = Job {
                seq,
                chunk,
                reply: reply_tx,
            };
            if job_tx.send(job).is_err() {
                state.failed = true;
                outcome = Err(anyhow!("all upload workers exited"));
                break;
            }

            state.chunks_submitted += 1;
            state.total_submitted += len;
            in_flight.push_back(InFlight {
                seq,
                operations,
                reply: reply_rx,
            });
            state.peak_in_flight = state.peak_in_flight.max(in_flight.len());
        }

        // Workers exit once the queue is empty and closed.
        drop(job_tx);

        while let Some(oldest) = in_flight.pop_front() {
            self.deliver(oldest, state, on_result);
        }

        if outcome.is_ok() {
            outcome = self.check_chunk_errors(state);
        }

        outcome
    }

    fn check_chunk_errors(&self, state: &mut PipelineState) -> Result<()> {
        match self.config.max_chunk_errors {
            Some(limit) if state.chunk_errors > limit => {
                state.failed = true;
                Err(anyhow!(
                    "{} chunks failed, more than the allowed {limit}",
                    state.chunk_errors
                ))
            }
            _ => Ok(()),
        }
    }

    /// Wait for `pending` and hand its results to the consumer.
    fn deliver<F>(&self, pending: InFlight, state: &mut PipelineState, on_result: &mut F)
    where
        F: FnMut(&ActionResult, &PipelineState),
    {
        let expected = pending.operations.len();

        let outcome = match pending.reply.recv() {
            Ok(Ok(results)) if results.len() == expected => Ok(results),
            Ok(Ok(results)) => Err(anyhow!(
                "sink returned {} results for {expected} actions",
                results.len()
            )),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(anyhow!("upload worker exited without a result")),
        };

        let results = match outcome {
            Ok(results) => results,
            Err(e) => {
                state.chunk_errors += 1;
                error!("[bulk] chunk {} failed: {e:#}", pending.seq);
                chunk_failure(&pending.operations, &e)
            }
        };

        state.chunks_completed += 1;

        for result in &results {
            state.record(result);
            on_result(result, state);
        }
    }
}

/// Results standing in for a chunk the sink could not process.
fn chunk_failure(operations: &[Operation], err: &Error) -> Vec<ActionResult> {
    let detail = format!("{err:#}");
    operations
        .iter()
        .map(|op| ActionResult::failed(*op, EXCEPTION_RESULT, detail.clone()))
        .collect()
}

fn worker_loop<S: BulkSink + ?Sized>(worker_id: usize, sink: &S, jobs: Receiver<Job>) {
    for job in jobs {
        debug!("[worker {worker_id}] submitting chunk {}", job.seq);

        let result = panic::catch_unwind(AssertUnwindSafe(|| sink.submit(&job.chunk)))
            .unwrap_or_else(|_| Err(anyhow!("sink panicked while submitting chunk {}", job.seq)));

        // The driver may have stopped listening only if it is itself unwinding.
        let _ = job.reply.send(result);
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
