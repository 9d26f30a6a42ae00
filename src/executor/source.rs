//! Row sources
//!
//! Every source follows the open/next/close protocol. `ChannelSource` runs
//! its producer as a background task feeding a bounded channel, so a slow
//! consumer applies backpressure to the producer.

use std::future::Future;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::EvalConfig;

use super::error::{ExecutorResult, SourceError};
use super::row::Row;
use super::schema::Schema;

/// Volcano-style row iterator
///
/// - `open()`: start producing rows
/// - `next()`: return the next row, or None if exhausted
/// - `close()`: release resources; safe to call more than once
#[async_trait]
pub trait RowSource: Send {
    async fn open(&mut self) -> ExecutorResult<()>;

    async fn next(&mut self) -> ExecutorResult<Option<Row>>;

    async fn close(&mut self) -> ExecutorResult<()>;
}

/// Source over an in-memory row vector
pub struct MemorySource {
    rows: Vec<Row>,
    position: usize,
    opened: bool,
}

impl MemorySource {
    pub fn new(rows: Vec<Row>) -> Self {
        MemorySource {
            rows,
            position: 0,
            opened: false,
        }
    }
}

#[async_trait]
impl RowSource for MemorySource {
    async fn open(&mut self) -> ExecutorResult<()> {
        self.position = 0;
        self.opened = true;
        Ok(())
    }

    async fn next(&mut self) -> ExecutorResult<Option<Row>> {
        if !self.opened {
            return Err(SourceError::Closed.into());
        }
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    async fn close(&mut self) -> ExecutorResult<()> {
        self.opened = false;
        Ok(())
    }
}

/// Sending half handed to a `ChannelSource` producer
pub type RowSender = mpsc::Sender<ExecutorResult<Row>>;

type Spawner = Box<dyn FnOnce(RowSender) -> JoinHandle<ExecutorResult<()>> + Send>;

/// Source fed by a background producer task
///
/// The producer sends rows (or errors) and returns when done. An error it
/// returns is reported after the rows it already sent. Closing or dropping
/// the source aborts a producer that is still running.
pub struct ChannelSource {
    capacity: usize,
    spawner: Option<Spawner>,
    rx: Option<mpsc::Receiver<ExecutorResult<Row>>>,
    handle: Option<JoinHandle<ExecutorResult<()>>>,
}

impl ChannelSource {
    pub fn new<F, Fut>(capacity: usize, producer: F) -> Self
    where
        F: FnOnce(RowSender) -> Fut + Send + 'static,
        Fut: Future<Output = ExecutorResult<()>> + Send + 'static,
    {
        ChannelSource {
            capacity: capacity.max(1),
            spawner: Some(Box::new(move |tx| tokio::spawn(producer(tx)))),
            rx: None,
            handle: None,
        }
    }

    /// Whether the producer task is still alive
    pub fn is_producing(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn abort_producer(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                debug!("Aborting row producer");
            }
            handle.abort();
        }
    }

    /// Wait for the producer once the channel has drained
    async fn join_producer(&mut self) -> ExecutorResult<Option<Row>> {
        let Some(handle) = self.handle.take() else {
            return Ok(None);
        };
        match handle.await {
            Ok(result) => result.map(|_| None),
            Err(e) => Err(SourceError::ProducerFailed(e.to_string()).into()),
        }
    }
}

#[async_trait]
impl RowSource for ChannelSource {
    async fn open(&mut self) -> ExecutorResult<()> {
        let spawner = self.spawner.take().ok_or(SourceError::Closed)?;
        let (tx, rx) = mpsc::channel(self.capacity);
        self.handle = Some(spawner(tx));
        self.rx = Some(rx);
        Ok(())
    }

    async fn next(&mut self) -> ExecutorResult<Option<Row>> {
        let rx = self.rx.as_mut().ok_or(SourceError::Closed)?;
        match rx.recv().await {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => {
                self.abort_producer();
                Err(e)
            }
            None => self.join_producer().await,
        }
    }

    async fn close(&mut self) -> ExecutorResult<()> {
        self.abort_producer();
        self.rx = None;
        Ok(())
    }
}

impl Drop for ChannelSource {
    fn drop(&mut self) {
        self.abort_producer();
    }
}

/// Replays a comma-separated sales file through a `ChannelSource`
///
/// One row per line; blank lines are skipped, as is a header line
/// starting with `cust`.
pub struct ReplaySource {
    path: PathBuf,
    inner: ChannelSource,
}

impl ReplaySource {
    pub fn new(path: impl AsRef<Path>, schema: Schema, config: &EvalConfig) -> Self {
        let path = path.as_ref().to_path_buf();
        let producer_path = path.clone();
        let inner = ChannelSource::new(config.channel_capacity, move |tx| {
            replay(producer_path, schema, tx)
        });
        ReplaySource { path, inner }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RowSource for ReplaySource {
    async fn open(&mut self) -> ExecutorResult<()> {
        debug!(path = %self.path.display(), "Opening replay source");
        self.inner.open().await
    }

    async fn next(&mut self) -> ExecutorResult<Option<Row>> {
        self.inner.next().await
    }

    async fn close(&mut self) -> ExecutorResult<()> {
        self.inner.close().await
    }
}

async fn replay(path: PathBuf, schema: Schema, tx: RowSender) -> ExecutorResult<()> {
    let file = File::open(&path).await.map_err(SourceError::from)?;
    let mut lines = BufReader::new(file).lines();

    let mut line_no = 0;
    let mut rows = 0u64;
    let mut seen_content = false;
    while let Some(line) = lines.next_line().await.map_err(SourceError::from)? {
        line_no += 1;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if !seen_content {
            seen_content = true;
            if text.starts_with("cust") {
                continue;
            }
        }

        let row = schema.decode_line(text, line_no)?;
        if tx.send(Ok(row)).await.is_err() {
            warn!(path = %path.display(), line = line_no, "Row consumer went away, stopping replay");
            return Ok(());
        }
        rows += 1;
    }

    debug!(path = %path.display(), rows, "Replay finished");
    Ok(())
}
