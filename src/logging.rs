//! Exchange journal: one summary record per proxied request.
//!
//! Records live in a bounded ring buffer and, when a file is configured, are
//! appended to it as JSON lines. On startup the tail of an existing file is
//! loaded back so `recent` survives restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Instant;

use crate::router::{Backend, Route};
use crate::translate::openai_types::FinishReason;

const MAX_JOURNAL_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKind {
    Chat,
    Responses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub api: ApiKind,
    pub model: String,
    pub backend: Backend,
    pub backend_model: String,
    pub stream: bool,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub tool_calls: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ExchangeRecord {
    pub fn new(request_id: impl Into<String>, api: ApiKind, model: &str, route: &Route, stream: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: request_id.into(),
            api,
            model: model.to_string(),
            backend: route.backend,
            backend_model: route.model.clone(),
            stream,
            outcome: Outcome::Completed,
            finish_reason: None,
            tool_calls: 0,
            error: None,
            duration_ms: 0,
        }
    }

    pub fn completed(mut self, finish_reason: Option<FinishReason>, tool_calls: usize, started: Instant) -> Self {
        self.outcome = Outcome::Completed;
        self.finish_reason = finish_reason;
        self.tool_calls = tool_calls;
        self.duration_ms = elapsed_ms(started);
        self
    }

    pub fn failed(mut self, error: impl Into<String>, started: Instant) -> Self {
        self.outcome = Outcome::Failed;
        self.error = Some(error.into());
        self.duration_ms = elapsed_ms(started);
        self
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Ring buffer of exchange records, optionally backed by a JSONL file.
pub struct Journal {
    entries: VecDeque<ExchangeRecord>,
    file_path: Option<PathBuf>,
}

impl Journal {
    /// Load the tail of an existing journal file.
    pub fn open(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file_path = file_path.as_ref().to_path_buf();

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut journal = Self {
            entries: VecDeque::with_capacity(MAX_JOURNAL_ENTRIES),
            file_path: Some(file_path.clone()),
        };

        if file_path.exists() {
            let reader = BufReader::new(File::open(&file_path)?);
            for line in reader.lines().map_while(std::result::Result::ok) {
                if let Ok(entry) = serde_json::from_str::<ExchangeRecord>(&line) {
                    journal.push(entry);
                }
            }
        }

        Ok(journal)
    }

    pub fn in_memory() -> Self {
        Self {
            entries: VecDeque::new(),
            file_path: None,
        }
    }

    pub fn push(&mut self, entry: ExchangeRecord) {
        if self.entries.len() >= MAX_JOURNAL_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<ExchangeRecord> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Rewrite the file so it holds only what the ring buffer holds.
    pub fn compact(&self) -> std::io::Result<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        let mut writer = BufWriter::new(file);
        for entry in &self.entries {
            if let Ok(json) = serde_json::to_string(entry) {
                writeln!(writer, "{json}")?;
            }
        }
        writer.flush()
    }
}

enum JournalWrite {
    Line(String),
    Flush(mpsc::Sender<()>),
}

/// Appends journal lines on a dedicated thread so request handlers never
/// touch the file.
fn spawn_writer(path: &Path) -> std::io::Result<mpsc::Sender<JournalWrite>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let (tx, rx) = mpsc::channel::<JournalWrite>();

    std::thread::Builder::new()
        .name("journal-writer".to_string())
        .spawn(move || {
            let mut writer = BufWriter::new(file);
            for msg in rx {
                match msg {
                    JournalWrite::Line(line) => {
                        if let Err(e) = writeln!(writer, "{line}").and_then(|()| writer.flush()) {
                            tracing::warn!(error = %e, "failed to append to exchange journal");
                        }
                    }
                    JournalWrite::Flush(done) => {
                        if let Err(e) = writer.flush() {
                            tracing::warn!(error = %e, "failed to flush exchange journal");
                        }
                        let _ = done.send(());
                    }
                }
            }
        })?;

    Ok(tx)
}

#[derive(Clone)]
pub struct SharedJournal {
    entries: Arc<Mutex<Journal>>,
    writer: Option<mpsc::Sender<JournalWrite>>,
}

impl SharedJournal {
    pub fn open(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let journal = Journal::open(&file_path)?;
        journal.compact()?;
        let writer = spawn_writer(file_path.as_ref())?;
        Ok(Self {
            entries: Arc::new(Mutex::new(journal)),
            writer: Some(writer),
        })
    }

    pub fn memory() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Journal::in_memory())),
            writer: None,
        }
    }

    /// Emit the record as a tracing event, keep it in the ring and queue it
    /// for the file. Never blocks on disk.
    pub fn record(&self, entry: ExchangeRecord) {
        tracing::info!(
            request_id = %entry.request_id,
            api = ?entry.api,
            model = %entry.model,
            backend = %entry.backend,
            stream = entry.stream,
            outcome = ?entry.outcome,
            finish_reason = ?entry.finish_reason,
            tool_calls = entry.tool_calls,
            duration_ms = entry.duration_ms,
            "exchange"
        );
        if let Some(writer) = &self.writer {
            match serde_json::to_string(&entry) {
                Ok(line) => {
                    if writer.send(JournalWrite::Line(line)).is_err() {
                        tracing::warn!("exchange journal writer has stopped");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to serialize exchange record"),
            }
        }
        if let Ok(mut journal) = self.entries.lock() {
            journal.push(entry);
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<ExchangeRecord> {
        self.entries.lock().map(|j| j.recent(limit)).unwrap_or_default()
    }

    /// Block until every queued line is on disk. Call from a blocking context.
    pub fn flush(&self) {
        let Some(writer) = &self.writer else {
            return;
        };
        let (done_tx, done_rx) = mpsc::channel();
        if writer.send(JournalWrite::Flush(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Route {
        Route {
            backend: Backend::Gemini,
            model: "gemini-2.5-pro".to_string(),
        }
    }

    fn record(id: &str) -> ExchangeRecord {
        ExchangeRecord::new(id, ApiKind::Chat, "google/gemini-2.5-pro", &route(), false).completed(
            Some(FinishReason::Stop),
            0,
            Instant::now(),
        )
    }

    #[test]
    fn test_recent_is_newest_first() {
        let journal = SharedJournal::memory();
        journal.record(record("a"));
        journal.record(record("b"));
        let recent = journal.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].request_id, "b");
        assert_eq!(journal.recent(1).len(), 1);
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");

        let journal = SharedJournal::open(&path).unwrap();
        journal.record(record("a"));
        journal.record(
            ExchangeRecord::new("b", ApiKind::Responses, "claude-opus-4.5", &route(), true)
                .failed("upstream 529", Instant::now()),
        );
        journal.flush();
        drop(journal);

        let reopened = SharedJournal::open(&path).unwrap();
        let recent = reopened.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].outcome, Outcome::Failed);
        assert_eq!(recent[0].error.as_deref(), Some("upstream 529"));
        assert_eq!(recent[1].finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn test_journal_lines_are_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("journal.jsonl");
        let journal = SharedJournal::open(&path).unwrap();
        journal.record(record("a"));
        journal.flush();

        let content = std::fs::read_to_string(&path).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(line["api"], "chat");
        assert_eq!(line["backend"], "gemini");
        assert_eq!(line["outcome"], "completed");
    }

    #[tokio::test]
    async fn test_record_from_async_handler_reaches_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let journal = SharedJournal::open(&path).unwrap();

        let handles: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|id| {
                let journal = journal.clone();
                tokio::spawn(async move { journal.record(record(id)) })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(journal.recent(10).len(), 3);

        let flushed = journal.clone();
        tokio::task::spawn_blocking(move || flushed.flush()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut ids: Vec<String> = content
            .lines()
            .map(|l| serde_json::from_str::<ExchangeRecord>(l).unwrap().request_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
