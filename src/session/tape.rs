//! Portable JSONL export of a recorded session log.
//!
//! The first line is a header; every following line carries one log event.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::eventlog::{session_log_key, EventLogStore, LogEvent, NewEvent};
use crate::util::now_ms;

pub const SESSION_TAPE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SessionTapeJsonlLine {
    Header {
        schema_version: u32,
        created_at_ms: u64,
        session_id: String,
    },
    Event {
        event: LogEvent,
    },
}

#[derive(Debug, Clone)]
pub struct SessionTape {
    pub schema_version: u32,
    pub created_at_ms: u64,
    pub session_id: String,
    pub events: Vec<LogEvent>,
}

impl SessionTape {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            schema_version: SESSION_TAPE_SCHEMA_VERSION,
            created_at_ms: now_ms(),
            session_id: session_id.into(),
            events: Vec::new(),
        }
    }

    /// Snapshot the stored log of `session_id`
    pub fn export(store: &dyn EventLogStore, session_id: &str) -> Self {
        let mut tape = Self::new(session_id);
        tape.events = store.read(&session_log_key(session_id));
        tape
    }

    /// Append the tape's events into the log of `session_id`.
    /// Returns how many events were new to that log.
    pub fn import_into(&self, store: &dyn EventLogStore, session_id: &str) -> usize {
        let key = session_log_key(session_id);
        let before = store.read(&key).len();
        for event in &self.events {
            store.append(&key, NewEvent::from(event.clone()));
        }
        store.read(&key).len().saturating_sub(before)
    }

    pub fn write_jsonl_to_path(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let header = SessionTapeJsonlLine::Header {
            schema_version: self.schema_version,
            created_at_ms: self.created_at_ms,
            session_id: self.session_id.clone(),
        };
        writeln!(
            writer,
            "{}",
            serde_json::to_string(&header).map_err(io::Error::other)?
        )?;
        for event in &self.events {
            let line = SessionTapeJsonlLine::Event {
                event: event.clone(),
            };
            writeln!(
                writer,
                "{}",
                serde_json::to_string(&line).map_err(io::Error::other)?
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_jsonl_from_path(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut header: Option<(u32, u64, String)> = None;
        let mut events = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: SessionTapeJsonlLine =
                serde_json::from_str(&line).map_err(|e| io::Error::other(format!("{e}")))?;
            match parsed {
                SessionTapeJsonlLine::Header {
                    schema_version,
                    created_at_ms,
                    session_id,
                } => {
                    if idx != 0 {
                        return Err(io::Error::other("tape header must be the first JSONL line"));
                    }
                    if schema_version > SESSION_TAPE_SCHEMA_VERSION {
                        return Err(io::Error::other(format!(
                            "unsupported tape schema version {schema_version}"
                        )));
                    }
                    header = Some((schema_version, created_at_ms, session_id));
                }
                SessionTapeJsonlLine::Event { event } => events.push(event),
            }
        }

        let (schema_version, created_at_ms, session_id) =
            header.ok_or_else(|| io::Error::other("missing tape header"))?;

        Ok(Self {
            schema_version,
            created_at_ms,
            session_id,
            events,
        })
    }
}
