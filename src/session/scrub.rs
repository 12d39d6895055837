use regex::Regex;

use super::history::HistoryEntry;
use super::tape::SessionTape;

/// Redacts credentials from captured terminal text before it is persisted or shared.
#[derive(Debug, Clone)]
pub struct ScrubConfig {
    patterns: Vec<Regex>,
}

impl ScrubConfig {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    pub fn default_patterns() -> Vec<Regex> {
        // The `regex` crate has no look-behind; keep patterns simple.
        let raw = [
            r"sk-[A-Za-z0-9]{10,}",
            r"gh[pousr]_[A-Za-z0-9]{20,}",
            r"AKIA[0-9A-Z]{16}",
            r"Bearer\s+[A-Za-z0-9._-]{10,}",
            r"(?i)(password|passwd|secret|token|api[_-]?key)\s*[=:]\s*\S{6,}",
        ];
        raw.into_iter().filter_map(|p| Regex::new(p).ok()).collect()
    }

    pub fn default_shareable() -> Self {
        Self::new(Self::default_patterns())
    }

    pub fn scrub_string(&self, input: &str) -> String {
        let mut out = input.to_string();
        for re in &self.patterns {
            out = re.replace_all(&out, "[REDACTED]").into_owned();
        }
        out
    }

    pub fn scrub_entry(&self, entry: &mut HistoryEntry) {
        entry.data = self.scrub_string(&entry.data);
    }

    pub fn scrub_tape(&self, tape: &mut SessionTape) {
        for event in &mut tape.events {
            let Some(data) = event.payload.get_mut("data") else {
                continue;
            };
            if let Some(text) = data.as_str() {
                *data = self.scrub_string(text).into();
            }
        }
    }
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self::default_shareable()
    }
}
