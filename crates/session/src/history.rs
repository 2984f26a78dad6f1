use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    wayfinder_common::ActionCommand,
};

/// How a recorded command came to run (or not).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Approved,
    Rejected,
    Modified,
    Replayed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Stable position in the history; the replay key.
    pub index: usize,
    pub command: ActionCommand,
    pub timestamp: DateTime<Utc>,
    pub disposition: Disposition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_command: Option<ActionCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Append-only command log. Entries are never removed or reordered, so an
/// index stays valid for the life of the session.
#[derive(Debug, Default)]
pub struct CommandHistory {
    entries: Vec<HistoryEntry>,
}

impl CommandHistory {
    /// Append an entry and return its index.
    pub fn record(&mut self, command: ActionCommand, disposition: Disposition) -> usize {
        self.push(command, disposition, None, None)
    }

    pub fn record_modified(
        &mut self,
        command: ActionCommand,
        original: ActionCommand,
        feedback: String,
    ) -> usize {
        self.push(
            command,
            Disposition::Modified,
            Some(original),
            Some(feedback),
        )
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(
        &mut self,
        command: ActionCommand,
        disposition: Disposition,
        original_command: Option<ActionCommand>,
        feedback: Option<String>,
    ) -> usize {
        let index = self.entries.len();
        self.entries.push(HistoryEntry {
            index,
            command,
            timestamp: Utc::now(),
            disposition,
            original_command,
            feedback,
        });
        index
    }
}
