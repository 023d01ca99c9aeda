use std::collections::VecDeque;
use log::info;

pub const MAX_LOG_ENTRIES: usize = 500;

/// Numbered, on-screen log. Entries are mirrored to the `log` facade.
#[derive(Debug)]
pub struct LogBox {
    entries: VecDeque<String>,
    next_number: u64,
}

impl LogBox {
    pub fn new() -> Self {
        LogBox { entries: VecDeque::new(), next_number: 1 }
    }

    pub fn push(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        info!(target: "logbox", "{}", text);

        if self.entries.len() == MAX_LOG_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(format!("#{}> {}", self.next_number, text));
        self.next_number += 1;
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Number of entries ever pushed, including dropped ones.
    pub fn total(&self) -> u64 {
        self.next_number - 1
    }
}

impl Default for LogBox {
    fn default() -> Self {
        LogBox::new()
    }
}
