//! Sliding-window conversation memory.
//!
//! Keeps the last `k` exchanges (one human input plus the reply to it) and
//! renders them as `Human:` / `AI:` lines for the prompt's `{history}` slot.

use std::collections::VecDeque;

use crate::events::{Speaker, Turn};

#[derive(Debug, Clone)]
pub struct WindowMemory {
    k: usize,
    exchanges: VecDeque<(String, String)>,
}

impl WindowMemory {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            exchanges: VecDeque::with_capacity(k),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Record a completed exchange, evicting the oldest past the window.
    pub fn push(&mut self, input: impl Into<String>, reply: impl Into<String>) {
        if self.k == 0 {
            return;
        }
        self.exchanges.push_back((input.into(), reply.into()));
        while self.exchanges.len() > self.k {
            self.exchanges.pop_front();
        }
    }

    /// Change the window length, dropping the oldest exchanges if it shrinks.
    pub fn resize(&mut self, k: usize) {
        self.k = k;
        while self.exchanges.len() > k {
            self.exchanges.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Retained turns, oldest first.
    pub fn turns(&self) -> Vec<Turn> {
        self.exchanges
            .iter()
            .flat_map(|(input, reply)| [Turn::human(input.clone()), Turn::ai(reply.clone())])
            .collect()
    }

    /// Text substituted into the template's `{history}` slot.
    pub fn buffer(&self) -> String {
        self.turns()
            .iter()
            .map(|turn| format_line(turn.speaker, &turn.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn format_line(speaker: Speaker, text: &str) -> String {
    format!("{}: {}", speaker.prefix(), text)
}
