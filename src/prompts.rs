use crate::error::PromptError;

const HISTORY_SLOT: &str = "{history}";
const INPUT_SLOT: &str = "{input}";

/// Template used when the config does not point at a custom one.
pub const DEFAULT_TEMPLATE: &str = r#"
Below is a conversation between a Human and a helpful and polite AI Assistant.  The AI gives responses that are both precise and concise.  If the AI does not know the answer to the Human's query, the AI will NOT guess, but will simply reply "I don't know".
{history}
>>QUESTION<<{input}
>>ANSWER<<
"#;

/// Markers after which Falcon's output is discarded.
pub const STOP_SEQUENCES: &[&str] = &[
    "User",
    ">>COMMENT<<",
    ">>QUESTION<<",
    ">>ANSWER<<",
    ">>TITLE<<",
];

/// Canned prompts the user can drop into the input box.
pub const EXAMPLE_PROMPTS: &[&str] = &[
    r#"Give me a synopsis of the movie "Up""#,
    "How do I make a sandwich?",
    "What's the difference between nuclear fission and nuclear fusion?",
];

/// Prompt with exactly one `{history}` and one `{input}` slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { template: DEFAULT_TEMPLATE.to_string() }
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, PromptError> {
        let template = template.into();
        for (slot, name) in [(HISTORY_SLOT, "history"), (INPUT_SLOT, "input")] {
            match template.matches(slot).count() {
                0 => return Err(PromptError::MissingSlot(name)),
                1 => {}
                _ => return Err(PromptError::DuplicateSlot(name)),
            }
        }
        Ok(Self { template })
    }

    /// Substitute both slots. The input is spliced in last, so user text
    /// containing `{history}` is left untouched.
    pub fn render(&self, history: &str, input: &str) -> String {
        let (head, tail) = self
            .template
            .split_once(INPUT_SLOT)
            .unwrap_or((self.template.as_str(), ""));
        let head = head.replacen(HISTORY_SLOT, history, 1);
        let tail = tail.replacen(HISTORY_SLOT, history, 1);
        format!("{head}{input}{tail}")
    }
}

/// Cut generated text at the earliest stop sequence.
pub fn enforce_stop_sequences<'a>(text: &'a str, stops: &[&str]) -> &'a str {
    let cut = stops
        .iter()
        .filter(|stop| !stop.is_empty())
        .filter_map(|stop| text.find(stop))
        .min()
        .unwrap_or(text.len());
    &text[..cut]
}
