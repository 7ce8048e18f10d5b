use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, SessionError};
use crate::events::{StoredSession, Turn};
use crate::llm::TextGenerator;
use crate::memory::WindowMemory;
use crate::prompts::PromptTemplate;
use crate::settings::Settings;

/// A prompt handed out by [`ChatSession::begin_submission`], to be returned
/// with the generator's result.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub input: String,
    pub prompt: String,
    pub settings: Settings,
}

/// All mutable chat state: the two index-aligned turn lists, the memory
/// window, the live settings and the archived transcripts.
#[derive(Debug, Clone)]
pub struct ChatSession {
    template: PromptTemplate,
    settings: Settings,
    memory: WindowMemory,
    user_history: Vec<String>,
    generated_history: Vec<String>,
    stored: Vec<StoredSession>,
    in_flight: bool,
}

impl ChatSession {
    pub fn new(template: PromptTemplate, settings: Settings) -> Self {
        Self {
            template,
            memory: WindowMemory::new(settings.memory_k),
            settings,
            user_history: Vec::new(),
            generated_history: Vec::new(),
            stored: Vec::new(),
            in_flight: false,
        }
    }

    pub fn with_stored(mut self, stored: Vec<StoredSession>) -> Self {
        self.stored = stored;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn memory(&self) -> &WindowMemory {
        &self.memory
    }

    #[cfg(test)]
    pub fn user_history(&self) -> &[String] {
        &self.user_history
    }

    #[cfg(test)]
    pub fn generated_history(&self) -> &[String] {
        &self.generated_history
    }

    pub fn stored(&self) -> &[StoredSession] {
        &self.stored
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    pub fn is_empty(&self) -> bool {
        self.user_history.is_empty()
    }

    /// Turns in display order.
    pub fn turns(&self) -> Vec<Turn> {
        self.user_history
            .iter()
            .zip(&self.generated_history)
            .flat_map(|(input, reply)| [Turn::human(input.clone()), Turn::ai(reply.clone())])
            .collect()
    }

    /// Validate `input`, fill the template from memory and mark the session busy.
    pub fn begin_submission(&mut self, input: &str) -> Result<PendingRequest, SessionError> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        if input.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }

        let prompt = self.template.render(&self.memory.buffer(), input);
        self.in_flight = true;
        debug!(input_len = input.len(), window = self.memory.len(), "submission started");

        Ok(PendingRequest {
            input: input.to_string(),
            prompt,
            settings: self.settings,
        })
    }

    /// Record the outcome of a pending request. A reply appends exactly one
    /// entry to each list; a failure appends nothing.
    pub fn complete_submission(
        &mut self,
        pending: PendingRequest,
        result: Result<String, ProviderError>,
    ) -> Result<(), SessionError> {
        if !self.in_flight {
            return Err(SessionError::NotBusy);
        }
        self.in_flight = false;

        let reply = result.inspect_err(|e| warn!(error = %e, "generation failed"))?;
        self.memory.push(pending.input.clone(), reply.clone());
        self.user_history.push(pending.input);
        self.generated_history.push(reply);
        debug!(turns = self.user_history.len(), "exchange recorded");
        Ok(())
    }

    /// Run one full exchange against `generator`.
    pub async fn submit(
        &mut self,
        generator: &dyn TextGenerator,
        input: &str,
    ) -> Result<&str, SessionError> {
        let pending = self.begin_submission(input)?;
        let result = generator.generate(&pending.prompt, &pending.settings).await;
        self.complete_submission(pending, result)?;
        Ok(self.generated_history.last().map(String::as_str).unwrap_or_default())
    }

    /// Clear both turn lists and the memory window.
    pub fn reset(&mut self) {
        self.user_history.clear();
        self.generated_history.clear();
        self.memory.clear();
        info!("session reset");
    }

    /// Replace the live settings. Always starts a fresh session.
    pub fn apply_settings(&mut self, settings: Settings) {
        if settings != self.settings {
            info!(?settings, "settings changed");
        }
        if !self.memory.is_empty() {
            debug!(dropped = self.memory.len(), "clearing memory window");
        }
        self.settings = settings;
        self.memory.resize(settings.memory_k);
        self.memory.clear();
        self.user_history.clear();
        self.generated_history.clear();
    }

    /// Archive the current transcript. Returns `None` when there is nothing
    /// to save.
    pub fn save(&mut self, now: DateTime<Local>) -> Option<&StoredSession> {
        if self.is_empty() {
            return None;
        }
        let transcript = format_transcript(now, &self.user_history, &self.generated_history);
        self.stored.push(StoredSession::new(transcript, self.user_history.len()));
        info!(stored = self.stored.len(), "session saved");
        self.stored.last()
    }

    pub fn delete_stored(&mut self) {
        self.stored.clear();
        info!("stored sessions deleted");
    }

    /// Current conversation as downloadable text, `None` when empty.
    pub fn transcript(&self, now: DateTime<Local>) -> Option<String> {
        (!self.is_empty())
            .then(|| format_transcript(now, &self.user_history, &self.generated_history))
    }

    /// All stored sessions as downloadable text, `None` when there are none.
    pub fn stored_transcript(&self) -> Option<String> {
        (!self.stored.is_empty()).then(|| join_stored(&self.stored))
    }
}

/// Timestamp line followed by `\nHuman: ..` / `\nAI: ..` entries.
pub fn format_transcript(now: DateTime<Local>, user: &[String], generated: &[String]) -> String {
    let entries: Vec<String> = user
        .iter()
        .zip(generated)
        .flat_map(|(input, reply)| [format!("\nHuman: {input}"), format!("\nAI: {reply}")])
        .collect();
    format!("{}\n{}", now.format("%m/%d/%Y, %H:%M"), entries.join("\n"))
}

pub fn join_stored(stored: &[StoredSession]) -> String {
    stored
        .iter()
        .map(|s| s.transcript.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<Vec<Result<String, ProviderError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, prompt: &str, _settings: &Settings) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("default".to_string()))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn session() -> ChatSession {
        ChatSession::new(PromptTemplate::new("{history}|{input}").unwrap(), Settings::default())
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap()
    }

    #[tokio::test]
    async fn submit_appends_one_entry_to_each_list() {
        let generator = Scripted::new(vec![Ok("Hi!".to_string())]);
        let mut s = session();
        let reply = s.submit(&generator, "Hello").await.unwrap().to_string();
        assert_eq!(reply, "Hi!");
        assert_eq!(s.user_history(), ["Hello"]);
        assert_eq!(s.generated_history(), ["Hi!"]);
        assert!(!s.is_busy());
    }

    #[tokio::test]
    async fn reset_clears_lists_and_memory() {
        let generator = Scripted::new(vec![]);
        let mut s = session();
        s.submit(&generator, "Hello").await.unwrap();
        s.reset();
        assert!(s.user_history().is_empty());
        assert!(s.generated_history().is_empty());
        assert!(s.memory().is_empty());
    }

    #[tokio::test]
    async fn blank_input_rejected_without_side_effects() {
        let generator = Scripted::new(vec![]);
        let mut s = session();
        assert!(matches!(s.submit(&generator, "   ").await, Err(SessionError::EmptyInput)));
        assert!(s.is_empty());
        assert!(!s.is_busy());
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn second_submission_refused_while_in_flight() {
        let mut s = session();
        let pending = s.begin_submission("one").unwrap();
        assert!(matches!(s.begin_submission("two"), Err(SessionError::Busy)));
        s.complete_submission(pending, Ok("r".to_string())).unwrap();
        assert!(s.begin_submission("two").is_ok());
    }

    #[test]
    fn completing_without_request_is_an_error() {
        let mut s = session();
        let pending = PendingRequest {
            input: "x".to_string(),
            prompt: "x".to_string(),
            settings: Settings::default(),
        };
        assert!(matches!(
            s.complete_submission(pending, Ok("y".to_string())),
            Err(SessionError::NotBusy)
        ));
        assert!(s.is_empty());
    }

    #[tokio::test]
    async fn failure_keeps_lists_aligned() {
        let generator = Scripted::new(vec![Ok("a".to_string()), Err(ProviderError::RateLimited)]);
        let mut s = session();
        s.submit(&generator, "first").await.unwrap();
        let err = s.submit(&generator, "second").await.unwrap_err();
        assert!(matches!(err, SessionError::Generation(ProviderError::RateLimited)));
        assert_eq!(s.user_history().len(), s.generated_history().len());
        assert_eq!(s.user_history(), ["first"]);
        assert_eq!(s.memory().len(), 1);
        assert!(!s.is_busy());
    }

    #[tokio::test]
    async fn prompt_replays_memory_window() {
        let generator = Scripted::new(vec![]);
        let mut s = session();
        s.apply_settings(Settings { memory_k: 1, ..Settings::default() });
        s.submit(&generator, "q1").await.unwrap();
        s.submit(&generator, "q2").await.unwrap();
        s.submit(&generator, "q3").await.unwrap();
        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts[0], "|q1");
        assert_eq!(prompts[1], "Human: q1\nAI: default|q2");
        assert_eq!(prompts[2], "Human: q2\nAI: default|q3");
        assert_eq!(s.memory().len(), 1);
        assert_eq!(s.user_history().len(), 3);
    }

    #[tokio::test]
    async fn changing_settings_clears_session_and_memory() {
        let generator = Scripted::new(vec![]);
        let mut s = session();
        s.submit(&generator, "Hello").await.unwrap();
        let new = Settings { temperature: 0.7, memory_k: 5, ..Settings::default() };
        s.apply_settings(new);
        assert!(s.is_empty());
        assert!(s.generated_history().is_empty());
        assert!(s.memory().is_empty());
        assert_eq!(s.memory().k(), 5);
        assert_eq!(s.settings(), &new);
    }

    #[tokio::test]
    async fn shrunk_window_applies_to_next_prompts() {
        let generator = Scripted::new(vec![]);
        let mut s = session();
        s.submit(&generator, "old").await.unwrap();
        s.apply_settings(Settings { memory_k: 0, ..Settings::default() });
        assert_eq!(s.memory().k(), 0);
        s.submit(&generator, "q1").await.unwrap();
        s.submit(&generator, "q2").await.unwrap();
        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts[2], "|q2");
        assert!(s.memory().is_empty());
    }

    #[test]
    fn transcript_format() {
        let user = vec!["Hello".to_string(), "Bye".to_string()];
        let ai = vec!["Hi".to_string(), "Ciao".to_string()];
        assert_eq!(
            format_transcript(fixed_now(), &user, &ai),
            "03/05/2024, 14:07\n\nHuman: Hello\n\nAI: Hi\n\nHuman: Bye\n\nAI: Ciao"
        );
    }

    #[tokio::test]
    async fn save_and_delete_stored_sessions() {
        let generator = Scripted::new(vec![]);
        let mut s = session();
        assert!(s.save(fixed_now()).is_none());
        assert!(s.stored_transcript().is_none());
        assert!(s.transcript(fixed_now()).is_none());

        s.submit(&generator, "one").await.unwrap();
        s.save(fixed_now()).unwrap();
        s.reset();
        s.submit(&generator, "two").await.unwrap();
        s.save(fixed_now()).unwrap();

        assert_eq!(s.stored().len(), 2);
        let all = s.stored_transcript().unwrap();
        assert_eq!(
            all,
            "03/05/2024, 14:07\n\nHuman: one\n\nAI: default\n\n03/05/2024, 14:07\n\nHuman: two\n\nAI: default"
        );

        s.delete_stored();
        assert!(s.stored().is_empty());
        assert_eq!(s.user_history(), ["two"]);
    }

    #[tokio::test]
    async fn saved_session_counts_exchanges_not_markers() {
        let generator = Scripted::new(vec![]);
        let mut s = session();
        s.submit(&generator, "quote:\nHuman: hi\nHuman: there").await.unwrap();
        s.submit(&generator, "second").await.unwrap();
        assert_eq!(s.save(fixed_now()).unwrap().exchanges, 2);
    }

    #[tokio::test]
    async fn turns_interleave_speakers() {
        let generator = Scripted::new(vec![Ok("Hi".to_string())]);
        let mut s = session();
        s.submit(&generator, "Hello").await.unwrap();
        assert_eq!(s.turns(), vec![Turn::human("Hello"), Turn::ai("Hi")]);
    }
}
