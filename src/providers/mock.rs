/*!
 * Mock backends for testing.
 *
 * `MockTranslator` simulates an NMT service:
 * - `MockTranslator::working()` - Always succeeds, tagging text with the target language
 * - `MockTranslator::failing_on(needle)` - Fails for every unit containing `needle`
 * - `MockTranslator::intermittent(n)` - Fails every nth request
 * - `MockTranslator::mangling()` - Succeeds but damages placeholder tokens
 * - `MockTranslator::dropping()` - Succeeds but loses placeholder tokens
 * - `MockTranslator::failing()` - Always fails with an error
 *
 * `MockGateway` simulates a completion backend and records every call.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::{ChatMessage, CompletionGateway, MachineTranslator, Role};
use crate::translation::glossary::strip_placeholders;

/// Behavior mode for the mock translator
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails for units containing the given text
    FailOnText(String),
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Succeeds but rewrites `__PH_0__` as `__ ph_0 __`
    Mangling,
    /// Succeeds but drops placeholder tokens
    Dropping,
    /// Always fails with an error
    Failing,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock NMT backend
#[derive(Debug)]
pub struct MockTranslator {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
    /// Texts received, in call order
    requests: Arc<Mutex<Vec<String>>>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&str, &str, &str) -> String>,
}

impl MockTranslator {
    /// Create a new mock translator with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing_on(needle: impl Into<String>) -> Self {
        Self::new(MockBehavior::FailOnText(needle.into()))
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent {
            fail_every: fail_every.max(1),
        })
    }

    pub fn mangling() -> Self {
        Self::new(MockBehavior::Mangling)
    }

    pub fn dropping() -> Self {
        Self::new(MockBehavior::Dropping)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom response generator taking `(text, source, target)`
    pub fn with_custom_response(mut self, generator: fn(&str, &str, &str) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Texts received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn render(&self, text: &str, source: &str, target: &str) -> String {
        match self.custom_response {
            Some(generator) => generator(text, source, target),
            None => format!("[{}] {}", target, text),
        }
    }
}

impl Clone for MockTranslator {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior.clone(),
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
            custom_response: self.custom_response,
        }
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate_unit(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(text.to_string());

        match &self.behavior {
            MockBehavior::Working => Ok(self.render(text, source_language, target_language)),

            MockBehavior::FailOnText(needle) => {
                if text.contains(needle.as_str()) {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated failure for '{}'", needle),
                        status_code: 503,
                    })
                } else {
                    Ok(self.render(text, source_language, target_language))
                }
            }

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(self.render(text, source_language, target_language))
                }
            }

            MockBehavior::Mangling => {
                let rendered = self.render(text, source_language, target_language);
                Ok(rendered.replace("__PH_", "__ ph_").replace("__.", " __."))
            }

            MockBehavior::Dropping => {
                let rendered = self.render(text, source_language, target_language);
                Ok(strip_placeholders(&rendered).split_whitespace().collect::<Vec<_>>().join(" "))
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(*delay_ms)).await;
                Ok(self.render(text, source_language, target_language))
            }
        }
    }
}

/// A completion call captured by `MockGateway`
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f32,
    pub api_key: String,
}

impl RecordedCall {
    /// Content of the system message, if any
    pub fn system(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Content of the last user message
    pub fn last_user(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Fixed(String),
    Echo,
    Fail(ProviderError),
}

/// Mock completion backend
#[derive(Debug, Clone)]
pub struct MockGateway {
    /// Reply used once the script is exhausted
    fallback: Reply,
    /// Replies consumed in order before the fallback
    script: Arc<Mutex<VecDeque<Result<String, ProviderError>>>>,
    /// Calls received, in order
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockGateway {
    fn with_fallback(fallback: Reply) -> Self {
        Self {
            fallback,
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always replies with `text`
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_fallback(Reply::Fixed(text.into()))
    }

    /// Replies with the last user message
    pub fn echo() -> Self {
        Self::with_fallback(Reply::Echo)
    }

    /// Always fails with `error`
    pub fn failing(error: ProviderError) -> Self {
        Self::with_fallback(Reply::Fail(error))
    }

    /// Queue replies consumed before the fallback
    pub fn with_script(self, replies: Vec<Result<String, ProviderError>>) -> Self {
        self.script.lock().extend(replies);
        self
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl CompletionGateway for MockGateway {
    async fn send(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
        api_key: &str,
    ) -> Result<String, ProviderError> {
        let call = RecordedCall {
            messages: messages.to_vec(),
            model: model.to_string(),
            temperature,
            api_key: api_key.to_string(),
        };
        let echoed = call.last_user().unwrap_or_default().to_string();
        self.calls.lock().push(call);

        if let Some(reply) = self.script.lock().pop_front() {
            return reply;
        }

        match &self.fallback {
            Reply::Fixed(text) => Ok(text.clone()),
            Reply::Echo => Ok(echoed),
            Reply::Fail(error) => Err(error.clone()),
        }
    }
}
