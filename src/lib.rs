/*!
 * # sinoprompt - Chinese prompt optimizer
 *
 * A Rust library that sends LLM system prompts in Simplified Chinese to save
 * tokens, while callers keep writing and reading English.
 *
 * ## Features
 *
 * - Translate system prompts through an NMT service, sentence by sentence
 * - Protect glossary terms from translation with placeholder tokens
 * - Append anti-hallucination instructions (IDK rule, chain-of-thought, self-reflection)
 * - Verified-context blocks and few-shot turns
 * - Temperature clamping to a low, deterministic range
 * - Completion through OpenAI, Anthropic or Gemini
 * - Translate the response back and check its lexical grounding
 * - Token savings reports using tiktoken
 * - Optional Skeleton-of-Thought completion
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration and the provider registry
 * - `translation`: The translation leg:
 *   - `translation::glossary`: Glossary validation and placeholder codec
 *   - `translation::sentences`: Sentence splitting
 *   - `translation::core`: Unit-by-unit translator
 * - `guard`: Prompt augmentation and grounding checks
 * - `optimizer`: The end-to-end completion pipeline
 * - `sot`: Skeleton-of-Thought completion mode
 * - `tokenizer`: Token counting and savings reports
 * - `providers`: NMT and completion backends:
 *   - `providers::google_translate`: Google Translate client
 *   - `providers::openai`: OpenAI API client
 *   - `providers::anthropic`: Anthropic API client
 *   - `providers::gemini`: Gemini API client
 * - `errors`: Custom error types for the library
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod errors;
pub mod guard;
pub mod optimizer;
pub mod providers;
pub mod sot;
pub mod tokenizer;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::{Config, ProviderKind};
pub use errors::{ConfigurationError, GatewayError, GlossaryError, OptimizerError, TranslationError};
pub use guard::{check_source_grounding, clamp_temperature, GroundingResult, GuardOptions};
pub use optimizer::{CompletionRequest, CompletionResult, PromptOptimizer};
pub use tokenizer::{token_savings_report, SavingsReport};
pub use translation::{Direction, GlossaryMap, Translator};
