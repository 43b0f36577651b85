/*!
 * End-to-end tests for the completion pipeline over mock backends
 */

use parking_lot::Mutex;
use std::sync::Arc;

use sinoprompt::app_config::{Config, ProviderKind};
use sinoprompt::errors::{
    ConfigurationError, GatewayErrorKind, GlossaryError, OptimizerError, ProviderError, TranslationError,
};
use sinoprompt::guard::prompts::{CHAIN_OF_THOUGHT_INSTRUCTION, IDK_INSTRUCTION};
use sinoprompt::guard::{FewShotExample, GroundingResult, GuardOptions, SourceGrounding};
use sinoprompt::optimizer::{CompletionRequest, PromptOptimizer};
use sinoprompt::providers::mock::{MockGateway, MockTranslator};
use sinoprompt::providers::Role;
use sinoprompt::tokenizer::TokenCounter;
use sinoprompt::translation::{TranslatorConfig, UnitFailurePolicy};

use crate::common::{fast_translation_config, optimizer_with, scripted_translator, test_config};

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const QUESTION: &str = "What is the capital of France?";
const CHINESE_ANSWER: &str = "巴黎是法国的首都。";

/// Counts 3 tokens for translated text and 10 for anything else, recording
/// the model names it was asked about
#[derive(Default)]
struct StubCounter {
    models: Mutex<Vec<String>>,
}

impl TokenCounter for StubCounter {
    fn count_tokens(&self, text: &str, model: &str) -> anyhow::Result<usize> {
        self.models.lock().push(model.to_string());
        Ok(if text.starts_with('<') { 3 } else { 10 })
    }
}

struct BrokenGrounding;

impl SourceGrounding for BrokenGrounding {
    fn check(&self, _source: &str, _response: &str, _min: f64) -> anyhow::Result<GroundingResult> {
        Err(anyhow::anyhow!("grounding backend unavailable"))
    }
}

#[tokio::test]
async fn test_complete_happyPath_shouldTranslateBothWays() {
    let translator = scripted_translator();
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let optimizer = optimizer_with(test_config(), &translator, &gateway);

    let result = optimizer
        .complete(CompletionRequest::new(SYSTEM_PROMPT, QUESTION))
        .await
        .unwrap();

    assert_eq!(result.response, "Paris is the capital of France.");
    assert_eq!(result.raw_response, CHINESE_ANSWER);
    assert!(result.target_system_prompt.starts_with("<zh-CN>You are a helpful assistant.\n"));
    assert!(result.target_system_prompt.contains(IDK_INSTRUCTION));
    assert!(result.skeleton.is_none());
    assert!(result.savings.is_none());
    assert_eq!(result.metrics.units, 2);

    let calls = gateway.calls();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.system(), Some(result.target_system_prompt.as_str()));
    assert_eq!(call.last_user(), Some(QUESTION));
    assert_eq!(call.model, "gpt-4o");
    assert_eq!(call.api_key, "test-key");
    assert_eq!(call.temperature, 0.2);

    let grounding = result.grounding.expect("grounding should be present");
    assert!(grounding.grounded);
    assert_eq!(grounding.overlap_ratio, 0.5);
}

#[tokio::test]
async fn test_complete_userMessage_shouldNotBeTranslated() {
    let translator = scripted_translator();
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let optimizer = optimizer_with(test_config(), &translator, &gateway);

    optimizer
        .complete(CompletionRequest::new(SYSTEM_PROMPT, QUESTION))
        .await
        .unwrap();

    let requests = translator.requests();
    assert_eq!(requests, vec![SYSTEM_PROMPT, CHINESE_ANSWER]);
}

#[tokio::test]
async fn test_complete_highTemperature_shouldBeClamped() {
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let optimizer = optimizer_with(test_config(), &scripted_translator(), &gateway);
    let options = GuardOptions {
        temperature: 0.9,
        ..GuardOptions::default()
    };

    optimizer
        .complete(CompletionRequest::new(SYSTEM_PROMPT, QUESTION).options(options))
        .await
        .unwrap();

    assert_eq!(gateway.calls()[0].temperature, 0.4);
}

#[tokio::test]
async fn test_complete_chainOfThought_shouldAppendInstruction() {
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let optimizer = optimizer_with(test_config(), &scripted_translator(), &gateway);
    let options = GuardOptions {
        use_chain_of_thought: true,
        ..GuardOptions::default()
    };

    let result = optimizer
        .complete(CompletionRequest::new(SYSTEM_PROMPT, QUESTION).options(options))
        .await
        .unwrap();

    assert!(result.target_system_prompt.ends_with(CHAIN_OF_THOUGHT_INSTRUCTION));
}

#[tokio::test]
async fn test_complete_contextAndFewShot_shouldBeOrdered() {
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let optimizer = optimizer_with(test_config(), &scripted_translator(), &gateway);

    let request = CompletionRequest::new(SYSTEM_PROMPT, QUESTION)
        .context(["Paris has been the capital since 987."])
        .few_shot(vec![FewShotExample::new("What is 2+2?", "4")]);
    optimizer.complete(request).await.unwrap();

    let call = &gateway.calls()[0];
    let roles: Vec<Role> = call.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
    assert_eq!(call.messages[1].content, "What is 2+2?");
    assert_eq!(call.messages[2].content, "4");
    assert_eq!(
        call.messages[3].content,
        format!(
            "[Verified Context]\n1. Paris has been the capital since 987.\n[End Context]\n\n{}",
            QUESTION
        )
    );
}

#[tokio::test]
async fn test_complete_invalidGlossary_shouldFailBeforeAnyCall() {
    let translator = scripted_translator();
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let optimizer = optimizer_with(test_config(), &translator, &gateway);

    let error = optimizer
        .complete(
            CompletionRequest::new(SYSTEM_PROMPT, QUESTION)
                .glossary_term("system prompt", "系统提示")
                .glossary_term("system  prompt", "系统提示"),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        OptimizerError::Glossary(GlossaryError::AmbiguousKeys { .. })
    ));
    assert_eq!(error.stage(), "glossary");
    assert_eq!(translator.request_count(), 0);
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn test_complete_emptyInputs_shouldBeRejected() {
    let translator = scripted_translator();
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let optimizer = optimizer_with(test_config(), &translator, &gateway);

    let error = optimizer
        .complete(CompletionRequest::new("   ", QUESTION))
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        OptimizerError::Configuration(ConfigurationError::EmptyInput("System prompt"))
    ));

    let error = optimizer
        .complete(CompletionRequest::new(SYSTEM_PROMPT, ""))
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        OptimizerError::Configuration(ConfigurationError::EmptyInput("User message"))
    ));

    assert_eq!(translator.request_count(), 0);
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn test_complete_invalidOverlapRatio_shouldBeRejected() {
    let translator = scripted_translator();
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let optimizer = optimizer_with(test_config(), &translator, &gateway);
    let options = GuardOptions {
        min_overlap_ratio: 1.5,
        ..GuardOptions::default()
    };

    let error = optimizer
        .complete(CompletionRequest::new(SYSTEM_PROMPT, QUESTION).options(options))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        OptimizerError::Configuration(ConfigurationError::InvalidOverlapRatio(_))
    ));
    assert_eq!(translator.request_count(), 0);
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn test_complete_failingUnit_shouldSkipGateway() {
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let optimizer = optimizer_with(test_config(), &MockTranslator::failing_on("second"), &gateway);

    let error = optimizer
        .complete(CompletionRequest::new("The first rule. The second rule.", QUESTION))
        .await
        .unwrap_err();

    match error {
        OptimizerError::Translation(TranslationError::UnitFailed { index, attempts, .. }) => {
            assert_eq!(index, 1);
            assert_eq!(attempts, 3);
        }
        other => panic!("Unexpected error: {:?}", other),
    }
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn test_complete_authenticationFailure_shouldNotRetry() {
    let gateway = MockGateway::failing(ProviderError::AuthenticationError("bad key".into()));
    let optimizer = optimizer_with(test_config(), &scripted_translator(), &gateway);

    let error = optimizer
        .complete(CompletionRequest::new(SYSTEM_PROMPT, QUESTION))
        .await
        .unwrap_err();

    match error {
        OptimizerError::Gateway(gateway_error) => {
            assert_eq!(gateway_error.kind, GatewayErrorKind::Authentication);
            assert_eq!(gateway_error.attempts, 1);
        }
        other => panic!("Unexpected error: {:?}", other),
    }
    assert_eq!(gateway.call_count(), 1);
}

#[tokio::test]
async fn test_complete_rateLimit_shouldRetryThenFail() {
    let gateway = MockGateway::failing(ProviderError::RateLimitExceeded("429".into()));
    let optimizer = optimizer_with(test_config(), &scripted_translator(), &gateway);

    let error = optimizer
        .complete(CompletionRequest::new(SYSTEM_PROMPT, QUESTION))
        .await
        .unwrap_err();

    assert_eq!(error.stage(), "completion");
    assert!(matches!(
        error,
        OptimizerError::Gateway(ref e) if e.kind == GatewayErrorKind::RateLimit && e.attempts == 3
    ));
    assert_eq!(gateway.call_count(), 3);
}

#[tokio::test]
async fn test_complete_transientGatewayError_shouldRecover() {
    let gateway = MockGateway::replying(CHINESE_ANSWER)
        .with_script(vec![Err(ProviderError::ConnectionError("reset".into()))]);
    let optimizer = optimizer_with(test_config(), &scripted_translator(), &gateway);

    let result = optimizer
        .complete(CompletionRequest::new(SYSTEM_PROMPT, QUESTION))
        .await
        .unwrap();

    assert_eq!(result.raw_response, CHINESE_ANSWER);
    assert_eq!(gateway.call_count(), 2);
}

#[tokio::test]
async fn test_complete_brokenGroundingChecker_shouldOmitGrounding() {
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let optimizer = optimizer_with(test_config(), &scripted_translator(), &gateway)
        .with_grounding_checker(Box::new(BrokenGrounding));

    let result = optimizer
        .complete(CompletionRequest::new(SYSTEM_PROMPT, QUESTION))
        .await
        .unwrap();

    assert!(result.grounding.is_none());
    assert_eq!(result.response, "Paris is the capital of France.");
}

#[tokio::test]
async fn test_complete_groundingDisabled_shouldOmitGrounding() {
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let optimizer = optimizer_with(test_config(), &scripted_translator(), &gateway);
    let options = GuardOptions {
        use_source_grounding: false,
        ..GuardOptions::default()
    };

    let result = optimizer
        .complete(CompletionRequest::new(SYSTEM_PROMPT, QUESTION).options(options))
        .await
        .unwrap();

    assert!(result.grounding.is_none());
}

#[tokio::test]
async fn test_complete_rawResponse_shouldSkipBackTranslation() {
    let translator = scripted_translator();
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let config = Config {
        translate_response: false,
        ..test_config()
    };
    let optimizer = optimizer_with(config, &translator, &gateway);

    let result = optimizer
        .complete(CompletionRequest::new(SYSTEM_PROMPT, QUESTION))
        .await
        .unwrap();

    assert_eq!(result.response, CHINESE_ANSWER);
    assert_eq!(result.response, result.raw_response);
    assert_eq!(translator.request_count(), 1);

    // An untranslated answer shares no terms with the English source
    let grounding = result.grounding.unwrap();
    assert!(!grounding.grounded);
    assert!(grounding.warning.unwrap().contains("hallucination"));
}

#[tokio::test]
async fn test_complete_glossary_shouldReachModelIntact() {
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let optimizer = optimizer_with(test_config(), &scripted_translator(), &gateway);

    let result = optimizer
        .complete(
            CompletionRequest::new("Always follow the system prompt.", QUESTION)
                .glossary_term("system prompt", "系统提示"),
        )
        .await
        .unwrap();

    assert!(result
        .target_system_prompt
        .starts_with("<zh-CN>Always follow the 系统提示."));
    assert_eq!(result.metrics.protected_terms, 1);

    let system = gateway.calls()[0].system().unwrap_or_default().to_string();
    assert!(system.contains("系统提示"));
    assert!(!system.contains("__PH"));
}

#[tokio::test]
async fn test_complete_savings_shouldUseBareModelName() {
    let counter = Arc::new(StubCounter::default());
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let config = Config {
        provider: ProviderKind::Claude,
        model: ProviderKind::Claude.info().default_model.to_string(),
        ..test_config()
    };
    let optimizer = optimizer_with(config, &scripted_translator(), &gateway).with_token_counter(counter.clone());

    let result = optimizer
        .complete(CompletionRequest::new(SYSTEM_PROMPT, QUESTION).return_savings(true))
        .await
        .unwrap();

    let savings = result.savings.expect("savings should be present");
    assert_eq!(savings.source_tokens, 10);
    assert_eq!(savings.target_tokens, 3);
    assert_eq!(savings.tokens_saved, 7);

    assert_eq!(gateway.calls()[0].model, "anthropic/claude-3-5-sonnet-20241022");
    assert!(counter
        .models
        .lock()
        .iter()
        .all(|m| m == "claude-3-5-sonnet-20241022"));
}

#[tokio::test]
async fn test_countSystemPromptTokens_shouldNotCallGateway() {
    let counter = Arc::new(StubCounter::default());
    let translator = scripted_translator();
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let optimizer = optimizer_with(test_config(), &translator, &gateway).with_token_counter(counter);

    let report = optimizer
        .count_system_prompt_tokens(SYSTEM_PROMPT, &[])
        .await
        .unwrap();

    assert_eq!(report.source_tokens, 10);
    assert_eq!(report.target_tokens, 3);
    assert_eq!(translator.request_count(), 1);
    assert_eq!(gateway.call_count(), 0);
}

#[test]
fn test_promptOptimizer_missingApiKey_shouldBeRejected() {
    let config = Config::for_provider(ProviderKind::Gemini);
    let result = PromptOptimizer::new(config, MockTranslator::working(), MockGateway::echo());
    assert!(matches!(
        result,
        Err(ConfigurationError::MissingApiKey { ref env_var, .. }) if env_var == "GEMINI_API_KEY"
    ));
}

#[tokio::test]
async fn test_promptOptimizer_keepSourcePolicy_shouldBeRejected() {
    let translator = MockTranslator::failing_on("second");
    let gateway = MockGateway::replying(CHINESE_ANSWER);
    let config = Config {
        translation: TranslatorConfig {
            on_unit_failure: UnitFailurePolicy::KeepSource,
            ..fast_translation_config()
        },
        ..test_config()
    };

    let result = PromptOptimizer::new(config, translator.clone(), gateway.clone());

    assert!(matches!(result, Err(ConfigurationError::Invalid(_))));
    assert_eq!(translator.request_count(), 0);
    assert_eq!(gateway.call_count(), 0);
}
