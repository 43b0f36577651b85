/*!
 * Integration tests for the translator over a mock NMT backend.
 */

use sinoprompt::errors::{ProviderError, TranslationError};
use sinoprompt::providers::mock::MockTranslator;
use sinoprompt::translation::{Direction, GlossaryMap, Translator, TranslatorConfig};

use crate::common::{fast_translation_config, init_test_logging};

fn system_prompt_glossary() -> GlossaryMap {
    GlossaryMap::new(vec![("system prompt", "系统提示"), ("Acme", "阿克米")]).unwrap()
}

#[tokio::test]
async fn test_translator_manglingBackend_shouldRecoverPlaceholders() {
    init_test_logging();
    let translator = Translator::new(MockTranslator::mangling(), fast_translation_config());

    let result = translator
        .to_target("Read the system prompt.", &system_prompt_glossary())
        .await
        .unwrap();

    assert_eq!(result.text, "[zh-CN] Read the 系统提示.");
    assert_eq!(result.metrics.recovered_placeholders, 1);
    assert!(!result.text.to_lowercase().contains("ph_"));
}

#[tokio::test]
async fn test_translator_droppingBackend_shouldReinsertRendering() {
    init_test_logging();
    let translator = Translator::new(MockTranslator::dropping(), fast_translation_config());

    let result = translator
        .to_target("Welcome to Acme support.", &system_prompt_glossary())
        .await
        .unwrap();

    assert!(result.text.contains("阿克米"));
    assert!(result.text.ends_with("support."));
    assert!(!result.text.contains("__"));
    assert_eq!(result.metrics.reinserted_placeholders, 1);
}

#[tokio::test]
async fn test_translator_intermittentBackend_shouldRetryAndSucceed() {
    init_test_logging();
    let mock = MockTranslator::intermittent(2);
    let translator = Translator::new(mock.clone(), fast_translation_config());

    let result = translator
        .to_target("One. Two. Three.", &GlossaryMap::empty())
        .await
        .unwrap();

    assert_eq!(result.text, "[zh-CN] One. [zh-CN] Two. [zh-CN] Three.");
    assert!(result.metrics.retries > 0);
    assert_eq!(result.metrics.attempts as usize, mock.request_count());
}

#[tokio::test]
async fn test_translator_failingBackend_shouldExhaustRetries() {
    init_test_logging();
    let mock = MockTranslator::failing();
    let translator = Translator::new(mock.clone(), fast_translation_config());

    let error = translator
        .to_target("Only one sentence.", &GlossaryMap::empty())
        .await
        .unwrap_err();

    match error {
        TranslationError::UnitFailed {
            index,
            attempts,
            source: ProviderError::ApiError { status_code, .. },
        } => {
            assert_eq!(index, 0);
            assert_eq!(attempts, 3);
            assert_eq!(status_code, 500);
        }
        other => panic!("Unexpected error: {:?}", other),
    }
    assert_eq!(mock.request_count(), 3);
}

#[tokio::test]
async fn test_translator_slowBackend_shouldTimeOut() {
    init_test_logging();
    let config = TranslatorConfig {
        max_retries: 0,
        unit_timeout_secs: 1,
        ..fast_translation_config()
    };
    let translator = Translator::new(MockTranslator::slow(1_500), config);

    let error = translator
        .to_target("Slow sentence.", &GlossaryMap::empty())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        TranslationError::UnitFailed {
            source: ProviderError::Timeout(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_translator_sameInput_shouldBeDeterministic() {
    let translator = Translator::new(MockTranslator::mangling(), fast_translation_config());
    let glossary = system_prompt_glossary();
    let text = "Acme writes the system prompt. Acme reviews it.";

    let first = translator.to_target(text, &glossary).await.unwrap();
    let second = translator.to_target(text, &glossary).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_translator_toSource_shouldIgnoreGlossary() {
    let mock = MockTranslator::working();
    let translator = Translator::new(mock.clone(), fast_translation_config());

    let result = translator.to_source("这是系统提示。").await.unwrap();

    assert_eq!(result.text, "[en] 这是系统提示。");
    assert!(result.restore_table.is_empty());
    assert_eq!(mock.requests(), vec!["这是系统提示。"]);
}

#[tokio::test]
async fn test_translate_toTarget_shouldMatchToTarget() {
    let translator = Translator::new(MockTranslator::working(), fast_translation_config());
    let glossary = system_prompt_glossary();

    let text = translator
        .translate("Check the system prompt.", Direction::ToTarget, &glossary)
        .await
        .unwrap();

    assert_eq!(text, "[zh-CN] Check the 系统提示.");
}
