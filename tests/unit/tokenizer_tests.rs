/*!
 * Tests for token counting and savings reports
 */

use sinoprompt::tokenizer::{
    approx_tokens, count_tokens, savings_with, token_savings_report, SavingsReport, TokenCounter,
};

struct FailingCounter;

impl TokenCounter for FailingCounter {
    fn count_tokens(&self, _text: &str, _model: &str) -> anyhow::Result<usize> {
        Err(anyhow::anyhow!("tokenizer offline"))
    }
}

#[test]
fn test_tokenSavingsReport_chineseTarget_shouldSaveTokens() {
    // Unknown model: the length heuristic applies
    let report = token_savings_report("You are helpful.", "你很有帮助。", "claude-3-5-sonnet");
    assert!(report.target_tokens < report.source_tokens);
    assert!(report.tokens_saved > 0);
    assert!(report.saving_pct > 0.0);
}

#[test]
fn test_tokenSavingsReport_knownModel_shouldUseBpe() {
    let text = "You are a helpful assistant. Always be concise and accurate.";
    let tokens = count_tokens(text, "gpt-3.5-turbo");
    assert!(tokens > 0);
    assert!(tokens < text.chars().count());
}

#[test]
fn test_tokenSavingsReport_fieldsShouldBeConsistent() {
    let report = token_savings_report("Answer briefly and cite your sources.", "简要回答并注明来源。", "gpt-4o");
    assert_eq!(
        report.tokens_saved,
        report.source_tokens as i64 - report.target_tokens as i64
    );
}

#[test]
fn test_savingsWith_failingCounter_shouldPropagateError() {
    assert!(savings_with(&FailingCounter, "a", "b", "m").is_err());
}

#[test]
fn test_savingsReport_summary_shouldMentionCounts() {
    let summary = SavingsReport::from_counts(10, 4).summary();
    assert!(summary.contains("6 tokens"));
    assert!(summary.contains("60%"));
}

#[test]
fn test_countTokens_empty_shouldBeZero() {
    assert_eq!(count_tokens("", "gpt-4o"), 0);
    assert_eq!(approx_tokens(""), 0);
}
