/*!
 * Tests for glossary validation and placeholder protection
 */

use std::collections::HashMap;

use sinoprompt::errors::GlossaryError;
use sinoprompt::translation::glossary::{protect, restore, restore_with_report, GlossaryMap};

fn glossary(pairs: &[(&str, &str)]) -> GlossaryMap {
    GlossaryMap::new(pairs.iter().copied()).unwrap()
}

#[test]
fn test_protect_restore_shouldReplaceEveryTermWithRendering() {
    let map = glossary(&[
        ("LiteLLM", "LiteLLM"),
        ("system prompt", "系统提示"),
        ("token", "令牌"),
    ]);
    let texts = [
        "Use LiteLLM to send the system prompt.",
        "Every token counts. Every token costs.",
        "system prompt, LiteLLM, token",
        "Nothing to protect here.",
    ];

    for text in texts {
        let (protected, table) = protect(text, &map);
        assert!(!protected.contains("LiteLLM") || table.is_empty());

        let expected = text
            .replace("system prompt", "系统提示")
            .replace("token", "令牌");
        assert_eq!(restore(&protected, &table), expected);
    }
}

#[test]
fn test_protect_longestKeyFirst_shouldNotSplitLongerMatch() {
    let map = glossary(&[("GPT", "G"), ("GPT-4o", "G4")]);
    let (protected, table) = protect("Use GPT-4o now", &map);

    assert_eq!(protected, "Use __PH_0__ now");
    assert_eq!(table.len(), 1);
    assert_eq!(table.entries()[0].term, "GPT-4o");
    assert_eq!(restore(&protected, &table), "Use G4 now");
}

#[test]
fn test_protect_emptyGlossary_shouldReturnTextUnchanged() {
    let (protected, table) = protect("Hello world.", &GlossaryMap::empty());
    assert_eq!(protected, "Hello world.");
    assert!(table.is_empty());
}

#[test]
fn test_restore_upperCaseAndSpacedToken_shouldRecover() {
    let map = glossary(&[("Acme", "艾克米")]);
    let (_, table) = protect("Welcome to Acme.", &map);

    let (restored, report) = restore_with_report("欢迎来到 __ PH _ 0 __。", &table);
    assert_eq!(restored, "欢迎来到 艾克米。");
    assert_eq!(report.recovered, 1);
    assert_eq!(report.reinserted, 0);
}

#[test]
fn test_restore_unknownToken_shouldBeDropped() {
    let map = glossary(&[("Acme", "艾克米")]);
    let (_, table) = protect("Acme.", &map);

    let restored = restore("__PH_0__ and __PH_7__", &table);
    assert_eq!(restored, "艾克米 and");
}

#[test]
fn test_glossaryMap_new_shouldRejectMalformedInput() {
    assert_eq!(GlossaryMap::new(vec![("", "x")]), Err(GlossaryError::EmptyKey));
    assert_eq!(
        GlossaryMap::new(vec![("a", "x"), ("a", "y")]),
        Err(GlossaryError::DuplicateKey("a".to_string()))
    );
    assert!(matches!(
        GlossaryMap::new(vec![("big model", "x"), ("big  model", "y")]),
        Err(GlossaryError::AmbiguousKeys { .. })
    ));
}

#[test]
fn test_glossaryMap_tryFromHashMap_shouldSortLongestFirst() {
    let mut pairs = HashMap::new();
    pairs.insert("ab".to_string(), "1".to_string());
    pairs.insert("abcd".to_string(), "2".to_string());
    pairs.insert("abc".to_string(), "3".to_string());

    let map = GlossaryMap::try_from(pairs).unwrap();
    let terms: Vec<&str> = map.entries().iter().map(|e| e.term.as_str()).collect();
    assert_eq!(terms, vec!["abcd", "abc", "ab"]);
}

#[test]
fn test_restore_renderingLooksLikeToken_shouldSurviveVerbatim() {
    let map = glossary(&[("Foo", "x_ph1"), ("Bar", "BAR")]);
    let (protected, table) = protect("Foo and Bar", &map);
    assert_ne!(table.stem(), "PH");

    let (restored, report) = restore_with_report(&protected, &table);
    assert_eq!(restored, "x_ph1 and BAR");
    assert_eq!(report.exact, 2);
    assert_eq!(report.recovered, 0);
}

#[test]
fn test_restore_mangledTokenNextToTokenLikeRendering_shouldNotRescanRendering() {
    let map = glossary(&[("Foo", "x_ph1"), ("Bar", "BAR")]);
    let (protected, table) = protect("Foo and Bar", &map);
    let exact = format!("__{}_0__", table.stem());
    let mangled = protected.replacen(&exact, &format!("__ {}_0 __", table.stem().to_lowercase()), 1);

    let (restored, report) = restore_with_report(&mangled, &table);
    assert_eq!(restored, "x_ph1 and BAR");
    assert_eq!(report.exact, 1);
    assert_eq!(report.recovered, 1);
}

#[test]
fn test_restore_mangledTokenBeforeUnderscoreWord_shouldKeepTrailingText() {
    let map = glossary(&[("system prompt", "系统提示")]);
    let (_, table) = protect("Read the system prompt now", &map);

    let (restored, report) = restore_with_report("阅读 __ ph_0 __ _init", &table);
    assert_eq!(restored, "阅读 系统提示 _init");
    assert_eq!(report.recovered, 1);
}
