/*!
 * Translation leg of the pipeline.
 *
 * - `glossary`: glossary validation and placeholder protection/restoration
 * - `sentences`: sentence splitting into translation units
 * - `core`: the unit-by-unit translator over an NMT backend
 */

pub use self::core::{
    Direction, TranslatedText, TranslationMetrics, Translator, TranslatorConfig, UnitFailurePolicy,
};
pub use self::glossary::{GlossaryEntry, GlossaryMap, RestoreReport, RestoreTable};
pub use self::sentences::SentenceUnit;

pub mod core;
pub mod glossary;
pub mod sentences;
