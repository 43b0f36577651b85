/*!
 * Prompt augmentation: guard instructions, evidence block, few-shot turns
 * and temperature clamping.
 */

use serde::{Deserialize, Serialize};

use super::GuardOptions;
use crate::providers::ChatMessage;

/// Lowest temperature sent to the model
pub const MIN_TEMPERATURE: f32 = 0.1;

/// Highest temperature sent to the model
pub const MAX_TEMPERATURE: f32 = 0.4;

/// Temperature used when none (or NaN) is given
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Answer "I don't know" instead of guessing
pub const IDK_INSTRUCTION: &str =
    "如果你不确定某个答案，请明确回答\"我不知道\"或\"数据不足，无法确认\"，而不是猜测或编造内容。";

/// Reason step by step before answering
pub const CHAIN_OF_THOUGHT_INSTRUCTION: &str = "请在回答前按以下步骤分析：\n\
1. 理解问题或文本的核心含义\n\
2. 识别关键术语和上下文\n\
3. 基于已知事实进行推理\n\
4. 确保最终答案与原始问题直接相关";

/// Review the draft against the input before finalizing
pub const SELF_REFLECT_INSTRUCTION: &str = "完成回答后，请执行自我检查：\n\
- 答案是否直接基于输入内容？\n\
- 是否包含任何未经输入支持的信息？\n\
- 如有不确定之处，是否已明确标注？";

const CONTEXT_HEADER: &str = "[Verified Context]";
const CONTEXT_FOOTER: &str = "[End Context]";

/// A demonstration exchange inserted before the real user turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FewShotExample {
    /// Example question
    #[serde(default)]
    pub user: String,
    /// Example answer
    #[serde(default)]
    pub assistant: String,
}

impl FewShotExample {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Append the guard instructions to `base_prompt`.
///
/// The "I don't know" rule is always present; chain-of-thought and
/// self-reflection follow in that order when enabled.
pub fn build_guarded_prompt(base_prompt: &str, options: &GuardOptions) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(4);
    let base = base_prompt.trim_end();
    if !base.is_empty() {
        parts.push(base);
    }
    parts.push(IDK_INSTRUCTION);
    if options.use_chain_of_thought {
        parts.push(CHAIN_OF_THOUGHT_INSTRUCTION);
    }
    if options.use_self_reflect {
        parts.push(SELF_REFLECT_INSTRUCTION);
    }
    parts.join("\n")
}

/// Format snippets as a numbered evidence block, `None` when there are none
pub fn build_context_block(snippets: &[String]) -> Option<String> {
    let lines: Vec<String> = snippets
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect();

    if lines.is_empty() {
        return None;
    }

    let mut block = Vec::with_capacity(lines.len() + 2);
    block.push(CONTEXT_HEADER.to_string());
    block.extend(lines);
    block.push(CONTEXT_FOOTER.to_string());
    Some(block.join("\n"))
}

/// Prepend the evidence block, if any, to the user message
pub fn with_context(user_message: &str, snippets: &[String]) -> String {
    match build_context_block(snippets) {
        Some(block) => format!("{}\n\n{}", block, user_message),
        None => user_message.to_string(),
    }
}

/// Expand examples into alternating user/assistant turns, in order.
/// Empty sides are skipped.
pub fn build_few_shot_turns(examples: &[FewShotExample]) -> Vec<ChatMessage> {
    examples
        .iter()
        .flat_map(|example| {
            let user = (!example.user.trim().is_empty()).then(|| ChatMessage::user(example.user.clone()));
            let assistant = (!example.assistant.trim().is_empty())
                .then(|| ChatMessage::assistant(example.assistant.clone()));
            user.into_iter().chain(assistant)
        })
        .collect()
}

/// Clamp a temperature into the guarded range. NaN maps to the default.
pub fn clamp_temperature(value: f32) -> f32 {
    if value.is_nan() {
        return DEFAULT_TEMPERATURE;
    }
    value.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
}
