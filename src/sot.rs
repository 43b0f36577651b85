/*!
 * Skeleton-of-Thought completion mode.
 *
 * Stage 1 asks the model for a short numbered outline of the answer. Stage 2
 * expands each outline point in its own call, optionally several at a time.
 * Expansions are joined in outline order. All prompts are in Chinese so the
 * token savings of the translated system prompt carry through both stages.
 */

use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::GatewayError;
use crate::providers::{ChatMessage, CompletionGateway, RetryPolicy};

const SKELETON_SYSTEM: &str = "你是一个精确的大纲生成助手，专注于为问题生成简洁的结构化要点列表。";

const SKELETON_TEMPLATE: &str = "请为以下问题生成一个简洁的回答大纲。\n\
要求：3-10个要点，每个要点3-5个词，仅输出编号列表（例：1. 要点内容），不要展开详情。\n\
问题：{question}";

const EXPAND_TEMPLATE: &str = "请充分展开以下要点，提供完整、准确的解释（2-4句话）：\n{point}";

static POINT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:\d+[.)][ \t]*|[-*•][ \t]*)(\S.*)$").unwrap());

/// Skeleton-of-Thought settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SotSettings {
    /// Expand points concurrently
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Upper bound on concurrent expansion calls
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_parallel() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for SotSettings {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Result of a Skeleton-of-Thought run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SotOutput {
    /// Expanded points joined by blank lines
    pub response: String,
    /// Parsed outline points
    pub skeleton: Vec<String>,
    /// One expansion per point, in outline order
    pub expanded_points: Vec<String>,
}

/// Extract outline points from a numbered or bulleted list.
///
/// Falls back to non-empty lines when no list markers are found.
pub fn parse_skeleton(text: &str) -> Vec<String> {
    let points: Vec<String> = POINT_REGEX
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    if !points.is_empty() {
        return points;
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Two-stage completion over a gateway
pub struct SkeletonOfThought<'a, G: CompletionGateway> {
    gateway: &'a G,
    model: &'a str,
    api_key: &'a str,
    temperature: f32,
    retry: RetryPolicy,
    settings: SotSettings,
}

impl<'a, G: CompletionGateway> SkeletonOfThought<'a, G> {
    pub fn new(
        gateway: &'a G,
        model: &'a str,
        api_key: &'a str,
        temperature: f32,
        retry: RetryPolicy,
        settings: SotSettings,
    ) -> Self {
        Self {
            gateway,
            model,
            api_key,
            temperature,
            retry,
            settings,
        }
    }

    async fn call(&self, label: &str, messages: Vec<ChatMessage>) -> Result<String, GatewayError> {
        self.retry
            .run(label, || {
                self.gateway
                    .send(&messages, self.model, self.temperature, self.api_key)
            })
            .await
            .map(|(text, _)| text)
            .map_err(|failure| GatewayError::from_provider(&failure.error, failure.attempts))
    }

    /// Run both stages for `user_message` under `system_prompt`
    pub async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<SotOutput, GatewayError> {
        debug!("SoT stage 1: generating skeleton ({} chars)", user_message.chars().count());
        let skeleton_messages = vec![
            ChatMessage::system(format!("{}\n{}", system_prompt, SKELETON_SYSTEM)),
            ChatMessage::user(SKELETON_TEMPLATE.replace("{question}", user_message)),
        ];
        let skeleton_text = self.call("SoT skeleton", skeleton_messages).await?;

        let mut skeleton = parse_skeleton(&skeleton_text);
        if skeleton.is_empty() {
            warn!("SoT skeleton parsing yielded no points; using raw text as a single point");
            skeleton = vec![skeleton_text.trim().to_string()];
        }

        let concurrency = if self.settings.parallel {
            self.settings.max_concurrency.max(1)
        } else {
            1
        };
        debug!(
            "SoT stage 2: expanding {} point(s), concurrency {}",
            skeleton.len(),
            concurrency
        );

        let expanded_points: Vec<String> = stream::iter(skeleton.iter().enumerate())
            .map(|(i, point)| {
                let messages = vec![
                    ChatMessage::system(system_prompt),
                    ChatMessage::user(EXPAND_TEMPLATE.replace("{point}", point)),
                ];
                async move { self.call(&format!("SoT point {}", i + 1), messages).await }
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        Ok(SotOutput {
            response: expanded_points.join("\n\n"),
            skeleton,
            expanded_points,
        })
    }
}
