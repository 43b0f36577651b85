// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;

use sinoprompt::app_config::{Config, LogLevel, ProviderKind};
use sinoprompt::guard::{check_source_grounding, FewShotExample, GuardOptions};
use sinoprompt::optimizer::{CompletionRequest, CompletionResult, PromptOptimizer};
use sinoprompt::providers::{GoogleTranslate, ProviderGateway};
use sinoprompt::sot::SotSettings;
use sinoprompt::tokenizer::{token_savings_report, DEFAULT_MODEL};
use sinoprompt::translation::{Direction, GlossaryMap, Translator, TranslatorConfig};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Always be concise and accurate.";

/// CLI Wrapper for ProviderKind to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliProvider {
    Chatgpt,
    Claude,
    Gemini,
}

impl From<CliProvider> for ProviderKind {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::Chatgpt => ProviderKind::ChatGpt,
            CliProvider::Claude => ProviderKind::Claude,
            CliProvider::Gemini => ProviderKind::Gemini,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for Direction to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDirection {
    /// Source language to target language
    ToTarget,
    /// Target language back to source language
    ToSource,
}

impl From<CliDirection> for Direction {
    fn from(cli_direction: CliDirection) -> Self {
        match cli_direction {
            CliDirection::ToTarget => Direction::ToTarget,
            CliDirection::ToSource => Direction::ToSource,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a guarded completion with a translated system prompt
    Complete(CompleteArgs),

    /// Translate text in either direction
    Translate(TranslateArgs),

    /// Check a response's lexical grounding in a source text (offline)
    Grounding(GroundingArgs),

    /// Report the token savings of one text over another (offline)
    Savings(SavingsArgs),

    /// Generate shell completions for sinoprompt
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct LanguageArgs {
    /// Source language code (e.g., 'en')
    #[arg(long, default_value = "en")]
    source_language: String,

    /// Target language code (e.g., 'zh-CN')
    #[arg(long, default_value = "zh-CN")]
    target_language: String,

    /// Google Cloud Translation API key (public endpoint when unset)
    #[arg(long, env = "GOOGLE_TRANSLATE_API_KEY", hide_env_values = true)]
    translate_api_key: Option<String>,
}

#[derive(Parser, Debug)]
struct CompleteArgs {
    /// Completion provider
    #[arg(short, long, value_enum, default_value = "gemini")]
    provider: CliProvider,

    /// Model name (provider default when omitted)
    #[arg(short, long)]
    model: Option<String>,

    /// System prompt in the source language
    #[arg(short, long, default_value = DEFAULT_SYSTEM_PROMPT)]
    system_prompt: String,

    /// User message
    #[arg(long)]
    message: String,

    /// API key (falls back to the provider's environment variable)
    #[arg(long)]
    api_key: Option<String>,

    /// Completion endpoint override
    #[arg(long)]
    endpoint: Option<String>,

    /// Ask the model to reason step by step
    #[arg(long)]
    cot: bool,

    /// Ask the model to review its draft before answering
    #[arg(long)]
    self_reflect: bool,

    /// Sampling temperature, clamped to [0.1, 0.4]
    #[arg(long, default_value_t = 0.2)]
    temperature: f32,

    /// Verified context snippets
    #[arg(long, num_args = 1..)]
    context: Vec<String>,

    /// Glossary entries as TERM=VALUE
    #[arg(long = "glossary", value_name = "TERM=VALUE")]
    glossary: Vec<String>,

    /// Few-shot examples as QUESTION=ANSWER
    #[arg(long = "example", value_name = "QUESTION=ANSWER")]
    examples: Vec<String>,

    /// Minimum overlap ratio for the grounding check
    #[arg(long, default_value_t = 0.3)]
    min_overlap: f64,

    /// Skip the grounding check
    #[arg(long)]
    no_grounding: bool,

    /// Return the response in the target language
    #[arg(long)]
    raw: bool,

    /// Use Skeleton-of-Thought
    #[arg(long)]
    sot: bool,

    /// Expand Skeleton-of-Thought points one at a time
    #[arg(long, requires = "sot")]
    sot_sequential: bool,

    /// Print the result as JSON
    #[arg(long)]
    output_json: bool,

    #[command(flatten)]
    languages: LanguageArgs,
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Text to translate
    text: String,

    /// Translation direction
    #[arg(short, long, value_enum, default_value = "to-target")]
    direction: CliDirection,

    /// Glossary entries as TERM=VALUE
    #[arg(long = "glossary", value_name = "TERM=VALUE")]
    glossary: Vec<String>,

    #[command(flatten)]
    languages: LanguageArgs,
}

#[derive(Parser, Debug)]
struct GroundingArgs {
    /// Source text
    #[arg(long)]
    source: String,

    /// Response to check
    #[arg(long)]
    response: String,

    /// Minimum overlap ratio
    #[arg(long, default_value_t = 0.3)]
    min_overlap: f64,
}

#[derive(Parser, Debug)]
struct SavingsArgs {
    /// Source-language text
    #[arg(long)]
    source: String,

    /// Target-language text
    #[arg(long)]
    target: String,

    /// Model whose tokenizer is used
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
}

/// sinoprompt - Chinese prompt optimizer
///
/// Sends system prompts to LLMs in Simplified Chinese to save tokens, with
/// glossary protection, hallucination guards and grounding checks.
#[derive(Parser, Debug)]
#[command(name = "sinoprompt")]
#[command(version)]
#[command(about = "Token-saving Chinese system prompts for LLM completions")]
#[command(long_about = "sinoprompt translates system prompts to Simplified Chinese before sending them to an LLM, then translates the answer back.

EXAMPLES:
    sinoprompt complete --message \"What is the capital of France?\"
    sinoprompt complete -p claude --cot --glossary LiteLLM=LiteLLM --message \"...\"
    sinoprompt translate \"You are a helpful assistant.\"
    sinoprompt savings --source \"You are helpful.\" --target \"你很有帮助。\"
    sinoprompt completions bash > sinoprompt.bash

SUPPORTED PROVIDERS:
    chatgpt - OpenAI (OPENAI_API_KEY)
    claude  - Anthropic (ANTHROPIC_API_KEY)
    gemini  - Google AI Studio (GEMINI_API_KEY)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Parse `KEY=VALUE` pairs, keeping their order
fn parse_pairs(raw: &[String], what: &str) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|item| {
            item.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| anyhow!("Invalid {} entry '{}': expected KEY=VALUE", what, item))
        })
        .collect()
}

fn translator_config(languages: &LanguageArgs) -> TranslatorConfig {
    TranslatorConfig {
        source_language: languages.source_language.clone(),
        target_language: languages.target_language.clone(),
        ..TranslatorConfig::default()
    }
}

fn print_result(result: &CompletionResult, as_json: bool) -> Result<()> {
    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(result).context("Failed to serialize result")?
        );
        return Ok(());
    }

    if let Some(skeleton) = &result.skeleton {
        println!("Skeleton:");
        for (i, point) in skeleton.iter().enumerate() {
            println!("  {}. {}", i + 1, point);
        }
        println!();
    }
    println!("{}", result.response);
    if let Some(savings) = &result.savings {
        println!("\n{}", savings.summary());
    }
    if let Some(grounding) = &result.grounding {
        println!(
            "Grounding: {} (overlap {:.0}%)",
            if grounding.grounded { "ok" } else { "weak" },
            grounding.overlap_ratio * 100.0
        );
    }
    Ok(())
}

async fn run_complete(args: CompleteArgs) -> Result<()> {
    let provider: ProviderKind = args.provider.into();
    let mut config = Config::for_provider(provider);
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    config.translation = translator_config(&args.languages);
    config.translate_response = !args.raw;
    config.guard = GuardOptions {
        use_chain_of_thought: args.cot,
        use_self_reflect: args.self_reflect,
        temperature: args.temperature,
        use_source_grounding: !args.no_grounding,
        min_overlap_ratio: args.min_overlap,
    };
    if args.sot {
        config.sot = Some(SotSettings {
            parallel: !args.sot_sequential,
            ..SotSettings::default()
        });
    }
    config.resolve_api_key(args.api_key)?;

    let glossary = parse_pairs(&args.glossary, "glossary")?;
    let examples = parse_pairs(&args.examples, "example")?
        .into_iter()
        .map(|(q, a)| FewShotExample::new(q, a))
        .collect();

    let gateway = ProviderGateway::from_config(&config);
    let nmt = GoogleTranslate::new(args.languages.translate_api_key);
    let optimizer = PromptOptimizer::new(config, nmt, gateway).context("Configuration validation failed")?;

    let request = CompletionRequest::new(args.system_prompt, args.message)
        .glossary(glossary)
        .context(args.context)
        .few_shot(examples)
        .return_savings(true);

    let result = optimizer
        .complete(request)
        .await
        .map_err(|e| anyhow!("Completion failed at {} stage: {}", e.stage(), e))?;
    print_result(&result, args.output_json)
}

async fn run_translate(args: TranslateArgs) -> Result<()> {
    let config = translator_config(&args.languages);
    sinoprompt::app_config::validate_language_code(&config.source_language)?;
    sinoprompt::app_config::validate_language_code(&config.target_language)?;

    let glossary = GlossaryMap::new(parse_pairs(&args.glossary, "glossary")?)?;
    let translator = Translator::new(GoogleTranslate::new(args.languages.translate_api_key), config);
    let text = translator
        .translate(&args.text, args.direction.into(), &glossary)
        .await?;
    println!("{}", text);
    Ok(())
}

fn run_grounding(args: GroundingArgs) -> Result<()> {
    let result = check_source_grounding(&args.source, &args.response, args.min_overlap)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run_savings(args: SavingsArgs) -> Result<()> {
    let report = token_savings_report(&args.source, &args.target, &args.model);
    info!("{}", report.summary());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CommandLineOptions::parse();

    let level: LogLevel = cli.log_level.map(Into::into).unwrap_or_default();
    CustomLogger::init(level.to_level_filter())?;

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "sinoprompt", &mut std::io::stdout());
            Ok(())
        }
        Commands::Complete(args) => run_complete(args).await,
        Commands::Translate(args) => run_translate(args).await,
        Commands::Grounding(args) => run_grounding(args),
        Commands::Savings(args) => run_savings(args),
    }
}
