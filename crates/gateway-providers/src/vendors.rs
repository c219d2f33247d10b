//! Vendors that speak the OpenAI wire format.

use crate::openai::{OpenAICompatibleConfig, OpenAICompatibleProvider};
use crate::registry::ProviderContext;

/// DeepSeek
pub const DEEPSEEK_API_KEY: &str = "DEEPSEEK_API_KEY";
/// Moonshot (Kimi)
pub const MOONSHOT_API_KEY: &str = "MOONSHOT_API_KEY";
/// 01.AI (Lingyiwanwu)
pub const LINGYIWANWU_API_KEY: &str = "LINGYIWANWU_API_KEY";
/// Groq
pub const GROQ_API_KEY: &str = "GROQ_API_KEY";
/// Alibaba Bailian (DashScope compatible mode)
pub const BAILIAN_API_KEY: &str = "BAILIAN_API_KEY";

fn build(
    ctx: &ProviderContext,
    name: &str,
    required: &'static [&'static str],
    base_url: &str,
    base_url_key: &str,
    models: &[&str],
) -> OpenAICompatibleProvider {
    let config = OpenAICompatibleConfig::new(name, required, base_url, models).from_credentials(
        ctx,
        required[0],
        base_url_key,
    );
    OpenAICompatibleProvider::new(config, ctx.http.clone())
}

/// DeepSeek chat and coder models
#[must_use]
pub fn deepseek(ctx: &ProviderContext) -> OpenAICompatibleProvider {
    build(
        ctx,
        "deepseek",
        &[DEEPSEEK_API_KEY],
        "https://api.deepseek.com/v1",
        "DEEPSEEK_BASE_URL",
        &["deepseek-chat", "deepseek-coder"],
    )
}

/// Moonshot v1 models
#[must_use]
pub fn moonshot(ctx: &ProviderContext) -> OpenAICompatibleProvider {
    build(
        ctx,
        "moonshot",
        &[MOONSHOT_API_KEY],
        "https://api.moonshot.cn/v1",
        "MOONSHOT_BASE_URL",
        &["moonshot-v1-8k", "moonshot-v1-32k", "moonshot-v1-128k"],
    )
}

/// Yi models
#[must_use]
pub fn lingyiwanwu(ctx: &ProviderContext) -> OpenAICompatibleProvider {
    build(
        ctx,
        "lingyiwanwu",
        &[LINGYIWANWU_API_KEY],
        "https://api.lingyiwanwu.com/v1",
        "LINGYIWANWU_BASE_URL",
        &["yi-large", "yi-medium", "yi-spark", "yi-large-turbo", "yi-large-rag"],
    )
}

/// Groq hosted open models
#[must_use]
pub fn groq(ctx: &ProviderContext) -> OpenAICompatibleProvider {
    build(
        ctx,
        "groq",
        &[GROQ_API_KEY],
        "https://api.groq.com/openai/v1",
        "GROQ_BASE_URL",
        &["llama3-8b-8192", "llama3-70b-8192", "mixtral-8x7b-32768", "gemma-7b-it"],
    )
}

/// Qwen models through DashScope's OpenAI-compatible endpoint
#[must_use]
pub fn bailian(ctx: &ProviderContext) -> OpenAICompatibleProvider {
    build(
        ctx,
        "bailian",
        &[BAILIAN_API_KEY],
        "https://dashscope.aliyuncs.com/compatible-mode/v1",
        "BAILIAN_BASE_URL",
        &["qwen-max", "qwen-plus", "qwen-turbo", "qwen-long"],
    )
}
