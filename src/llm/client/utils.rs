use crate::{config::LLMConfig, llm::client::types::TokenUsage};

/// Prompts above this size go straight to the powerful model.
const EFFICIENT_PROMPT_LIMIT: usize = 32 * 1024;

/// Picks the model for a prompt and the one to fall over to when it keeps failing.
pub fn evaluate_befitting_model(
    llm_config: &LLMConfig,
    system_prompt: &str,
    user_prompt: &str,
) -> (String, Option<String>) {
    if system_prompt.len() + user_prompt.len() <= EFFICIENT_PROMPT_LIMIT {
        let fallover = (llm_config.model_powerful != llm_config.model_efficient)
            .then(|| llm_config.model_powerful.clone());
        return (llm_config.model_efficient.clone(), fallover);
    }
    (llm_config.model_powerful.clone(), None)
}

/// Rough token count: about four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Rough token usage estimate from text length
pub fn estimate_token_usage(input_text: &str, output_text: &str) -> TokenUsage {
    TokenUsage::new(estimate_tokens(input_text), estimate_tokens(output_text))
}
