use serde_json::{Value, json};
use tera::{Context as TeraContext, Tera};

use crate::error::{OverlayError, Result};
use crate::languages::LanguageCode;

const SYSTEM_PROMPT: &str = include_str!("../../prompts/system_prompt.tera");
const USER_PROMPT: &str = include_str!("../../prompts/user_prompt.tera");

/// Sampling temperature sent with every request.
pub const TEMPERATURE: f64 = 0.1;

pub fn render_system_prompt(src: LanguageCode, dst: LanguageCode) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("source_lang", src.display_name());
    context.insert("target_lang", dst.display_name());
    render(SYSTEM_PROMPT, &context, "system")
}

pub fn render_user_prompt(text: &str, src: LanguageCode, dst: LanguageCode) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("source_lang", src.display_name());
    context.insert("target_lang", dst.display_name());
    context.insert("text", text);
    render(USER_PROMPT, &context, "user")
}

/// Chat-completions request body for one text.
pub fn chat_body(model: &str, text: &str, src: LanguageCode, dst: LanguageCode) -> Result<Value> {
    let system = render_system_prompt(src, dst)?;
    let user = render_user_prompt(text, src, dst)?;
    Ok(json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user}
        ],
        "temperature": TEMPERATURE,
    }))
}

/// Pulls `choices[0].message.content` out of a response body, trimmed.
pub fn extract_content(body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| OverlayError::TranslationFailed(format!("response is not JSON: {err}")))?;
    let content = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            OverlayError::TranslationFailed("response has no message content".to_string())
        })?
        .trim();
    if content.is_empty() {
        return Err(OverlayError::TranslationFailed(
            "response content is empty".to_string(),
        ));
    }
    Ok(content.to_string())
}

fn render(template: &str, context: &TeraContext, name: &str) -> Result<String> {
    Tera::one_off(template, context, false)
        .map(|rendered| rendered.trim_end().to_string())
        .map_err(|err| OverlayError::TranslationFailed(format!("failed to render {name} prompt: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_keeps_text_verbatim() {
        let prompt =
            render_user_prompt("line one\nline <two>", LanguageCode::En, LanguageCode::De).unwrap();
        assert_eq!(
            prompt,
            "Translate the following English content into Deutsch:\nline one\nline <two>"
        );
    }

    #[test]
    fn body_carries_model_messages_and_temperature() {
        let body = chat_body("deepseek-chat", "hi", LanguageCode::En, LanguageCode::Zh).unwrap();
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["temperature"], 0.1);
        assert!(
            body["messages"][0]["content"]
                .as_str()
                .unwrap()
                .contains("into 简体中文")
        );
    }

    #[test]
    fn extracts_trimmed_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Hallo\n"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "Hallo");
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert!(extract_content("<html>").is_err());
        assert!(extract_content(r#"{"choices":[]}"#).is_err());
        assert!(extract_content(r#"{"choices":[{"message":{"content":"   "}}]}"#).is_err());
    }
}
