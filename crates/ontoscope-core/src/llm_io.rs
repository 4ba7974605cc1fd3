use reqwest::Url;
use serde_json::Value;

/// Accepts plain `http`/`https` endpoints that carry a host and no credentials.
pub fn parse_llm_endpoint(raw: &str, label: &str) -> std::result::Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|err| format!("invalid {label}: {err}"))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported {label} scheme: {other}")),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(format!("{label} must not include credentials"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(format!("{label} host is missing"));
    }
    Ok(url)
}

/// Reads the assistant text from Ollama chat, OpenAI-compatible or generate-style bodies.
pub fn extract_llm_content(value: &Value) -> Option<String> {
    if let Some(content) = value
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
    {
        return Some(content.to_string());
    }
    if let Some(content) = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
    {
        return Some(content.to_string());
    }
    value
        .get("response")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Outermost JSON object or array embedded in free text, e.g. inside a code fence.
pub fn extract_json_fragment(text: &str) -> Option<String> {
    let start = text
        .char_indices()
        .find(|(_, c)| *c == '{' || *c == '[')
        .map(|(idx, _)| idx)?;
    let sliced = &text[start..];
    let end = sliced
        .char_indices()
        .rev()
        .find(|(_, c)| *c == '}' || *c == ']')
        .map(|(idx, c)| idx + c.len_utf8())?;
    Some(sliced[..end].to_string())
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_llm_endpoint_rejects_credentials_and_other_schemes() {
        assert!(parse_llm_endpoint("http://127.0.0.1:11434/api/chat", "narrative endpoint").is_ok());
        assert!(parse_llm_endpoint("https://llm.internal/v1/chat/completions", "narrative endpoint").is_ok());

        let err = parse_llm_endpoint("http://user:pw@localhost/api/chat", "narrative endpoint")
            .expect_err("credentials");
        assert!(err.contains("credentials"));
        let err = parse_llm_endpoint("ftp://localhost/api", "narrative endpoint")
            .expect_err("scheme");
        assert!(err.contains("scheme"));
        assert!(parse_llm_endpoint("not a url", "narrative endpoint").is_err());
    }

    #[test]
    fn extract_llm_content_reads_each_response_shape() {
        let ollama = serde_json::json!({"message": {"content": "hello"}, "response": "fallback"});
        assert_eq!(extract_llm_content(&ollama).as_deref(), Some("hello"));

        let openai = serde_json::json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(extract_llm_content(&openai).as_deref(), Some("hi"));

        let generate = serde_json::json!({"response": "plain"});
        assert_eq!(extract_llm_content(&generate).as_deref(), Some("plain"));

        assert_eq!(extract_llm_content(&serde_json::json!({"done": true})), None);
    }

    #[test]
    fn extract_json_fragment_reads_embedded_object() {
        let value = "```json\n{\"a\":1}\n```";
        assert_eq!(extract_json_fragment(value).as_deref(), Some("{\"a\":1}"));
        assert_eq!(extract_json_fragment("no json here"), None);
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("배터리 문제", 3), "배터리");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
