//! Narrative generator backed by a chat-completion HTTP endpoint.

use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::NarrativeLlmConfig;
use crate::error::{OntoscopeError, Result};
use crate::llm_io::{extract_json_fragment, extract_llm_content, parse_llm_endpoint, truncate_chars};
use crate::models::{DerivedFact, FactSeverity};
use crate::traits::{NarrativeDraft, NarrativeGenerator, NarrativeRequest};

const OPERATION: &str = "narrative generation";
const TITLE_MAX_CHARS: usize = 120;
const BODY_MAX_CHARS: usize = 2_000;

pub struct HttpNarrativeGenerator {
    client: Client,
    endpoint: Url,
    config: NarrativeLlmConfig,
}

impl std::fmt::Debug for HttpNarrativeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNarrativeGenerator")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl HttpNarrativeGenerator {
    pub fn new(config: NarrativeLlmConfig) -> Result<Self> {
        let endpoint = parse_llm_endpoint(&config.endpoint, "narrative endpoint")
            .map_err(OntoscopeError::Validation)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| OntoscopeError::collaborator(OPERATION, format!("client build failed: {err}")))?;
        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn send(&self, prompt: &str) -> Result<Value> {
        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "stream": false,
            "max_tokens": self.config.max_output_tokens,
            "temperature": self.config.temperature(),
            "options": {
                "temperature": self.config.temperature(),
                "num_predict": self.config.max_output_tokens
            }
        });
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .map_err(|err| OntoscopeError::collaborator(OPERATION, format!("request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(OntoscopeError::collaborator(
                OPERATION,
                format!("non-success status: {status}"),
            ));
        }
        response.json::<Value>().map_err(|err| {
            OntoscopeError::collaborator(OPERATION, format!("invalid json response: {err}"))
        })
    }
}

impl NarrativeGenerator for HttpNarrativeGenerator {
    fn generate_narrative(&self, request: &NarrativeRequest) -> Result<NarrativeDraft> {
        let prompt = build_narrative_prompt(request);
        let value = self.send(&prompt)?;
        let draft = parse_narrative_response(&value)?;
        tracing::debug!(
            entity = %request.entity_name,
            facts = request.facts.len(),
            model = %self.config.model,
            "narrative drafted"
        );
        Ok(draft)
    }
}

const SYSTEM_PROMPT: &str = "You are a brand sentiment analyst. \
Reply with a single JSON object and nothing else.";

/// User prompt listing every fact of the group, one numbered line each.
pub fn build_narrative_prompt(request: &NarrativeRequest) -> String {
    let fact_lines = request
        .facts
        .iter()
        .enumerate()
        .map(|(idx, fact)| format_fact_line(idx + 1, fact))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Write a weekly insight for \"{name}\" ({class}).\n\n\
         Period: {period}\n\n\
         Alerts and trends produced by the inference engine:\n\
         {fact_lines}\n\n\
         Requirements:\n\
         1. Connect causes: point out how the alerts relate to each other.\n\
         2. Summarise the overall direction: rising, falling or diverging.\n\
         3. End with one sentence on what the brand should watch next.\n\
         4. title: a short headline of at most 20 words.\n\
         5. body: 100 to 200 words, professional but readable.\n\n\
         Reply as JSON: {{\"title\": \"...\", \"body\": \"...\"}}",
        name = request.entity_name,
        class = request.entity_class,
        period = request.period_label,
    )
}

fn format_fact_line(position: usize, fact: &DerivedFact) -> String {
    let label = match fact.severity {
        FactSeverity::Critical => "CRITICAL",
        FactSeverity::Warning => "WARNING",
        FactSeverity::Info => "INFO",
    };
    if fact.description.is_empty() {
        format!("{position}. [{label}] {}", fact.title)
    } else {
        format!("{position}. [{label}] {}: {}", fact.title, fact.description)
    }
}

/// Extracts `{title, body}` from the model reply; both must be non-empty.
pub fn parse_narrative_response(value: &Value) -> Result<NarrativeDraft> {
    if let Some(message) = value
        .get("error")
        .and_then(|error| error.get("message").or(Some(error)))
        .and_then(Value::as_str)
    {
        return Err(OntoscopeError::collaborator(
            OPERATION,
            format!("endpoint error: {message}"),
        ));
    }
    let content = extract_llm_content(value).ok_or_else(|| {
        OntoscopeError::Validation("narrative response has no message content".to_string())
    })?;
    let fragment = extract_json_fragment(&content).ok_or_else(|| {
        OntoscopeError::Validation(format!(
            "no JSON object found in narrative response: {}",
            truncate_chars(&content, 200)
        ))
    })?;
    let draft = serde_json::from_str::<NarrativeDraft>(&fragment).map_err(|err| {
        OntoscopeError::Validation(format!("narrative response is not a title/body object: {err}"))
    })?;

    let title = truncate_chars(draft.title.trim(), TITLE_MAX_CHARS);
    let body = truncate_chars(draft.body.trim(), BODY_MAX_CHARS);
    if title.is_empty() || body.is_empty() {
        return Err(OntoscopeError::Validation(
            "narrative title and body must not be empty".to_string(),
        ));
    }
    Ok(NarrativeDraft { title, body })
}
