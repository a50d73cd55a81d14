//! services/api/src/adapters/research_llm.rs
//!
//! This module contains the adapter for the literature-analysis LLM.
//! It implements the `ResearchService` port from the `core` crate.

const SYSTEM_INSTRUCTIONS: &str = r#"You are a research copilot that writes literature analyses for academic researchers.

Rules:
- Cite only real, verifiable publications from journals, conferences, or arXiv.
- Cite inline in square brackets with the author and a four-digit year, e.g. [Smith 2020] or [Lee et al. 2021].
- Every inline citation must have a matching entry in "references" with the same author and year.
- Never invent DOIs or URLs. Leave "url" empty when unsure.
- Respond with a single JSON object and nothing else. No markdown fences."#;

const USER_INPUT_TEMPLATE: &str = r#"RESEARCH QUESTION:
{query}

Write a literature analysis with exactly {sections} sections and between {references_min} and {references_max} references.

Return JSON with this shape:
{
  "summary": "executive summary with inline citations",
  "sections": [{"title": "...", "content": "... with inline citations ..."}],
  "references": [{"citation": "Smith et al. 2020", "authors": "...", "title": "...", "venue": "...", "year": 2020, "url": "...", "type": "journal|conference|preprint"}],
  "keyTerms": ["..."],
  "relatedFields": ["..."],
  "suggestedCollaborations": ["..."]
}"#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use research_copilot_core::ports::{ResearchRequest, ResearchService};
use research_copilot_core::query::{QueryError, QueryResponse};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ResearchService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiResearchAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiResearchAdapter {
    /// Creates a new `OpenAiResearchAdapter`. Calls running past `timeout` are abandoned.
    pub fn new(client: Client<OpenAIConfig>, model: String, timeout: Duration) -> Self {
        Self {
            client,
            model,
            timeout,
        }
    }

    fn user_input(request: &ResearchRequest) -> String {
        USER_INPUT_TEMPLATE
            .replace("{query}", &request.query)
            .replace("{sections}", &request.limits.sections.to_string())
            .replace("{references_min}", &request.limits.references.start().max(&5).to_string())
            .replace("{references_max}", &request.limits.references.end().to_string())
    }

    async fn complete(&self, request: &ResearchRequest) -> Result<String, QueryError> {
        let malformed = |e: OpenAIError| QueryError::MalformedResponse(e.to_string());
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(malformed)?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(Self::user_input(request))
                .build()
                .map_err(malformed)?
                .into(),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(malformed)?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(classify_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                QueryError::MalformedResponse("LLM response contained no text content".to_string())
            })
    }
}

/// Maps client failures onto the user-facing taxonomy.
fn classify_error(e: OpenAIError) -> QueryError {
    match e {
        OpenAIError::Reqwest(err) if err.is_timeout() => QueryError::Timeout,
        OpenAIError::Reqwest(err) => match err.status() {
            Some(status) => classify_status(status.as_u16(), err.to_string()),
            None => QueryError::NetworkUnavailable(err.to_string()),
        },
        OpenAIError::ApiError(api) => classify_api_message(api.message),
        err @ OpenAIError::JSONDeserialize(..) => QueryError::MalformedResponse(err.to_string()),
        other => QueryError::ServerError(other.to_string()),
    }
}

fn classify_status(status: u16, detail: String) -> QueryError {
    match status {
        429 => QueryError::RateLimited,
        401 | 403 => QueryError::Forbidden(detail),
        s if s >= 500 => QueryError::ServerError(detail),
        _ => QueryError::NetworkUnavailable(detail),
    }
}

fn classify_api_message(message: String) -> QueryError {
    let lowered = message.to_lowercase();
    if lowered.contains("rate limit") || lowered.contains("quota") {
        QueryError::RateLimited
    } else if lowered.contains("api key") || lowered.contains("permission") {
        QueryError::Forbidden(message)
    } else {
        QueryError::ServerError(message)
    }
}

/// Abandons `call` once `limit` has elapsed.
async fn within_deadline<F>(limit: Duration, call: F) -> Result<String, QueryError>
where
    F: Future<Output = Result<String, QueryError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            error!(timeout_secs = limit.as_secs(), "Research query timed out");
            Err(QueryError::Timeout)
        }
    }
}

/// Pulls the outermost JSON object out of a model reply, tolerating code fences.
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

pub(crate) fn parse_reply(raw: &str) -> Result<QueryResponse, QueryError> {
    let json = extract_json(raw).ok_or_else(|| {
        QueryError::MalformedResponse("reply contained no JSON object".to_string())
    })?;
    serde_json::from_str::<QueryResponse>(json)
        .map(QueryResponse::normalize)
        .map_err(|e| QueryError::MalformedResponse(e.to_string()))
}

//=========================================================================================
// `ResearchService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ResearchService for OpenAiResearchAdapter {
    /// Runs one literature analysis, giving up after the configured timeout.
    async fn research(&self, request: &ResearchRequest) -> Result<QueryResponse, QueryError> {
        info!(model = %self.model, sections = request.limits.sections, "Running research query");

        let raw = within_deadline(self.timeout, self.complete(request)).await?;
        debug!(reply_len = raw.len(), "Research reply received");

        let response = parse_reply(&raw)?;
        info!(
            sections = response.sections.len(),
            references = response.references.len(),
            "Research reply parsed"
        );
        Ok(response)
    }
}
