//! Chat-completions endpoint.
//!
//! The full request path: resolve the credential's limits, estimate tokens,
//! ask the shared limiter for admission, generate the mock completion, and
//! reconcile the output reservation against what was actually produced.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use tollgate_core::domain::{AdmissionRequest, AdmissionVerdict};
use tollgate_core::estimator;
use tollgate_shared::chat::ChatCompletionRequest;
use tollgate_shared::completion::{AssistantMessage, ChatCompletionResponse, Choice, Usage};

use crate::middleware::{BearerCredential, GatewayError};
use crate::state::AppState;

/// POST /v1/chat/completions
pub async fn chat_completions(
    state: web::Data<AppState>,
    credential: BearerCredential,
    body: web::Bytes,
) -> Result<HttpResponse, GatewayError> {
    let limits = state
        .credentials
        .resolve(credential.key())
        .ok_or(GatewayError::UnknownCredential)?;

    let request: ChatCompletionRequest =
        serde_json::from_slice(&body).map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
    request
        .validate()
        .map_err(|msg| GatewayError::InvalidRequest(msg.to_string()))?;

    let prompt_tokens = estimator::estimate_input_tokens(&request.messages);
    let output_budget = estimator::output_token_budget(request.max_tokens);

    let admission = state
        .admission
        .try_admit(
            credential.key(),
            limits,
            AdmissionRequest {
                input_tokens: prompt_tokens,
                output_token_estimate: u64::from(output_budget),
            },
        )
        .await
        .map_err(|e| {
            state.metrics.record_failed();
            GatewayError::from(e)
        })?;

    let grant = match admission {
        AdmissionVerdict::Allowed(grant) => grant,
        AdmissionVerdict::Denied {
            dimension,
            retry_after_ms,
        } => {
            state.metrics.record_throttled();
            return Err(GatewayError::RateLimited {
                dimension,
                retry_after_ms,
            });
        }
    };

    let content = build_mock_content(&request, output_budget);
    let completion_tokens =
        estimator::estimate_text_tokens(&content).min(u64::from(output_budget));

    // The admission reserved the full budget; give back what generation did
    // not use. Failures are dropped - the bucket expires with the window.
    let delta = completion_tokens as i64 - i64::from(output_budget);
    if delta != 0 {
        if let Err(e) = state
            .admission
            .reconcile_output(credential.key(), grant.submit_second, delta)
            .await
        {
            tracing::warn!(error = %e, "Output reconciliation failed");
        }
    }

    state.metrics.record_success();
    tracing::debug!(
        requests = grant.usage.requests,
        input_tokens = grant.usage.input_tokens,
        output_tokens = grant.usage.output_tokens,
        "Request admitted"
    );

    let usage = Usage::new(prompt_tokens, completion_tokens);
    Ok(HttpResponse::Ok().json(mock_envelope(&request.model, content, usage, &state.node_id)))
}

fn build_mock_content(request: &ChatCompletionRequest, output_budget: u32) -> String {
    let last_user = request.last_user_text().unwrap_or("Hello");
    let preview: String = last_user.chars().take(120).collect();
    format!("Mock response ({output_budget} tokens) to: {preview}")
}

fn mock_envelope(
    model: &str,
    content: String,
    usage: Usage,
    node_id: &str,
) -> ChatCompletionResponse {
    let id = Uuid::new_v4().simple().to_string();
    ChatCompletionResponse {
        id: format!("chatcmpl-{}", &id[..24]),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content,
            },
            finish_reason: "stop".to_string(),
        }],
        usage,
        node_id: Some(node_id.to_string()),
    }
}
