use axum::{extract::State, http::StatusCode, Json};
use backline_order::SettlementOutcome;

use crate::state::AppState;

/// POST /v1/webhooks/payment
/// Provider callback. The payload's status field is advisory only; the
/// state is re-fetched from the provider, so a forged body cannot flip an
/// order. Processing failures still ACK with 200 because settlement is
/// idempotent and the next poll or retry lands the same result.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    let Some(payment_id) = payment_id_of(&payload).map(str::to_string) else {
        tracing::warn!("Webhook payload without a payment id");
        return StatusCode::BAD_REQUEST;
    };

    tracing::info!("Received payment webhook for {}", payment_id);

    match state
        .orders
        .process_provider_callback(&payment_id, Some(payload))
        .await
    {
        Ok(SettlementOutcome::Booked { items }) => {
            tracing::info!(
                "Webhook settled {} item(s) for payment {}",
                items,
                payment_id
            );
        }
        Ok(outcome) => {
            tracing::debug!("Webhook for payment {} resolved as {:?}", payment_id, outcome);
        }
        Err(err) => {
            tracing::error!("Webhook processing failed for payment {}: {}", payment_id, err);
        }
    }

    StatusCode::OK
}

fn payment_id_of(payload: &serde_json::Value) -> Option<&str> {
    payload.get("id").and_then(|v| v.as_str())
}
