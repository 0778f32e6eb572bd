use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use backline_order::{CheckoutRequest, OrderStatus, OrderView};
use serde::Serialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::auth::SessionClaims, state::AppState};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub currency: String,
    pub redirect_url: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/orders
/// Checkout: validates the cart, claims every slot, creates the pending
/// order and hands back the provider redirect.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    let outcome = state.checkout.checkout(req, &claims.sub).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order_id: outcome.order.id,
            status: outcome.order.status,
            total_cents: outcome.order.total_cents,
            currency: outcome.order.currency.clone(),
            redirect_url: outcome.redirect_url,
        }),
    ))
}

/// GET /v1/orders/{id}
/// Pending orders are refreshed against the payment provider before the
/// stored state is returned; a provider outage degrades to stored state.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderView>, AppError> {
    let view = state.orders.fetch(order_id).await?;

    Ok(Json(view))
}

/// POST /v1/orders/{id}/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<CancelResponse>, AppError> {
    let order = state.orders.cancel(order_id).await?;

    Ok(Json(CancelResponse {
        order_id: order.id,
        status: order.status,
    }))
}

#[cfg(test)]
mod tests {
    use backline_order::{CartLine, CheckoutRequest};

    #[test]
    fn checkout_payload_parses_with_defaults() {
        let body = serde_json::json!({
            "lines": [{
                "kind": "room",
                "room": { "slug": "studio-a" },
                "date": "2025-06-12",
                "start": "10:00:00",
                "end": "11:00:00",
                "price_cents": 3500
            }],
            "customer": { "name": "Ana Reyes", "email": "ana@example.com" },
            "accepted_terms": true
        });

        let req: CheckoutRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.lines.len(), 1);
        assert!(req.accepted_terms);
        assert!(!req.wants_invoice);
        assert!(!req.marketing_opt_in);
        assert!(req.invoice.is_none());
        assert!(matches!(req.lines[0], CartLine::Room { .. }));
    }

    #[test]
    fn event_lines_parse_by_kind_tag() {
        let body = serde_json::json!({
            "lines": [{
                "kind": "event",
                "event_id": "40e6215d-b5c6-4896-987c-f30f3678f608",
                "date": "2025-07-01",
                "start": "18:00:00",
                "end": "18:45:00",
                "price_cents": 2500
            }],
            "customer": { "name": "Ana Reyes", "email": "ana@example.com" }
        });

        let req: CheckoutRequest = serde_json::from_value(body).unwrap();
        assert!(matches!(req.lines[0], CartLine::Event { .. }));
        assert!(!req.accepted_terms);
    }

    #[test]
    fn invoice_details_ride_along_when_requested() {
        let body = serde_json::json!({
            "lines": [],
            "customer": { "name": "Ana Reyes", "email": "ana@example.com", "phone": "+49 151 0000" },
            "wants_invoice": true,
            "invoice": { "company": "Reyes Sound GmbH", "vat_id": "DE999999999" },
            "accepted_terms": true
        });

        let req: CheckoutRequest = serde_json::from_value(body).unwrap();
        assert!(req.wants_invoice);
        let invoice = req.invoice.unwrap();
        assert_eq!(invoice.company.as_deref(), Some("Reyes Sound GmbH"));
        assert!(invoice.address.is_none());
    }
}
