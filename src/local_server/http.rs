use std::sync::{Arc, Mutex};

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use tokio::sync::oneshot;

use crate::{AuthError, CallbackResult};

pub(super) type ResponseResult = Result<CallbackResult, AuthError>;
pub(super) type ResponseSender = oneshot::Sender<ResponseResult>;
pub(super) type ResponseReceiver = oneshot::Receiver<ResponseResult>;
pub(super) type SharedResponseSender = Arc<Mutex<Option<ResponseSender>>>;

#[derive(Clone)]
pub(super) struct LocalServerState {
    pub(super) success_html: String,
    pub(super) error_html: String,
    pub(super) response_tx: SharedResponseSender,
}

/// Delivers into the single result slot. Returns false once the slot is spent.
pub(super) fn send_response(response_tx: &SharedResponseSender, response: ResponseResult) -> bool {
    let Ok(mut guard) = response_tx.lock() else {
        return false;
    };
    match guard.take() {
        Some(sender) => sender.send(response).is_ok(),
        None => false,
    }
}

pub(super) async fn callback_handler(
    State(state): State<LocalServerState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let LocalServerState {
        success_html,
        error_html,
        response_tx,
    } = state;

    let result = CallbackResult::from_query(query.as_deref().unwrap_or_default());
    if !result.is_redirect() {
        return (
            StatusCode::BAD_REQUEST,
            Html(render_error(&error_html, "invalid_request", None)),
        );
    }

    let page = match &result.error {
        Some(error) => render_error(&error_html, error, result.error_description.as_deref()),
        None => success_html,
    };

    if !send_response(&response_tx, Ok(result)) {
        tracing::debug!("discarding callback received after the first delivery");
    }

    (StatusCode::OK, Html(page))
}

fn render_error(template: &str, error: &str, description: Option<&str>) -> String {
    template
        .replace("{{error}}", &escape_html(error))
        .replace("{{error_description}}", &escape_html(description.unwrap_or_default()))
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_error_escapes_provider_text() {
        let page = render_error(
            "<p>{{error}}</p><p>{{error_description}}</p>",
            "access_denied",
            Some("<script>alert('x')</script>"),
        );
        assert_eq!(
            page,
            "<p>access_denied</p><p>&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;</p>"
        );
    }

    #[test]
    fn send_response_fills_slot_once() {
        let (tx, mut rx) = oneshot::channel();
        let shared: SharedResponseSender = Arc::new(Mutex::new(Some(tx)));

        let first = CallbackResult::from_query("code=first&state=s");
        let second = CallbackResult::from_query("code=second&state=s");
        assert!(send_response(&shared, Ok(first)));
        assert!(!send_response(&shared, Ok(second)));

        let delivered = rx.try_recv().unwrap().unwrap();
        assert_eq!(delivered.code, "first");
    }
}
