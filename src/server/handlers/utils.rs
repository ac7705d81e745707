use axum::http::HeaderMap;

use crate::state::AppState;

/// Header naming the tenant a request acts for.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Tenant of the request, falling back to the configured default user.
pub fn tenant(headers: &HeaderMap, state: &AppState) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| state.settings.retrieval.default_user_id.clone())
}
