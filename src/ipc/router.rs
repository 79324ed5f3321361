use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type Family = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const FAMILIES: [Family; 10] = [
    handlers::core::try_handle,
    handlers::setup::try_handle,
    handlers::students::try_handle,
    handlers::courses::try_handle,
    handlers::evaluations::try_handle,
    handlers::grades::try_handle,
    handlers::schedule::try_handle,
    handlers::payments::try_handle,
    handlers::calendar::try_handle,
    handlers::reports::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    for family in FAMILIES {
        if let Some(resp) = family(state, &req) {
            return resp;
        }
    }

    tracing::warn!(method = %req.method, id = %req.id, "unknown method");
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
