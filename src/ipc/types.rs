use rusqlite::Connection;
use serde::Deserialize;

/// One stdin line. `params` defaults to `null` so parameterless methods
/// such as `health` can omit it.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Session state shared by every handler: the in-memory school store.
pub struct AppState {
    pub db: Connection,
}
