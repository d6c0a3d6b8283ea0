use crate::api::error::ApiError;
use crate::api::models::{Message, Snapshot};

/// Everything the UI loop reacts to. Background tasks only ever talk to the loop through these.
#[derive(Debug)]
pub enum AppEvent {
    PollTick,
    PollFinished(Result<Snapshot, ApiError>),
    SendFinished {
        wa_id: String,
        result: Result<Message, ApiError>,
    },
    Connectivity(bool),
    /// New terminal width in columns.
    Resize(u16),
    Input(String),
    InputClosed,
}
