use super::state::{RequestError, RequestExtra, RequestState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transitions accepted by [`reduce`].
///
/// Actions arriving from outside (e.g. deserialized from a devtools bridge)
/// whose `type` is not listed here decode to [`RequestAction::Unrecognized`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RequestAction {
    #[serde(rename = "loading/start")]
    LoadingStart,
    #[serde(rename = "loading/stop")]
    LoadingStop,
    /// Clear data and error, mark loading.
    #[serde(rename = "loading/reset")]
    LoadingReset,
    #[serde(rename = "data/success")]
    DataSuccess(Value),
    #[serde(rename = "data/error")]
    DataError(RequestError),
    #[serde(rename = "data/reset")]
    DataReset,
    #[serde(rename = "error/reset")]
    ErrorReset,
    #[serde(rename = "response/save")]
    ResponseSave(Value),
    #[serde(rename = "response/reset")]
    ResponseReset,
    #[serde(rename = "extra/save")]
    ExtraSave(RequestExtra),
    #[serde(other)]
    Unrecognized,
}

impl RequestAction {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestAction::LoadingStart => "loading/start",
            RequestAction::LoadingStop => "loading/stop",
            RequestAction::LoadingReset => "loading/reset",
            RequestAction::DataSuccess(_) => "data/success",
            RequestAction::DataError(_) => "data/error",
            RequestAction::DataReset => "data/reset",
            RequestAction::ErrorReset => "error/reset",
            RequestAction::ResponseSave(_) => "response/save",
            RequestAction::ResponseReset => "response/reset",
            RequestAction::ExtraSave(_) => "extra/save",
            RequestAction::Unrecognized => "unrecognized",
        }
    }
}

/// Pure transition function for [`RequestState`].
///
/// `Unrecognized` returns the input state untouched.
pub fn reduce(state: RequestState, action: RequestAction) -> RequestState {
    match action {
        RequestAction::LoadingStart => RequestState {
            is_loading: true,
            ..state
        },
        RequestAction::LoadingStop => RequestState {
            is_loading: false,
            ..state
        },
        RequestAction::LoadingReset => RequestState {
            is_loading: true,
            data: None,
            error: None,
            is_success: false,
            ..state
        },
        RequestAction::DataSuccess(payload) => RequestState {
            data: Some(payload),
            error: None,
            is_loading: false,
            is_success: true,
            ..state
        },
        RequestAction::DataError(error) => RequestState {
            data: None,
            error: Some(error),
            is_loading: false,
            is_success: false,
            ..state
        },
        RequestAction::DataReset => RequestState { data: None, ..state },
        RequestAction::ErrorReset => RequestState {
            error: None,
            ..state
        },
        RequestAction::ResponseSave(payload) => RequestState {
            response: Some(payload),
            ..state
        },
        RequestAction::ResponseReset => RequestState {
            response: None,
            ..state
        },
        RequestAction::ExtraSave(extra) => RequestState {
            extra,
            data: None,
            error: None,
            response: None,
            is_loading: false,
            ..state
        },
        RequestAction::Unrecognized => state,
    }
}
