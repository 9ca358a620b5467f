//! Request and response bodies.

use serde::{Deserialize, Serialize};

use crate::users::User;

/// Acknowledgment returned by the background endpoint.
pub const STARTED: &str = "started";

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExecuteResponse {
    pub const fn completed(result: String) -> Self {
        Self {
            success: true,
            result: Some(result),
            message: None,
        }
    }

    pub fn started() -> Self {
        Self {
            success: true,
            result: None,
            message: Some(STARTED.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressUpdate {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressUpdated {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
