//! The `{"data": ...}` envelope every `/api2/json` response is wrapped in.

use crate::core::domain::error::{ProxmoxError, ProxmoxResult};
use serde::{Deserialize, de::DeserializeOwned};

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Decodes the payload of an API response body.
pub fn decode_data<T: DeserializeOwned>(context: &str, body: &[u8]) -> ProxmoxResult<T> {
    serde_json::from_slice::<ApiResponse<T>>(body)
        .map(|response| response.data)
        .map_err(|e| ProxmoxError::decode(context, e))
}
