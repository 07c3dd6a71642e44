//! Small builders for common test fixtures.

use breakwater_core::{ResourceCategory, ResourceRequest, ResourceResponse};

/// A GET request for a data endpoint
pub fn data_request(url: &str) -> ResourceRequest {
    ResourceRequest::get(url, ResourceCategory::Data)
}

/// A GET request for a static script asset
pub fn script_request(url: &str) -> ResourceRequest {
    ResourceRequest::get(url, ResourceCategory::Script)
}

/// A 200 response with the given body
pub fn ok_response(body: &[u8]) -> ResourceResponse {
    ResourceResponse::ok(body.to_vec())
}

/// A 200 response with a JSON body
pub fn json_response(value: &serde_json::Value) -> ResourceResponse {
    ResourceResponse::ok(value.to_string().into_bytes())
}

/// A bodyless response with the given status
pub fn status_response(status: u16) -> ResourceResponse {
    ResourceResponse::with_status(status)
}
