//! Uniform JSON envelope returned by every API route.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_carries_data() {
        let resp = ApiResponse::success(42);
        assert!(resp.success);
        assert_eq!(resp.data, Some(42));
        assert!(resp.message.is_none());
    }

    #[test]
    fn error_envelope_carries_message_only() {
        let resp: ApiResponse<()> = ApiResponse::error("nope");
        assert!(!resp.success);
        assert!(resp.data.is_none());
        assert_eq!(resp.message.as_deref(), Some("nope"));
    }

    #[test]
    fn serializes_with_stable_field_names() {
        let json = serde_json::to_value(ApiResponse::success("hi")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], "hi");
        assert!(json["message"].is_null());
    }
}
