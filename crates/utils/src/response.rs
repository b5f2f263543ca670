use serde::{Deserialize, Serialize};

/// Envelope returned by every JSON endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T, E = ()> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_data: Option<E>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl<T, E> ApiResponse<T, E> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_data: None,
            message: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error_data: None,
            message: Some(message.to_string()),
        }
    }

    pub fn error_with_data(message: &str, data: E) -> Self {
        Self {
            success: false,
            data: None,
            error_data: Some(data),
            message: Some(message.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn error_data(&self) -> Option<&E> {
        self.error_data.as_ref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_omits_error_fields() {
        let response: ApiResponse<u32> = ApiResponse::success(7);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "data": 7 }));
    }

    #[test]
    fn error_with_data_round_trips() {
        let response: ApiResponse<(), String> =
            ApiResponse::error_with_data("reorder rejected", "partial".to_string());
        let json = serde_json::to_string(&response).unwrap();
        let parsed: ApiResponse<(), String> = serde_json::from_str(&json).unwrap();
        assert!(!parsed.is_success());
        assert_eq!(parsed.message(), Some("reorder rejected"));
        assert_eq!(parsed.error_data().map(String::as_str), Some("partial"));
    }
}
