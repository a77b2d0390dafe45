use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Uniform `{success, message, data}` envelope for anything a caller renders
/// (CLI `--json` output, dashboard toasts).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct OperationResult<T> {
    success: bool,
    message: Option<String>,
    data: Option<T>,
}

impl<T> OperationResult<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    /// A failed operation that still produced a report worth showing.
    pub fn failure_with_data(data: T, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serializes_null_data() {
        let result: OperationResult<u32> = OperationResult::failure("pg_dump exited with 1");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "message": "pg_dump exited with 1",
                "data": null
            })
        );
    }
}
