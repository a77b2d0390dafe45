use serde::Serialize;
use utils::response::OperationResult;

/// Result of one command, renderable as text or as an `OperationResult` JSON envelope.
#[derive(Debug)]
pub struct CommandOutput {
    pub success: bool,
    pub json: serde_json::Value,
    pub text: String,
}

impl CommandOutput {
    pub fn new<T: Serialize>(result: &OperationResult<T>, text: impl Into<String>) -> Self {
        let json = serde_json::to_value(result).unwrap_or_else(|e| {
            serde_json::json!({ "success": false, "message": format!("cannot encode result: {e}"), "data": null })
        });
        Self {
            success: result.is_success(),
            json,
            text: text.into(),
        }
    }

    pub fn error(error: &anyhow::Error) -> Self {
        let message = format!("{error:#}");
        Self::new(&OperationResult::<()>::failure(message.clone()), format!("error: {message}"))
    }

    pub fn print(&self, json: bool) {
        if json {
            match serde_json::to_string_pretty(&self.json) {
                Ok(text) => println!("{text}"),
                Err(_) => println!("{}", self.json),
            }
        } else if self.success {
            println!("{}", self.text);
        } else {
            eprintln!("{}", self.text);
        }
    }
}
