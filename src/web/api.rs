use crate::erx::LayoutedC;
use axum::http::StatusCode;
use axum::response::Response;
use serde::{Deserialize, Serialize};

pub type OutAny = Out<serde_json::Value>;

#[derive(Serialize, Deserialize, Debug)]
pub struct Out<T: Serialize> {
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Out<T> {
    pub fn new(code: LayoutedC, message: Option<String>, data: Option<T>) -> Self {
        Out { code: code.into(), message, data }
    }

    pub fn code_message(code: LayoutedC, message: &str) -> Self {
        let message = if message.is_empty() { None } else { crate::tos!(message) };
        Out { code: code.into(), message, data: None }
    }

    pub fn ok(data: T) -> Self {
        Out { code: LayoutedC::okay().into(), message: None, data: Some(data) }
    }
}

impl<T: Serialize> axum::response::IntoResponse for Out<T> {
    fn into_response(self) -> Response {
        const API_HEADERS: [(&str, &str); 2] = [("Content-Type", "application/json"), ("Powered-By", "siteguard")];

        match serde_json::to_string(&self) {
            Ok(body) => (StatusCode::OK, API_HEADERS, body).into_response(),
            Err(err) => {
                let body = format!(r#"{{"code":"{}","message":"json serialization error: {}"}}"#, self.code, err);
                (StatusCode::INTERNAL_SERVER_ERROR, API_HEADERS, body).into_response()
            },
        }
    }
}
