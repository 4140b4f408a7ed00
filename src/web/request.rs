use crate::erx::Erx;
use axum::body::Bytes;
use axum::extract::Request;
use axum::http::request::Parts;

/// body limit when buffering a request
pub const BODY_LIMIT: usize = 1024 * 1024 * 2;

/// 可重用的请求克隆器
/// buffers the body once so it can be inspected and still handed to the next service.
/// a body that can not be read (too large, broken stream) is replaced by an empty one
/// and the failure is kept in `read_error`
pub struct RequestCloner {
    parts: Parts,
    body_bytes: Bytes,
    read_error: Option<Erx>,
}

impl RequestCloner {
    pub async fn buffer(req: Request, limit: usize) -> Self {
        let (parts, body) = req.into_parts();
        match axum::body::to_bytes(body, limit).await {
            Ok(bytes) => Self { parts, body_bytes: bytes, read_error: None },
            Err(e) => {
                tracing::warn!("request body read failed, path:{} error:{}", parts.uri.path(), e);
                let read_error = Erx::new(&format!("request body read failed: {}", e));
                Self { parts, body_bytes: Bytes::new(), read_error: Some(read_error) }
            },
        }
    }

    pub fn into_request(self) -> Request {
        Request::from_parts(self.parts, axum::body::Body::from(self.body_bytes))
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    pub fn body(&self) -> &Bytes {
        &self.body_bytes
    }

    pub fn read_error(&self) -> Option<&Erx> {
        self.read_error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffer_keeps_body() {
        let req = Request::builder().method("POST").uri("/login").body(axum::body::Body::from("email=a")).unwrap();
        let cloner = RequestCloner::buffer(req, BODY_LIMIT).await;
        assert!(cloner.read_error().is_none());
        assert_eq!(&cloner.body()[..], b"email=a");
        assert_eq!(cloner.parts().uri.path(), "/login");

        let owned = cloner.into_request();
        let bytes = axum::body::to_bytes(owned.into_body(), BODY_LIMIT).await.unwrap();
        assert_eq!(&bytes[..], b"email=a");
    }

    #[tokio::test]
    async fn test_body_too_large() {
        let req = Request::builder().uri("/big").body(axum::body::Body::from(vec![0u8; 64])).unwrap();
        let cloner = RequestCloner::buffer(req, 16).await;
        assert!(cloner.read_error().is_some());
        assert!(cloner.body().is_empty());
        assert_eq!(cloner.parts().uri.path(), "/big");
    }
}
