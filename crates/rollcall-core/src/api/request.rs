use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Method;
use serde::Serialize;

use super::ApiError;

/// Which pass of a call is being sent. A call is retried at most once,
/// after a successful token renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    Retry,
}

impl Attempt {
    /// The attempt that may follow this one, if any
    pub fn next(self) -> Option<Attempt> {
        match self {
            Attempt::Initial => Some(Attempt::Retry),
            Attempt::Retry => None,
        }
    }
}

/// A file sent as one part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(FilePart),
}

/// Description of one outbound call. Kept whole so it can be re-sent after renewal.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: RequestBody,
}

impl PendingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            method,
            path: path.into(),
            headers,
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, ApiError> {
        Ok(self.with_body(RequestBody::Json(serde_json::to_value(body)?)))
    }

    /// A copy of this request carrying `Authorization: Bearer <token>`
    pub fn with_bearer(&self, token: &str) -> Result<Self, ApiError> {
        let mut request = self.clone();
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
        value.set_sensitive(true);
        request.headers.insert(header::AUTHORIZATION, value);
        Ok(request)
    }

    /// The bearer token currently attached, if any
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_allows_one_retry() {
        assert_eq!(Attempt::Initial.next(), Some(Attempt::Retry));
        assert_eq!(Attempt::Retry.next(), None);
    }

    #[test]
    fn test_new_request_has_no_bearer() {
        let request = PendingRequest::get("/api/v1/auth/users/");
        assert!(request.bearer().is_none());
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.body(), &RequestBody::Empty);
    }

    #[test]
    fn test_with_bearer_leaves_original_untouched() {
        let original = PendingRequest::get("/x").with_bearer("A1").unwrap();
        let renewed = original.with_bearer("A2").unwrap();
        assert_eq!(original.bearer(), Some("A1"));
        assert_eq!(renewed.bearer(), Some("A2"));
        assert_eq!(renewed.headers().get_all(header::AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn test_with_json_encodes_body() {
        let request = PendingRequest::post("/login")
            .with_json(&serde_json::json!({"email": "a@x.com"}))
            .unwrap();
        match request.body() {
            RequestBody::Json(value) => assert_eq!(value["email"], "a@x.com"),
            other => panic!("unexpected body: {:?}", other),
        }
    }
}
