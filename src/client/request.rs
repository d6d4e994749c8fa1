//! Re-buildable request descriptions.
//!
//! A `reqwest::RequestBuilder` is consumed when it is sent, and multipart
//! bodies cannot be cloned, so the pipeline keeps a plain description of
//! each request and builds a fresh `reqwest` request for every attempt.

use reqwest::Method;
use serde::Serialize;
use std::path::Path;

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: RequestBody,
    pub(crate) authenticated: bool,
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            authenticated: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(ApiError::Encode)?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    /// Send without a bearer token and without the refresh-on-401 path.
    pub fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

/// A file to upload with a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Read a local file. A missing or unreadable file is a validation error.
    pub async fn from_path(path: &Path) -> Result<Self, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ApiError::validation_field(
                "attachments",
                format!("Cannot read {}: {}", path.display(), e),
            )
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

#[derive(Debug, Clone)]
enum FormPart {
    Text { name: String, value: String },
    File { name: String, attachment: Attachment },
}

/// Multipart body kept as plain parts so it can be rebuilt on retry.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl ToString) -> Self {
        self.parts.push(FormPart::Text {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn text_opt(self, name: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.text(name, value),
            None => self,
        }
    }

    pub fn file(mut self, name: &str, attachment: Attachment) -> Self {
        self.parts.push(FormPart::File {
            name: name.to_string(),
            attachment,
        });
        self
    }

    pub fn files(self, name: &str, attachments: &[Attachment]) -> Self {
        attachments
            .iter()
            .fold(self, |form, a| form.file(name, a.clone()))
    }

    pub fn file_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, FormPart::File { .. }))
            .count()
    }

    pub(crate) fn to_form(&self) -> Result<reqwest::multipart::Form, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File { name, attachment } => {
                    let file = reqwest::multipart::Part::bytes(attachment.bytes.clone())
                        .file_name(attachment.file_name.clone())
                        .mime_str(&attachment.content_type)
                        .map_err(ApiError::Transport)?;
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_guesses_content_type() {
        assert_eq!(
            Attachment::new("brief.pdf", vec![1]).content_type,
            "application/pdf"
        );
        assert_eq!(
            Attachment::new("avatar.PNG", vec![1]).content_type,
            "image/png"
        );
        assert_eq!(
            Attachment::new("blob", vec![1]).content_type,
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_attachment_from_missing_path_is_validation_error() {
        let err = Attachment::from_path(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_attachment_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope.txt");
        std::fs::write(&path, b"scope of work").unwrap();

        let attachment = Attachment::from_path(&path).await.unwrap();
        assert_eq!(attachment.file_name, "scope.txt");
        assert_eq!(attachment.content_type, "text/plain");
        assert_eq!(attachment.bytes, b"scope of work");
    }

    #[test]
    fn test_request_builders() {
        let request = ApiRequest::get("tenders/")
            .query("search", "roof")
            .query_opt("category", None::<String>)
            .anonymous();
        assert_eq!(*request.method(), Method::GET);
        assert_eq!(request.query.len(), 1);
        assert!(!request.is_authenticated());

        let form = MultipartForm::new()
            .text("title", "Logo")
            .files("attachments", &[Attachment::new("a.png", vec![0])]);
        assert_eq!(form.file_count(), 1);
        assert!(form.to_form().is_ok());
    }

    #[test]
    fn test_unencodable_body_is_encode_error() {
        let mut body = std::collections::HashMap::new();
        body.insert((1, 2), "non-string keys have no JSON form");

        let err = ApiRequest::post("tenders/").json(&body).unwrap_err();
        assert!(matches!(err, ApiError::Encode(_)));
        assert!(err.to_string().starts_with("failed to encode request body"));
    }
}
