use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("template load failed for {resource}{}: {message}", status_suffix(.status))]
    TemplateLoad {
        resource: String,
        status: Option<u16>,
        message: String,
    },
    #[error("render error{}: {message}", render_context(.page, .field))]
    Render {
        page: Option<usize>,
        field: Option<String>,
        message: String,
    },
    #[error("merge error: {0}")]
    Merge(String),
    #[error("invalid inspection record: {0}")]
    InvalidRecord(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ReportError {
    pub(crate) fn render(message: impl Into<String>) -> Self {
        ReportError::Render {
            page: None,
            field: None,
            message: message.into(),
        }
    }

    pub(crate) fn render_at(
        page: usize,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ReportError::Render {
            page: Some(page),
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

fn render_context(page: &Option<usize>, field: &Option<String>) -> String {
    match (page, field.as_deref()) {
        (Some(page), Some(field)) => format!(" on page {} field {}", page + 1, field),
        (Some(page), None) => format!(" on page {}", page + 1),
        (None, Some(field)) => format!(" field {field}"),
        (None, None) => String::new(),
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct FetchTransportError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoFetchStage {
    ResolveUrl,
    Fetch,
    Status,
    Decode,
}

impl PhotoFetchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoFetchStage::ResolveUrl => "resolve_url",
            PhotoFetchStage::Fetch => "fetch",
            PhotoFetchStage::Status => "status",
            PhotoFetchStage::Decode => "decode",
        }
    }
}

// Collected into the report summary, never returned from `generate`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("photo {media_id} failed at {}: {message}", .stage.as_str())]
pub struct PhotoFetchError {
    pub media_id: String,
    pub stage: PhotoFetchStage,
    pub message: String,
}

pub(crate) fn lopdf_err(err: lopdf::Error) -> ReportError {
    ReportError::render(format!("pdf error: {err}"))
}
