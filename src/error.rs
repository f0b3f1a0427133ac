use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("API error after {attempts} attempts (status {status}): {body}")]
    RetriesExhausted { attempts: u32, status: u16, body: String },

    #[error("Report job {job_id} failed with status {status}")]
    ReportFailed { job_id: String, status: String },

    #[error("Report job {job_id} not ready after {attempts} polls")]
    ReportTimeout { job_id: String, attempts: u32 },

    #[error("Report job {job_id} has no download URL")]
    MissingDownloadUrl { job_id: String },

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
