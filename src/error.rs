use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid letter '{0}': expected a single ASCII letter a-z")]
    InvalidLetter(String),

    #[error("Unexpected table shape: {message}")]
    TableShape { message: String },

    #[error(
        "{} row(s) without an ISO-3 code: {}{}",
        .unresolved.len(),
        .unresolved.join(", "),
        letter_error_suffix(.letter_errors)
    )]
    Unreconciled {
        unresolved: Vec<String>,
        /// Letters that failed to parse in the same run.
        letter_errors: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, ScraperError>;

fn letter_error_suffix(errors: &[String]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!(" ({} letter(s) also failed to parse: {})", errors.len(), errors.join("; "))
    }
}
