use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlyphKnnError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Concurrency misuse: {0}")]
    ConcurrencyMisuse(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Settings parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Settings write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, GlyphKnnError>;
