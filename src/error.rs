use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Route error: {0}")]
    Route(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for NavError {
    fn from(err: reqwest::Error) -> Self {
        NavError::Api(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
