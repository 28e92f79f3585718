use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Player HTTP request failed: {0}")]
    PlayerHttp(String),
    #[error("Failed to read player response body: {0}")]
    PlayerBody(String),
    #[error("Malformed player status document: {0}")]
    StatusParse(String),
    #[error("Metadata catalog error: {0}")]
    Catalog(String),
    #[error("Invalid player configuration: {0}")]
    Config(String),
}

impl DeckError {
    pub fn player_http(message: impl Into<String>) -> Self {
        DeckError::PlayerHttp(message.into())
    }

    pub fn status_parse(message: impl Into<String>) -> Self {
        DeckError::StatusParse(message.into())
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        DeckError::Catalog(message.into())
    }
}
