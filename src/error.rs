use crate::services::StoreError;
use crate::services::messages::decorate;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Game rule failures. Each renders as a line the chat client can show.
#[derive(Error, Debug)]
pub enum GameError {
    #[error("Invalid amount: {0}")]
    InvalidStake(String),

    #[error("Not enough coins: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("Slow down! Next spin in {}s", (.remaining_ms + 999) / 1000)]
    CooldownActive { remaining_ms: u64 },

    /// Near-simultaneous duplicate of an accepted request.
    #[error("duplicate request")]
    Duplicate,

    #[error("No free spins left")]
    NoFreeSpins,

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Unknown command: {0}")]
    UnknownAction(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Could not activate {0}, your coins were refunded")]
    ActivationRefunded(String),

    #[error("Could not activate {item}, a moderator will restore your coins (ref {reference})")]
    ActivationEscalated { item: String, reference: String },

    #[error("The slot machine is jammed, try again shortly")]
    Store(#[from] StoreError),
}

impl GameError {
    /// Text shown to the player. Duplicates are dropped silently.
    pub fn user_message(&self) -> Option<String> {
        match self {
            GameError::Duplicate => None,
            other => Some(other.to_string()),
        }
    }
}

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            // Game errors are ordinary chat replies, not HTTP failures.
            AppError::Game(e) => {
                if let GameError::Store(ref inner) = e {
                    tracing::warn!("Store failure surfaced to player: {}", inner);
                }
                let body = e
                    .user_message()
                    .map(|m| decorate(&m, &mut rand::thread_rng()))
                    .unwrap_or_default();
                (StatusCode::OK, body).into_response()
            }
            AppError::Anyhow(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
