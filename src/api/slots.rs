use crate::error::{AppError, GameError, Result};
use crate::services::keys::normalize_player;
use crate::services::messages::{self, decorate};
use crate::services::Granted;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;

/// Query string of a chat command.
#[derive(Debug, Default, Deserialize)]
pub struct SlotsQuery {
    pub action: Option<String>,
    pub user: Option<String>,
    pub amount: Option<String>,
    pub target: Option<String>,
    pub item: Option<String>,
}

/// Run one chat command and reply with a single plain-text line.
async fn slots(State(state): State<AppState>, Query(query): Query<SlotsQuery>) -> Result<String> {
    let user = query
        .user
        .as_deref()
        .map(normalize_player)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing user".to_string()))?;
    let action = query
        .action
        .as_deref()
        .unwrap_or("spin")
        .trim()
        .to_lowercase();

    let line = run(&state, &action, &user, &query).await?;
    Ok(decorate(&line, &mut rand::thread_rng()))
}

async fn run(state: &AppState, action: &str, user: &str, query: &SlotsQuery) -> std::result::Result<String, GameError> {
    let game = &state.game;
    let amount = query.amount.as_deref().unwrap_or("");

    match action {
        "spin" => {
            let summary = game.spin(user, amount).await?;
            Ok(messages::spin_line(user, &summary))
        }
        "balance" => Ok(messages::balance_line(user, game.balance(user).await)),
        "freespins" => Ok(messages::free_spins_line(user, &game.free_spins(user).await)),
        "streak" => Ok(messages::streak_line(user, &game.streak(user).await)),
        "peek" | "activate" => {
            let item = if action == "peek" {
                "peek"
            } else {
                query.item.as_deref().unwrap_or("")
            };
            let activation = game.activate(user, item).await?;
            Ok(match activation.granted {
                Granted::Preview(grid) => format!(
                    "@{} peeks at the next spin: {} (-{}, balance {})",
                    user, grid, activation.price, activation.new_balance
                ),
                Granted::Token(token) => format!(
                    "@{} activated {} (-{}, balance {})",
                    user,
                    token.key_name(),
                    activation.price,
                    activation.new_balance
                ),
            })
        }
        "give" => {
            let target = query.target.as_deref().unwrap_or("");
            let outcome = game.give(user, target, amount).await?;
            Ok(format!(
                "@{} gave {} coins to @{} (balance {})",
                user,
                amount.trim(),
                normalize_player(target),
                outcome.new_balance
            ))
        }
        other => Err(GameError::UnknownAction(other.to_string())),
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/slots", get(slots))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parsing() {
        let query: SlotsQuery =
            serde_urlencoded::from_str("action=give&user=%40Ann&target=bob&amount=50").unwrap();
        assert_eq!(query.action.as_deref(), Some("give"));
        assert_eq!(query.user.as_deref(), Some("@Ann"));
        assert_eq!(query.target.as_deref(), Some("bob"));
        assert_eq!(query.amount.as_deref(), Some("50"));
        assert!(query.item.is_none());
    }

    #[test]
    fn test_empty_query() {
        let query: SlotsQuery = serde_urlencoded::from_str("").unwrap();
        assert!(query.user.is_none());
    }
}
