//! Hourly jackpot.
//!
//! Each UTC hour has one lucky second derived from the date. The first spin
//! to land on it wins the bonus; an NX claim record keyed by the hour keeps
//! it to one winner.

use crate::services::store::{keys, KvStore, StoreResult};
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Lifetime of the claim record; outlives the hour it guards.
const CLAIM_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Lucky second of the hour containing `at`.
pub fn lucky_second(at: &DateTime<Utc>) -> u32 {
    (at.day() * 7 + at.month() * 13 + at.hour() * 17) % 60
}

pub fn is_lucky(at: &DateTime<Utc>) -> bool {
    at.second() == lucky_second(at)
}

/// `YYYYMMDDHH` in UTC.
pub fn hour_stamp(at: &DateTime<Utc>) -> String {
    at.format("%Y%m%d%H").to_string()
}

pub struct HourlyJackpot<S> {
    store: Arc<S>,
    bonus: u64,
}

impl<S> Clone for HourlyJackpot<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bonus: self.bonus,
        }
    }
}

impl<S: KvStore> HourlyJackpot<S> {
    pub fn new(store: Arc<S>, bonus: u64) -> Self {
        Self { store, bonus }
    }

    /// Bonus won by a spin at `now_ms`, if it is the first on the lucky second.
    pub async fn try_claim(&self, player: &str, now_ms: i64) -> StoreResult<Option<u64>> {
        let Some(at) = Utc.timestamp_millis_opt(now_ms).single() else {
            return Ok(None);
        };
        if !is_lucky(&at) || self.bonus == 0 {
            return Ok(None);
        }
        let claimed = self
            .store
            .set_if_absent(&keys::hourly_jackpot(&hour_stamp(&at)), player, Some(CLAIM_TTL))
            .await?;
        if claimed {
            info!("Hourly jackpot {} claimed by {}", hour_stamp(&at), player);
        }
        Ok(claimed.then_some(self.bonus))
    }

    /// Hand back a claim whose spin was never settled. Only `player`'s own
    /// claim is removed.
    pub async fn release(&self, player: &str, now_ms: i64) -> StoreResult<bool> {
        let Some(at) = Utc.timestamp_millis_opt(now_ms).single() else {
            return Ok(false);
        };
        let released = self
            .store
            .compare_and_swap(&keys::hourly_jackpot(&hour_stamp(&at)), Some(player), None, None)
            .await?;
        if released {
            info!("Hourly jackpot {} released by {}", hour_stamp(&at), player);
        }
        Ok(released)
    }
}
