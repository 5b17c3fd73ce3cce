pub mod activation;
pub mod buffs;
pub mod cooldown;
pub mod deferred;
pub mod game;
pub mod grid;
pub mod jackpot;
pub mod ledger;
pub mod memory_store;
pub mod messages;
pub mod peek;
pub mod pipeline;
pub mod redis_store;
pub mod resolver;
pub mod special_items;
pub mod stake;
pub mod stats;
pub mod store;
pub mod streak;
pub mod weighted;

pub use activation::{Activation, Activator, EscalationRecord, Granted, ShopItem};
pub use buffs::BuffStore;
pub use cooldown::{Claim, CooldownGuard};
pub use deferred::DeferredTasks;
pub use game::GameService;
pub use grid::{GridGenerator, GridModifiers};
pub use jackpot::HourlyJackpot;
pub use ledger::{DebitOutcome, Ledger};
pub use memory_store::MemoryStore;
pub use peek::{PeekCache, PeekRecord};
pub use pipeline::{PayoutStep, PipelineInput, PipelineOutput, PIPELINE_ORDER};
pub use redis_store::RedisStore;
pub use stake::StakeRequest;
pub use stats::{AuditLog, MemorySink, StatsSink};
pub use store::{
    atomic_update, keys, Backend, KvStore, Mutation, RetryPolicy, StoreError, StoreResult, Updated,
};
pub use streak::{StreakOutcome, StreakTracker};
pub use weighted::WeightedTable;
