//! Autonomy context — per-user tier (L0–L3) and the global emergency brake.
//!
//! Both are externally-owned, read-mostly state: this subsystem observes
//! them and never mutates them. They are re-fetched at every step boundary
//! rather than cached for a run, so an engaged brake is observed by
//! in-flight work within its latency bound.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

pub mod gate;
pub mod handlers;
pub mod queue;

/// Per-user autonomy tier. Ordered: a higher tier grants every capability
/// of the tiers below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    L0,
    L1,
    L2,
    L3,
}

impl Tier {
    pub fn from_i16(value: i16) -> Tier {
        match value {
            1 => Tier::L1,
            2 => Tier::L2,
            3 => Tier::L3,
            _ => Tier::L0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::L0 => "L0",
            Tier::L1 => "L1",
            Tier::L2 => "L2",
            Tier::L3 => "L3",
        }
    }
}

/// Read-only window onto the externally-owned autonomy state.
///
/// Table `user_autonomy` (owned by the admin flow): user_id, tier smallint,
/// brake_engaged boolean. A user with no row defaults to L0 with the brake
/// clear.
#[async_trait]
pub trait AutonomyStateProvider: Send + Sync {
    async fn tier(&self, user_id: Uuid) -> Result<Tier>;
    async fn brake_engaged(&self, user_id: Uuid) -> Result<bool>;
}

pub struct PgAutonomyProvider {
    pool: PgPool,
}

impl PgAutonomyProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AutonomyStateProvider for PgAutonomyProvider {
    async fn tier(&self, user_id: Uuid) -> Result<Tier> {
        let tier: Option<i16> =
            sqlx::query_scalar("SELECT tier FROM user_autonomy WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(tier.map(Tier::from_i16).unwrap_or(Tier::L0))
    }

    async fn brake_engaged(&self, user_id: Uuid) -> Result<bool> {
        let engaged: Option<bool> =
            sqlx::query_scalar("SELECT brake_engaged FROM user_autonomy WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(engaged.unwrap_or(false))
    }
}

/// In-memory provider for tests. The brake is an atomic so a test can flip
/// it while a run is in flight.
#[cfg(test)]
pub struct StaticAutonomyProvider {
    tier: Tier,
    brake: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl StaticAutonomyProvider {
    pub fn new(tier: Tier, brake_engaged: bool) -> Self {
        Self {
            tier,
            brake: std::sync::atomic::AtomicBool::new(brake_engaged),
        }
    }

    pub fn engage_brake(&self) {
        self.brake.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
#[async_trait]
impl AutonomyStateProvider for StaticAutonomyProvider {
    async fn tier(&self, _user_id: Uuid) -> Result<Tier> {
        Ok(self.tier)
    }

    async fn brake_engaged(&self, _user_id: Uuid) -> Result<bool> {
        Ok(self.brake.load(std::sync::atomic::Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::L0 < Tier::L1);
        assert!(Tier::L2 < Tier::L3);
    }

    #[test]
    fn test_tier_from_i16_defaults_to_l0() {
        assert_eq!(Tier::from_i16(0), Tier::L0);
        assert_eq!(Tier::from_i16(3), Tier::L3);
        assert_eq!(Tier::from_i16(-7), Tier::L0);
        assert_eq!(Tier::from_i16(99), Tier::L0);
    }
}
