//! Autonomy Gate — wraps every agent-initiated effect.
//!
//! State machine per action:
//! `{requested} → [brake check] → {tier check} → {suggest | draft | queue | execute}`.
//! The brake is evaluated first and unconditionally before any tier logic,
//! and re-checked at every step boundary inside a multi-step action via
//! `checkpoint`, so an engaged brake halts effects already in flight.

use anyhow::Result;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{AutonomyStateProvider, Tier};

/// An agent-initiated effect. `min_tier` is the capability floor: a user
/// below it gets a typed denial instead of a route.
#[derive(Debug, Clone, Copy)]
pub struct AgentAction {
    pub name: &'static str,
    pub min_tier: Tier,
}

/// The matching run — the one agent action this subsystem owns.
pub const MATCHING_RUN: AgentAction = AgentAction {
    name: "matching_run",
    min_tier: Tier::L0,
};

/// How a permitted action proceeds, by the user's own tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionRoute {
    /// L0: recommendation artifact only; no persisted effect beyond intent logging.
    Suggest,
    /// L1: persist a draft requiring explicit user activation.
    Draft,
    /// L2: insert an approval-queue row; resume only on explicit approve/reject.
    Queue,
    /// L3: execute immediately.
    Execute,
}

/// Typed refusal — surfaced to the caller, never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "refusal")]
pub enum GateRefusal {
    BrakeEngaged,
    TierDenied { required: Tier, actual: Tier },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Proceed(ActionRoute),
    Refused(GateRefusal),
}

/// Routes a requested action. Brake first, then tier floor, then the
/// user's tier picks the route.
pub async fn route_action(
    provider: &dyn AutonomyStateProvider,
    user_id: Uuid,
    action: &AgentAction,
) -> Result<GateDecision> {
    if provider.brake_engaged(user_id).await? {
        info!("Gate refused {} for {}: brake engaged", action.name, user_id);
        return Ok(GateDecision::Refused(GateRefusal::BrakeEngaged));
    }

    let tier = provider.tier(user_id).await?;
    if tier < action.min_tier {
        info!(
            "Gate refused {} for {}: tier {} below required {}",
            action.name,
            user_id,
            tier.as_str(),
            action.min_tier.as_str()
        );
        return Ok(GateDecision::Refused(GateRefusal::TierDenied {
            required: action.min_tier,
            actual: tier,
        }));
    }

    let route = match tier {
        Tier::L0 => ActionRoute::Suggest,
        Tier::L1 => ActionRoute::Draft,
        Tier::L2 => ActionRoute::Queue,
        Tier::L3 => ActionRoute::Execute,
    };
    info!(
        "Gate routed {} for {} at tier {}: {:?}",
        action.name,
        user_id,
        tier.as_str(),
        route
    );
    Ok(GateDecision::Proceed(route))
}

/// Step-boundary brake re-check. Called between pipeline stages and inside
/// per-job loops so an engaged brake is honored within its latency bound.
pub async fn checkpoint(
    provider: &dyn AutonomyStateProvider,
    user_id: Uuid,
) -> Result<Option<GateRefusal>> {
    if provider.brake_engaged(user_id).await? {
        Ok(Some(GateRefusal::BrakeEngaged))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autonomy::StaticAutonomyProvider;

    #[tokio::test]
    async fn test_brake_blocks_every_tier_including_l3() {
        for tier in [Tier::L0, Tier::L1, Tier::L2, Tier::L3] {
            let provider = StaticAutonomyProvider::new(tier, true);
            let decision = route_action(&provider, Uuid::new_v4(), &MATCHING_RUN)
                .await
                .unwrap();
            assert_eq!(
                decision,
                GateDecision::Refused(GateRefusal::BrakeEngaged),
                "tier {tier:?} must still be brake-blocked"
            );
        }
    }

    #[tokio::test]
    async fn test_tiers_route_to_their_modes() {
        let cases = [
            (Tier::L0, ActionRoute::Suggest),
            (Tier::L1, ActionRoute::Draft),
            (Tier::L2, ActionRoute::Queue),
            (Tier::L3, ActionRoute::Execute),
        ];
        for (tier, expected) in cases {
            let provider = StaticAutonomyProvider::new(tier, false);
            let decision = route_action(&provider, Uuid::new_v4(), &MATCHING_RUN)
                .await
                .unwrap();
            assert_eq!(decision, GateDecision::Proceed(expected));
        }
    }

    #[tokio::test]
    async fn test_tier_below_floor_is_denied() {
        let action = AgentAction {
            name: "auto_apply",
            min_tier: Tier::L2,
        };
        let provider = StaticAutonomyProvider::new(Tier::L1, false);
        let decision = route_action(&provider, Uuid::new_v4(), &action)
            .await
            .unwrap();
        assert_eq!(
            decision,
            GateDecision::Refused(GateRefusal::TierDenied {
                required: Tier::L2,
                actual: Tier::L1,
            })
        );
    }

    #[tokio::test]
    async fn test_brake_checked_before_tier_floor() {
        // Brake refusal wins even when the tier would also deny.
        let action = AgentAction {
            name: "auto_apply",
            min_tier: Tier::L3,
        };
        let provider = StaticAutonomyProvider::new(Tier::L0, true);
        let decision = route_action(&provider, Uuid::new_v4(), &action)
            .await
            .unwrap();
        assert_eq!(decision, GateDecision::Refused(GateRefusal::BrakeEngaged));
    }

    #[tokio::test]
    async fn test_checkpoint_observes_mid_run_engagement() {
        let provider = StaticAutonomyProvider::new(Tier::L3, false);
        let user = Uuid::new_v4();
        assert_eq!(checkpoint(&provider, user).await.unwrap(), None);
        provider.engage_brake();
        assert_eq!(
            checkpoint(&provider, user).await.unwrap(),
            Some(GateRefusal::BrakeEngaged)
        );
    }
}
