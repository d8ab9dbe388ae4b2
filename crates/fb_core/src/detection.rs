//! Found-ball predicate.

use crate::config::FoundBallThresholds;
use crate::links::{AgentId, AgentPool, AgentTelemetry};

/// True when the telemetry shows a settled, close-range sighting of the ball.
pub fn has_found_ball(telemetry: &AgentTelemetry, thresholds: &FoundBallThresholds) -> bool {
    telemetry.ball_seen_streak >= thresholds.min_seen_streak
        && telemetry.ball_visible
        && telemetry.distance_to_ball <= thresholds.max_distance_mm
}

/// Every connected agent currently satisfying the predicate, in roster order.
/// Agents without telemetry never qualify.
pub fn collect_finders<A: AgentPool + ?Sized>(
    agents: &A,
    thresholds: &FoundBallThresholds,
) -> Vec<(AgentId, AgentTelemetry)> {
    agents
        .connected_agents()
        .into_iter()
        .filter_map(|id| agents.latest_telemetry(id).map(|t| (id, t)))
        .filter(|(_, t)| has_found_ball(t, thresholds))
        .collect()
}
