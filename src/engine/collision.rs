// Proximity pushback between the boat and obstacle sites.
//
// Not a solver: each overlapping obstacle nudges the agent by a fixed amount
// along one axis, and nudges from several obstacles stack within a call.

use glam::Vec2;

use super::config::CollisionConfig;
use super::obstacles::{ObstacleKind, ObstacleRecord, ObstacleRegistry};

impl CollisionConfig {
    pub fn threshold(&self, kind: ObstacleKind) -> f32 {
        if kind.is_housing() {
            self.housing_threshold
        } else {
            self.rock_threshold
        }
    }

    /// Widest threshold, used as the registry query radius.
    pub fn reach(&self) -> f32 {
        self.rock_threshold.max(self.housing_threshold)
    }
}

/// Push `agent` out of every obstacle whose threshold it has entered.
///
/// Never fails; returns the input unchanged when nothing is in range.
pub fn resolve(agent: Vec2, registry: &ObstacleRegistry, config: &CollisionConfig) -> Vec2 {
    let nearby: Vec<&ObstacleRecord> = registry.query(agent, config.reach()).collect();
    let mut position = agent;
    for record in nearby {
        let threshold = config.threshold(record.kind);
        let away = position - record.position;
        if away.length_squared() < threshold * threshold {
            position += push_direction(away) * config.pushback;
        }
    }
    position
}

/// Unit vector along whichever axis dominates `away`.
/// Ties and exact overlap push along +X.
fn push_direction(away: Vec2) -> Vec2 {
    if away.x.abs() >= away.y.abs() {
        if away.x < 0.0 { Vec2::NEG_X } else { Vec2::X }
    } else if away.y < 0.0 {
        Vec2::NEG_Y
    } else {
        Vec2::Y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::obstacles::tests::{registry_with, rock_at};

    fn config(rock: f32, housing: f32, pushback: f32) -> CollisionConfig {
        CollisionConfig {
            rock_threshold: rock,
            housing_threshold: housing,
            pushback,
        }
    }

    #[test]
    fn agent_is_pushed_out_along_dominant_axis() {
        let registry = registry_with(vec![rock_at(Vec2::ZERO)]);
        let resolved = resolve(Vec2::new(4.0, 0.0), &registry, &config(5.0, 5.0, 1.0));
        assert!(resolved.x >= 5.0, "{resolved}");
        assert_eq!(resolved.y, 0.0);
    }

    #[test]
    fn vertical_separation_pushes_along_y() {
        let registry = registry_with(vec![rock_at(Vec2::new(5.0, 5.0))]);
        let resolved = resolve(Vec2::new(5.5, 3.5), &registry, &config(2.0, 2.0, 0.25));
        assert_eq!(resolved, Vec2::new(5.5, 3.25));
    }

    #[test]
    fn housing_uses_its_own_threshold() {
        let hut = ObstacleRecord { kind: ObstacleKind::Hut, ..rock_at(Vec2::ZERO) };
        let registry = registry_with(vec![hut]);
        let cfg = config(1.0, 3.0, 0.5);

        let resolved = resolve(Vec2::new(-2.0, 0.5), &registry, &cfg);
        assert_eq!(resolved, Vec2::new(-2.5, 0.5));

        let rock_registry = registry_with(vec![rock_at(Vec2::ZERO)]);
        assert_eq!(resolve(Vec2::new(-2.0, 0.5), &rock_registry, &cfg), Vec2::new(-2.0, 0.5));
    }

    #[test]
    fn distant_agent_is_untouched() {
        let registry = registry_with(vec![rock_at(Vec2::new(3.0, 3.0))]);
        let agent = Vec2::new(8.0, 8.0);
        assert_eq!(resolve(agent, &registry, &CollisionConfig::default()), agent);
    }

    #[test]
    fn pushes_from_several_obstacles_stack() {
        let registry = registry_with(vec![rock_at(Vec2::new(4.0, 5.0)), rock_at(Vec2::new(5.0, 4.0))]);
        let resolved = resolve(Vec2::new(5.0, 5.0), &registry, &config(2.0, 2.0, 0.5));
        assert_eq!(resolved, Vec2::new(5.5, 5.5));
    }

    #[test]
    fn exact_overlap_pushes_positive_x() {
        let registry = registry_with(vec![rock_at(Vec2::new(2.0, 2.0))]);
        let resolved = resolve(Vec2::new(2.0, 2.0), &registry, &config(1.0, 1.0, 0.25));
        assert_eq!(resolved, Vec2::new(2.25, 2.0));
    }
}
