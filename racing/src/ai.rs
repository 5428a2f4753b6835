use bevy::math::Vec2;
use rand::Rng;
use serde::Deserialize;

use crate::car::Car;
use crate::items::ItemKind;
use crate::player::Controls;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AiParams {
    /// Upper bound on the distance used to blend towards the next cross line.
    pub lookahead_cap: f32,
    /// Below this speed ratio the blend is pushed back towards the current line.
    pub low_speed_ratio: f32,
    pub low_speed_bias: f32,
    pub blend: f32,
    /// Rotation of the second heading probe, in degrees counter-clockwise.
    pub probe_degrees: f32,
    /// Boosters are fired when slower than this speed ratio.
    pub booster_speed_ratio: f32,
    pub launch_spread: f32,
}

impl Default for AiParams {
    fn default() -> Self {
        Self {
            lookahead_cap: 20.0,
            low_speed_ratio: 0.15,
            low_speed_bias: -0.2,
            blend: 0.85,
            probe_degrees: 5.0,
            booster_speed_ratio: 0.3,
            launch_spread: 1.8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AiDecision {
    pub controls: Controls,
    pub use_item: bool,
}

/// Steers by comparing how well the car lines up with the track for its
/// current heading and for a slightly rotated one.
#[derive(Debug, Clone, Default)]
pub struct AiDriver {
    params: AiParams,
}

impl AiDriver {
    pub fn new(params: AiParams) -> Self {
        Self { params }
    }

    pub fn decide(&self, car: &Car) -> AiDecision {
        let forward = car.forward();
        let probe = Vec2::from_angle(self.params.probe_degrees.to_radians()).rotate(forward);

        let straight = self.alignment(car, forward);
        let rotated = self.alignment(car, probe);

        let controls = Controls {
            accelerate: true,
            brake: false,
            steer_left: straight > rotated,
            steer_right: straight <= rotated,
        };

        let use_item = car.item.as_ref().is_some_and(|item| match item.kind() {
            ItemKind::Booster => car.speed_ratio() < self.params.booster_speed_ratio,
        });

        AiDecision { controls, use_item }
    }

    /// Alignment of `direction` with the current cross line, blended towards
    /// the next one as the car closes in on it.
    fn alignment(&self, car: &Car, direction: Vec2) -> f32 {
        let geometry = car.geometry();
        let segment = car.progress.segment;
        let current = geometry.line(segment).forward_normal().dot(direction);
        let next = geometry
            .line(geometry.next_line(segment))
            .forward_normal()
            .dot(direction);

        let reach = car.progress.longest_dist.min(self.params.lookahead_cap);
        let mut t = if reach > f32::EPSILON {
            1.0 - car.progress.dist_to_seg / reach
        } else {
            0.0
        };
        if t < 0.0 {
            t = 0.0;
        } else if car.speed_ratio() < self.params.low_speed_ratio {
            t = self.params.low_speed_bias;
        }
        t *= self.params.blend;

        current - (current - next) * t
    }

    /// Launch ratio for an AI car; about half of them get the full boost.
    pub fn random_launch_boost(&self, rng: &mut impl Rng) -> f32 {
        (rng.random::<f32>() * self.params.launch_spread).min(1.0)
    }
}
