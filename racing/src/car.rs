use std::sync::Arc;

use bevy::math::Vec2;
use serde::Deserialize;

use crate::geometry::heading;
use crate::items::Item;
use crate::track::TrackGeometry;

pub mod dynamics;
pub mod progress;

pub use dynamics::{collide_pair, resolve_car_collisions};
pub use progress::{LapChange, Progress};

/// Handling constants of the single car archetype. Speeds are signed: negative is forward.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CarParams {
    pub max_speed: f32,
    pub max_reverse_speed: f32,
    pub acceleration: f32,
    pub reverse_acceleration: f32,
    pub friction: f32,
    pub brake_friction: f32,
    pub reverse_brake_friction: f32,
    /// Turn rate in radians per frame at full wheel lock.
    pub turn_speed: f32,
    /// Squared velocity at which the full turn rate becomes available.
    pub full_turn_velocity_sq: f32,
    pub frames_for_turning: i32,
    pub wheel_distance: f32,
    pub velocity_decay: f32,
    pub max_velocity_sq: f32,
    /// Centre distance at which two cars touch.
    pub radius: f32,
    pub wall_push_out: f32,
    pub wall_speed_keep: f32,
    pub push_speed_keep: f32,
    /// Frames of held throttle that give the full launch boost.
    pub boost_window: u32,
}

impl Default for CarParams {
    fn default() -> Self {
        Self {
            max_speed: -0.04,
            max_reverse_speed: 0.01,
            acceleration: 0.00015,
            reverse_acceleration: 0.0001,
            friction: 0.992,
            brake_friction: 0.986,
            reverse_brake_friction: 0.8,
            turn_speed: 0.03,
            full_turn_velocity_sq: 0.01,
            frames_for_turning: 10,
            wheel_distance: 0.2,
            velocity_decay: 0.95,
            max_velocity_sq: 0.35,
            radius: 1.3,
            wall_push_out: 0.05,
            wall_speed_keep: 0.85,
            push_speed_keep: 0.8,
            boost_window: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Car {
    pub position: Vec2,
    pub old_position: Vec2,
    pub velocity: Vec2,
    pub speed: f32,
    pub angle: f32,
    /// Discrete steering state in `-frames_for_turning..=frames_for_turning`.
    pub wheel: i32,
    pub frames_at_max_turn: u32,
    pub frames_accelerated: u32,
    pub locked: bool,
    pub progress: Progress,
    pub item: Option<Item>,
    pub boosting: bool,
    pub rank: u32,
    params: CarParams,
    geometry: Arc<TrackGeometry>,
}

impl Car {
    pub fn new(geometry: Arc<TrackGeometry>, params: CarParams) -> Self {
        Self {
            position: Vec2::ZERO,
            old_position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            speed: 0.0,
            angle: geometry.start_angle(),
            wheel: 0,
            frames_at_max_turn: 0,
            frames_accelerated: 0,
            locked: false,
            progress: Progress::default(),
            item: None,
            boosting: false,
            rank: 1,
            params,
            geometry,
        }
    }

    /// Put the car on the grid at `position`, facing the first node, goal line ahead.
    pub fn reset(&mut self, position: Vec2) {
        self.position = position;
        self.old_position = position;
        self.velocity = Vec2::ZERO;
        self.speed = 0.0;
        self.angle = self.geometry.start_angle();
        self.wheel = 0;
        self.frames_at_max_turn = 0;
        self.frames_accelerated = 0;
        self.item = None;
        self.boosting = false;
        self.progress.place_on_grid(&self.geometry, position);
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Launch ratio earned by holding the throttle during the countdown.
    /// Peaks at one boost window and falls off again when held longer.
    pub fn boost_ratio(&self) -> f32 {
        let mut ratio = self.frames_accelerated as f32 / self.params.boost_window.max(1) as f32;
        if ratio > 1.0 {
            ratio = 2.0 - ratio;
        }
        ratio.max(0.0)
    }

    /// Release a locked car. `ratio` overrides the earned launch boost.
    pub fn unleash(&mut self, ratio: Option<f32>) {
        self.locked = false;
        let ratio = ratio.unwrap_or_else(|| self.boost_ratio());
        self.speed = self.params.max_speed * ratio;
    }

    pub fn set_max_speed(&mut self) {
        self.speed = self.params.max_speed;
    }

    /// Forward speed as a fraction of the top speed.
    pub fn speed_ratio(&self) -> f32 {
        self.speed / self.params.max_speed
    }

    pub fn heading(&self) -> Vec2 {
        heading(self.angle)
    }

    /// Direction the car drives in at negative (forward) speed.
    pub fn forward(&self) -> Vec2 {
        -self.heading()
    }

    /// Hand the car an item; a car already holding one keeps it.
    pub fn give_item(&mut self, item: Item) -> bool {
        if self.item.is_some() {
            return false;
        }
        self.item = Some(item);
        true
    }

    pub fn take_item(&mut self) -> Option<Item> {
        self.item.take()
    }

    pub fn params(&self) -> &CarParams {
        &self.params
    }

    pub fn geometry(&self) -> &Arc<TrackGeometry> {
        &self.geometry
    }
}
