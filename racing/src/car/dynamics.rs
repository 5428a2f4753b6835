use std::sync::Arc;

use bevy::math::Vec2;

use crate::geometry::{heading, reflect, segment_intersection};
use crate::player::Controls;

use super::Car;

impl Car {
    /// Advance the car by one frame with the given held controls.
    pub fn advance(&mut self, controls: Controls) {
        let p = self.params;
        let Controls {
            accelerate,
            brake,
            steer_left: left,
            steer_right: right,
        } = controls;

        if accelerate {
            self.frames_accelerated += 1;
            self.speed = (self.speed - p.acceleration).max(p.max_speed);
        } else {
            self.frames_accelerated = 0;
        }
        if brake {
            self.speed = (self.speed + p.reverse_acceleration).min(p.max_reverse_speed);
        }

        // Reversing swaps which key turns the wheel which way.
        let full_lock = p.frames_for_turning.max(1);
        if (left && self.speed < 0.0) || (right && self.speed > 0.0) {
            self.wheel = (self.wheel + 1).min(full_lock);
        }
        if (right && self.speed < 0.0) || (left && self.speed > 0.0) {
            self.wheel = (self.wheel - 1).max(-full_lock);
        }
        if self.wheel.abs() == full_lock {
            self.frames_at_max_turn += 1;
        } else {
            self.frames_at_max_turn = 0;
        }
        if !left && !right {
            self.wheel -= self.wheel.signum();
        }

        if !accelerate && !brake {
            self.speed *= p.friction;
        }
        if self.speed > 0.0 && accelerate {
            self.speed *= p.reverse_brake_friction;
        } else if self.speed < 0.0 && brake {
            self.speed *= p.brake_friction;
        }

        // No steering at a standstill.
        let max_turn = (self.velocity.length_squared() / p.full_turn_velocity_sq * p.turn_speed)
            .min(p.turn_speed);
        let angle_change = self.wheel as f32 / full_lock as f32 * max_turn;

        let dir = heading(self.angle);
        let half_wheelbase = dir * (p.wheel_distance / 2.0);
        let front = self.position + half_wheelbase + heading(self.angle + angle_change) * self.speed;
        let back = self.position - half_wheelbase + dir * self.speed;
        self.angle -= angle_change;

        self.velocity *= p.velocity_decay;
        if self.velocity.length_squared() > p.max_velocity_sq {
            self.velocity = self.velocity.normalize_or_zero() * p.max_velocity_sq.sqrt();
        }
        if !self.locked {
            self.velocity += (front + back) * 0.5 - self.position;
        }

        self.old_position = self.position;
        self.position += self.velocity;

        self.collide_with_walls();
    }

    /// Bounce off the first wall edge crossed by this frame's motion, once per wall.
    fn collide_with_walls(&mut self) {
        let p = self.params;
        let geometry = Arc::clone(&self.geometry);

        for (side, wall) in geometry.walls() {
            for edge in wall.windows(2) {
                let Some(hit) =
                    segment_intersection(edge[0], edge[1], self.old_position, self.position)
                else {
                    continue;
                };
                let normal = side.inward_normal(edge[1] - edge[0]);

                self.position = hit + normal * p.wall_push_out;
                let impact = normal.dot(self.heading()).abs();
                self.speed *= (1.0 - impact) * p.wall_speed_keep;
                self.velocity = reflect(self.velocity, normal);
                break;
            }
        }
    }

    /// Add an impulse, losing speed unless it pushes along the current motion.
    pub fn push(&mut self, impulse: Vec2) {
        let alignment = self
            .velocity
            .normalize_or_zero()
            .dot(impulse.normalize_or_zero())
            + 1.0;
        self.speed *= alignment / 2.0 * self.params.push_speed_keep;
        self.velocity += impulse;
    }
}

/// Push two touching cars apart, sharing their combined velocity.
pub fn collide_pair(a: &mut Car, b: &mut Car) {
    let offset = b.position - a.position;
    let radius = a.params.radius;
    if offset.length_squared() > radius * radius {
        return;
    }

    let dir = offset.try_normalize().unwrap_or(Vec2::X);
    let half_total = (a.velocity.length() + b.velocity.length()) / 2.0;
    b.push(dir * half_total);
    a.push(-dir * half_total);
}

pub fn resolve_car_collisions(cars: &mut [Car]) {
    for i in 0..cars.len() {
        let (head, tail) = cars.split_at_mut(i + 1);
        let a = &mut head[i];
        for b in tail {
            collide_pair(a, b);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;
    use crate::car::CarParams;
    use crate::track::PIXELS_PER_UNIT;
    use crate::track::tests::{CORRIDOR, OVAL, geometry};

    fn corridor_car(position: Vec2) -> Car {
        let mut car = Car::new(Arc::new(geometry(CORRIDOR)), CarParams::default());
        car.position = position;
        car.old_position = position;
        car
    }

    fn throttle() -> Controls {
        Controls {
            accelerate: true,
            ..Controls::default()
        }
    }

    #[test]
    fn throttle_builds_speed_up_to_max() {
        let mut car = corridor_car(Vec2::new(-14.0, -10.0));
        car.advance(throttle());
        assert!((car.speed + 0.00015).abs() < 1e-7);
        for _ in 0..600 {
            car.advance(throttle());
            car.position = Vec2::new(-14.0, -10.0);
        }
        assert!((car.speed - car.params().max_speed).abs() < 1e-6);
        assert_eq!(car.frames_accelerated, 601);
    }

    #[test]
    fn friction_and_brakes_slow_the_car() {
        let mut car = corridor_car(Vec2::new(-14.0, -10.0));
        car.speed = -0.02;
        car.advance(Controls::default());
        assert!((car.speed + 0.02 * 0.992).abs() < 1e-7);

        car.speed = -0.02;
        car.advance(Controls {
            brake: true,
            ..Controls::default()
        });
        assert!((car.speed - (-0.02 + 0.0001) * 0.986).abs() < 1e-7);
    }

    #[test]
    fn wheel_ramps_and_relaxes() {
        let mut car = corridor_car(Vec2::new(-14.0, -40.0));
        car.speed = -0.03;
        let left = Controls {
            accelerate: true,
            steer_left: true,
            ..Controls::default()
        };
        for frame in 1..=12 {
            car.advance(left);
            assert_eq!(car.wheel, frame.min(10));
        }
        assert_eq!(car.frames_at_max_turn, 3);

        // Full lock is counted before the wheel relaxes.
        car.advance(throttle());
        assert_eq!(car.wheel, 9);
        assert_eq!(car.frames_at_max_turn, 4);
        car.advance(throttle());
        assert_eq!(car.wheel, 8);
        assert_eq!(car.frames_at_max_turn, 0);
    }

    #[test]
    fn reversing_flips_steering_keys() {
        let mut car = corridor_car(Vec2::new(-14.0, -40.0));
        car.speed = 0.005;
        car.advance(Controls {
            steer_left: true,
            ..Controls::default()
        });
        assert_eq!(car.wheel, -1);
    }

    #[test]
    fn steering_left_turns_clockwise_in_world_space() {
        let mut car = corridor_car(Vec2::new(-14.0, -40.0));
        let start = car.angle;
        car.speed = -0.04;
        car.velocity = car.heading() * 0.04;
        for _ in 0..10 {
            car.advance(Controls {
                accelerate: true,
                steer_left: true,
                ..Controls::default()
            });
        }
        assert!(car.angle < start);
    }

    #[test]
    fn standstill_does_not_rotate() {
        let mut car = corridor_car(Vec2::new(-14.0, -40.0));
        let start = car.angle;
        car.wheel = 10;
        car.advance(Controls {
            steer_left: true,
            ..Controls::default()
        });
        assert_eq!(car.angle, start);
    }

    #[test]
    fn velocity_is_clamped() {
        let mut car = corridor_car(Vec2::new(-14.0, -40.0));
        car.velocity = Vec2::new(0.0, -2.0);
        car.locked = true;
        car.advance(Controls::default());
        assert!((car.velocity.length_squared() - 0.35).abs() < 1e-5);
    }

    #[test]
    fn wall_hit_reflects_and_loses_speed() {
        let mut car = corridor_car(Vec2::new(-1.0, -40.0));
        car.angle = 0.0;
        car.speed = -0.03;
        car.old_position = Vec2::new(-1.0, -40.0);
        car.position = Vec2::new(0.5, -40.0);
        car.velocity = Vec2::new(1.5, 0.0);
        car.collide_with_walls();

        assert!(car.position.x < 0.0);
        assert!((car.position.x + 0.05).abs() < 1e-5);
        assert!(car.velocity.x < 0.0);
        assert!((car.velocity.length() - 1.5).abs() < 1e-5);
        // Head-on impact kills the speed.
        assert!(car.speed.abs() < 1e-6);
    }

    #[test]
    fn glancing_wall_hit_keeps_some_speed() {
        let mut car = corridor_car(Vec2::new(-1.0, -40.0));
        car.angle = -FRAC_PI_2 + 0.3;
        car.speed = -0.03;
        car.old_position = Vec2::new(-0.2, -40.0);
        car.position = Vec2::new(0.2, -41.0);
        car.velocity = Vec2::new(0.4, -1.0);
        let before = car.speed.abs();
        car.collide_with_walls();
        assert!(car.speed.abs() < before);
        assert!(car.speed.abs() > 0.0);
        assert!(car.position.x < 0.0);
    }

    #[test]
    fn car_stays_inside_the_corridor() {
        let width = 100.0 / PIXELS_PER_UNIT;
        let mut car = corridor_car(Vec2::new(-width / 2.0, -10.0));
        car.angle = 0.2;
        for _ in 0..400 {
            car.advance(throttle());
            assert!(car.position.x <= 0.0 && car.position.x >= -width);
        }
    }

    #[test]
    fn closing_cars_cancel_each_other() {
        let geometry = Arc::new(geometry(OVAL));
        let mut a = Car::new(geometry.clone(), CarParams::default());
        let mut b = Car::new(geometry, CarParams::default());
        a.position = Vec2::new(0.0, 0.0);
        b.position = Vec2::new(1.3, 0.0);
        a.velocity = Vec2::new(0.1, 0.0);
        b.velocity = Vec2::new(-0.1, 0.0);
        a.speed = -0.03;
        b.speed = -0.03;

        collide_pair(&mut a, &mut b);
        assert!(a.velocity.length() < 1e-6);
        assert!(b.velocity.length() < 1e-6);
        assert!(a.speed.abs() < 1e-6);
    }

    #[test]
    fn resting_cars_are_pushed_apart_equally() {
        let geometry = Arc::new(geometry(OVAL));
        let mut cars = vec![
            Car::new(geometry.clone(), CarParams::default()),
            Car::new(geometry, CarParams::default()),
        ];
        cars[0].position = Vec2::new(0.0, 0.0);
        cars[1].position = Vec2::new(1.0, 0.0);
        cars[0].velocity = Vec2::new(0.0, 0.2);
        cars[1].velocity = Vec2::new(0.0, 0.2);

        resolve_car_collisions(&mut cars);
        assert!((cars[0].velocity.x + 0.2).abs() < 1e-6);
        assert!((cars[1].velocity.x - 0.2).abs() < 1e-6);
    }

    #[test]
    fn distant_cars_do_not_interact() {
        let geometry = Arc::new(geometry(OVAL));
        let mut a = Car::new(geometry.clone(), CarParams::default());
        let mut b = Car::new(geometry, CarParams::default());
        b.position = Vec2::new(1.31, 0.0);
        a.velocity = Vec2::new(0.1, 0.0);
        collide_pair(&mut a, &mut b);
        assert_eq!(a.velocity, Vec2::new(0.1, 0.0));
        assert_eq!(b.velocity, Vec2::ZERO);
    }
}
