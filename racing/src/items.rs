use bevy::math::Vec2;
use race_protocol::ItemIcon;
use serde::Deserialize;
use tracing::debug;

use crate::car::Car;
use crate::track::TrackGeometry;

pub const BOX_SIZE: f32 = 1.2;
pub const BOX_MARGIN: f32 = 1.0;
const BOX_PICKUP_RADIUS_SQ: f32 = BOX_SIZE * BOX_SIZE * 0.2;
/// A box becomes pickable this many frames after its respawn timer ran out.
const PICKABLE_AFTER: i32 = 40;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ItemParams {
    /// Where item box groups sit, as fractions of the loop from the goal line.
    pub box_groups: Vec<f32>,
    pub boxes_per_group: usize,
    pub respawn_frames: i32,
    pub booster_frames: u32,
}

impl Default for ItemParams {
    fn default() -> Self {
        Self {
            box_groups: vec![0.5],
            boxes_per_group: 6,
            respawn_frames: 120,
            booster_frames: 180,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Booster,
}

impl ItemKind {
    pub fn icon(self) -> ItemIcon {
        match self {
            ItemKind::Booster => ItemIcon::Booster,
        }
    }
}

/// Holds a car at top speed for a while.
#[derive(Debug, Clone, PartialEq)]
pub struct Booster {
    elapsed: u32,
    duration: u32,
}

impl Booster {
    pub fn new(duration: u32) -> Self {
        Self {
            elapsed: 0,
            duration,
        }
    }
}

impl Default for Booster {
    fn default() -> Self {
        Self::new(ItemParams::default().booster_frames)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Booster(Booster),
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Booster(_) => ItemKind::Booster,
        }
    }

    pub fn activate(&mut self, car: &mut Car) {
        match self {
            Item::Booster(_) => car.boosting = true,
        }
    }

    /// Apply one frame of the effect. Returns true once the item has run out.
    pub fn update(&mut self, car: &mut Car) -> bool {
        match self {
            Item::Booster(booster) => {
                booster.elapsed += 1;
                car.set_max_speed();
                booster.elapsed > booster.duration
            }
        }
    }

    pub fn expire(&mut self, car: &mut Car) {
        match self {
            Item::Booster(_) => car.boosting = false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemBox {
    pub position: Vec2,
    respawn: i32,
    scale: f32,
}

impl ItemBox {
    fn new(position: Vec2) -> Self {
        Self {
            position,
            respawn: 0,
            scale: 1.0,
        }
    }

    fn update(&mut self) {
        self.respawn = (self.respawn - 1).max(-PICKABLE_AFTER - 1);
        if self.respawn < 0 && self.scale < 1.0 {
            self.scale = (self.scale + 0.01).min(1.0);
        } else if self.respawn > 0 {
            self.scale = (self.scale - 0.05).max(0.0);
        }
    }

    pub fn pickable(&self) -> bool {
        self.respawn < -PICKABLE_AFTER
    }

    /// Render scale; zero while the box is gone.
    pub fn scale(&self) -> f32 {
        self.scale
    }
}

/// A row of item boxes laid along a line across the track.
#[derive(Debug, Clone)]
pub struct ItemBoxGroup {
    center: Vec2,
    radius: f32,
    boxes: Vec<ItemBox>,
}

impl ItemBoxGroup {
    /// `count` boxes centred on the segment `from -> to`.
    pub fn new(count: usize, from: Vec2, to: Vec2) -> Self {
        let delta = to - from;
        let length = delta.length();
        let group_length = count as f32 * BOX_SIZE + count.saturating_sub(1) as f32 * BOX_MARGIN;

        let mut line_pos = (length - group_length) / 2.0 + BOX_SIZE / 2.0;
        let mut boxes = Vec::with_capacity(count);
        for _ in 0..count {
            let t = if length > 0.0 { line_pos / length } else { 0.5 };
            boxes.push(ItemBox::new(from + delta * t));
            line_pos += BOX_SIZE + BOX_MARGIN;
        }

        Self {
            center: from + delta * 0.5,
            radius: group_length / 2.0 + BOX_SIZE,
            boxes,
        }
    }

    /// A group across the cross line at `fraction` of the loop, with as many
    /// of `count` boxes as fit the track width.
    pub fn across(geometry: &TrackGeometry, fraction: f32, count: usize) -> Self {
        let index = (fraction.rem_euclid(1.0) * geometry.last_line() as f32).round() as usize;
        let line = geometry.line(index);
        let fit = ((line.width() + BOX_MARGIN) / (BOX_SIZE + BOX_MARGIN)).floor() as usize;
        Self::new(count.min(fit), line.left, line.right)
    }

    pub fn boxes(&self) -> &[ItemBox] {
        &self.boxes
    }

    pub fn update(&mut self) {
        for item_box in &mut self.boxes {
            item_box.update();
        }
    }

    pub fn reset(&mut self) {
        for item_box in &mut self.boxes {
            *item_box = ItemBox::new(item_box.position);
        }
    }

    /// Knock out the first pickable box touched by a car at `position`.
    pub fn hit_test(&mut self, position: Vec2, car_radius_sq: f32, respawn: i32) -> bool {
        let reach = car_radius_sq + self.radius * self.radius;
        if position.distance_squared(self.center) > reach {
            return false;
        }
        let reach = car_radius_sq + BOX_PICKUP_RADIUS_SQ;
        for item_box in &mut self.boxes {
            if item_box.pickable() && position.distance_squared(item_box.position) <= reach {
                item_box.respawn = respawn;
                return true;
            }
        }
        false
    }
}

#[derive(Debug, Clone)]
struct ActiveItem {
    car: usize,
    item: Item,
}

/// Item boxes on the track and the effects of items in use.
#[derive(Debug, Clone)]
pub struct ItemManager {
    params: ItemParams,
    groups: Vec<ItemBoxGroup>,
    active: Vec<ActiveItem>,
}

impl ItemManager {
    pub fn new(geometry: &TrackGeometry, params: &ItemParams) -> Self {
        let groups = params
            .box_groups
            .iter()
            .map(|&fraction| ItemBoxGroup::across(geometry, fraction, params.boxes_per_group))
            .collect();
        Self {
            params: params.clone(),
            groups,
            active: Vec::new(),
        }
    }

    pub fn groups(&self) -> &[ItemBoxGroup] {
        &self.groups
    }

    pub fn reset(&mut self) {
        self.active.clear();
        for group in &mut self.groups {
            group.reset();
        }
    }

    /// Test a car against every box group; a touched box hands out a booster.
    pub fn hit_test(&mut self, car: &mut Car) {
        let radius = car.params().radius;
        for group in &mut self.groups {
            if group.hit_test(car.position, radius * radius, self.params.respawn_frames) {
                let granted = car.give_item(Item::Booster(Booster::new(self.params.booster_frames)));
                debug!(granted, "item box hit");
            }
        }
    }

    /// Activate the item held by car `index`, if any.
    pub fn use_item(&mut self, index: usize, car: &mut Car) -> bool {
        let Some(mut item) = car.take_item() else {
            return false;
        };
        item.activate(car);
        self.active.push(ActiveItem { car: index, item });
        true
    }

    pub fn update(&mut self, cars: &mut [Car]) {
        self.active.retain_mut(|active| {
            let Some(car) = cars.get_mut(active.car) else {
                return false;
            };
            if active.item.update(car) {
                active.item.expire(car);
                false
            } else {
                true
            }
        });
        for group in &mut self.groups {
            group.update();
        }
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.active.iter().any(|active| active.car == index)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::car::CarParams;
    use crate::track::tests::{OVAL, geometry};

    fn car_at(geometry: &Arc<TrackGeometry>, position: Vec2) -> Car {
        let mut car = Car::new(geometry.clone(), CarParams::default());
        car.position = position;
        car
    }

    fn ready(group: &mut ItemBoxGroup) {
        for _ in 0..=PICKABLE_AFTER {
            group.update();
        }
    }

    #[test]
    fn boxes_are_centred_on_the_line() {
        let group = ItemBoxGroup::new(3, Vec2::new(0.0, 0.0), Vec2::new(20.0, 0.0));
        let xs: Vec<f32> = group.boxes().iter().map(|b| b.position.x).collect();
        assert_eq!(xs.len(), 3);
        assert!((xs[1] - 10.0).abs() < 1e-5);
        assert!((xs[0] - (10.0 - BOX_SIZE - BOX_MARGIN)).abs() < 1e-5);
        assert!((xs[2] - (10.0 + BOX_SIZE + BOX_MARGIN)).abs() < 1e-5);
    }

    #[test]
    fn box_count_is_limited_by_track_width() {
        let geometry = geometry(OVAL);
        let group = ItemBoxGroup::across(&geometry, 0.5, 100);
        let width = geometry.line(12).width();
        let used = group.boxes().len() as f32 * (BOX_SIZE + BOX_MARGIN) - BOX_MARGIN;
        assert!(used <= width);
        assert!(!group.boxes().is_empty());
    }

    #[test]
    fn boxes_become_pickable_after_respawn() {
        let mut group = ItemBoxGroup::new(1, Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0));
        assert!(!group.boxes()[0].pickable());
        for _ in 0..PICKABLE_AFTER {
            group.update();
        }
        assert!(!group.boxes()[0].pickable());
        group.update();
        assert!(group.boxes()[0].pickable());

        assert!(group.hit_test(Vec2::ZERO, 1.69, 120));
        assert!(!group.boxes()[0].pickable());
        assert!(!group.hit_test(Vec2::ZERO, 1.69, 120));

        for _ in 0..120 + PICKABLE_AFTER {
            group.update();
        }
        assert!(!group.boxes()[0].pickable());
        group.update();
        assert!(group.boxes()[0].pickable());
    }

    #[test]
    fn far_cars_miss_the_group() {
        let mut group = ItemBoxGroup::new(2, Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0));
        ready(&mut group);
        assert!(!group.hit_test(Vec2::new(0.0, 30.0), 1.69, 120));
    }

    #[test]
    fn touching_a_box_grants_one_booster() {
        let geometry = Arc::new(geometry(OVAL));
        let mut items = ItemManager::new(&geometry, &ItemParams::default());
        for group in &mut items.groups {
            ready(group);
        }
        let target = items.groups()[0].boxes()[0].position;
        let mut car = car_at(&geometry, target);

        items.hit_test(&mut car);
        assert_eq!(car.item.as_ref().map(Item::kind), Some(ItemKind::Booster));

        // Already holding an item: the next box is used up but nothing changes.
        let next = items.groups()[0].boxes()[1].position;
        car.position = next;
        items.hit_test(&mut car);
        assert!(!items.groups()[0].boxes()[1].pickable());
        assert!(car.item.is_some());
    }

    #[test]
    fn booster_holds_top_speed_then_expires() {
        let geometry = Arc::new(geometry(OVAL));
        let params = ItemParams {
            booster_frames: 3,
            ..ItemParams::default()
        };
        let mut items = ItemManager::new(&geometry, &params);
        let mut cars = vec![car_at(&geometry, Vec2::ZERO)];
        cars[0].give_item(Item::Booster(Booster::new(3)));

        assert!(items.use_item(0, &mut cars[0]));
        assert!(cars[0].boosting);
        assert!(cars[0].item.is_none());
        assert!(!items.use_item(0, &mut cars[0]));

        for _ in 0..3 {
            cars[0].speed = 0.0;
            items.update(&mut cars);
            assert_eq!(cars[0].speed, cars[0].params().max_speed);
            assert!(items.is_active(0));
        }
        items.update(&mut cars);
        assert!(!items.is_active(0));
        assert!(!cars[0].boosting);
    }
}
