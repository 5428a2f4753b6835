use bevy::math::Vec2;

use crate::geometry::segments_intersect;
use crate::track::TrackGeometry;

use super::Car;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LapChange {
    None,
    Completed,
    /// Forward crossing that paid back an earlier backward crossing.
    CheatCleared,
    /// Backward crossing of the goal line.
    Cheated,
}

/// Where a car is on the loop. `segment` is the index of the next cross line ahead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    pub segment: usize,
    pub previous_segment: usize,
    pub dist_to_seg: f32,
    /// Largest `dist_to_seg` seen since entering the current segment.
    pub longest_dist: f32,
    pub laps: u32,
    pub cheated: bool,
}

impl Progress {
    /// Behind the goal line with the launch crossing already paid for.
    pub fn place_on_grid(&mut self, geometry: &TrackGeometry, position: Vec2) {
        let last = geometry.last_line();
        let dist = geometry.line(last).distance_to(position);
        *self = Self {
            segment: last,
            previous_segment: last,
            dist_to_seg: dist,
            longest_dist: dist,
            laps: 0,
            cheated: true,
        };
    }

    /// Lap count with a pending backward crossing taken off.
    pub fn effective_laps(&self) -> i32 {
        self.laps as i32 - i32::from(self.cheated)
    }

    /// Classify the motion `old -> pos` against the cross lines around the
    /// current segment. Lines are walked forwards while they are crossed in
    /// the driving direction, otherwise backwards while they are crossed in
    /// reverse. With no crossing the segment is kept.
    pub fn update_segment(&mut self, geometry: &TrackGeometry, old: Vec2, pos: Vec2) {
        self.previous_segment = self.segment;
        let motion = pos - old;
        let count = geometry.line_count();

        let crossed = |index: usize, forward: bool| {
            let line = geometry.line(index);
            let along = motion.dot(line.forward_normal());
            let right_way = if forward { along > 0.0 } else { along < 0.0 };
            right_way && segments_intersect(old, pos, line.left, line.right)
        };

        let mut segment = self.segment;
        let mut steps = 0;
        while steps < count && crossed(segment, true) {
            segment = geometry.next_line(segment);
            steps += 1;
        }
        if steps == 0 {
            let mut candidate = geometry.prev_line(segment);
            while steps < count && crossed(candidate, false) {
                segment = candidate;
                candidate = geometry.prev_line(candidate);
                steps += 1;
            }
        }

        self.segment = segment;
        self.dist_to_seg = geometry.line(segment).distance_to(pos);
        if self.segment != self.previous_segment {
            self.longest_dist = self.dist_to_seg;
        } else {
            self.longest_dist = self.longest_dist.max(self.dist_to_seg);
        }
    }

    /// Count a lap when the segment index wrapped forwards past the goal line.
    pub fn update_laps(&mut self, line_count: usize) -> LapChange {
        let last = line_count - 1;
        let (old, cur) = (self.previous_segment, self.segment);

        let forward_wrap = (old == last && cur == 0) || (cur < old && 2 * (old - cur) > line_count);
        let backward_wrap =
            (old == 0 && cur == last) || (cur > old && 2 * (cur - old) > line_count);

        if forward_wrap {
            if self.cheated {
                self.cheated = false;
                LapChange::CheatCleared
            } else {
                self.laps += 1;
                LapChange::Completed
            }
        } else if backward_wrap {
            self.cheated = true;
            LapChange::Cheated
        } else {
            LapChange::None
        }
    }
}

impl Car {
    pub fn update_segment(&mut self) {
        let (old, pos) = (self.old_position, self.position);
        self.progress.update_segment(&self.geometry, old, pos);
    }

    pub fn update_laps(&mut self) -> LapChange {
        self.progress.update_laps(self.geometry.line_count())
    }

    /// True when the car faces against the driving direction of its segment.
    pub fn going_wrong_way(&self) -> bool {
        let normal = self.geometry.line(self.progress.segment).forward_normal();
        normal.dot(self.forward()) < 0.0
    }

    pub fn effective_laps(&self) -> i32 {
        self.progress.effective_laps()
    }
}
