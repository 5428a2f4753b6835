use std::f32::consts::PI;

use bevy::asset::RenderAssetUsages;
use bevy::math::{Rect, Vec2};
use bevy::mesh::{Indices, Mesh, PrimitiveTopology};
use tracing::debug;

use crate::geometry::{forward_normal, heading, point_segment_distance};
use crate::track_format::{Track, TrackError, TrackNode};

/// Track files are authored in pixels; the simulation runs in world units.
pub const PIXELS_PER_UNIT: f32 = 4096.0 / 1200.0;
pub const WALL_THICKNESS: f32 = 0.8;
pub const MINIMAP_SIZE: f32 = 180.0;

const GRID_COLUMNS: usize = 4;
const GRID_SPACING: f32 = 2.5;
const GRID_FIRST_OFFSET: f32 = 8.0;
const GRID_STEP: f32 = 0.7;

/// Direction of travel along a node. Node rotations are clockwise degrees.
pub fn node_angle(node: &TrackNode) -> f32 {
    (-node.rotation as f32).to_radians() + PI
}

/// A pair of boundary points crossing the track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossLine {
    pub left: Vec2,
    pub right: Vec2,
}

impl CrossLine {
    pub fn midpoint(&self) -> Vec2 {
        (self.left + self.right) * 0.5
    }

    pub fn width(&self) -> f32 {
        self.left.distance(self.right)
    }

    pub fn forward_normal(&self) -> Vec2 {
        forward_normal(self.left, self.right)
    }

    pub fn distance_to(&self, point: Vec2) -> f32 {
        point_segment_distance(point, self.left, self.right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallSide {
    Left,
    Right,
}

impl WallSide {
    /// Normal of a wall edge pointing into the track.
    pub fn inward_normal(self, edge: Vec2) -> Vec2 {
        let dir = edge.normalize_or_zero();
        match self {
            WallSide::Left => dir.perp(),
            WallSide::Right => Vec2::new(dir.y, -dir.x),
        }
    }
}

/// Maps world positions onto the square minimap canvas (y grows downwards).
#[derive(Debug, Clone)]
pub struct Minimap {
    pub scale: f32,
    origin: Vec2,
    offset: Vec2,
    pub left_wall: Vec<Vec2>,
    pub right_wall: Vec<Vec2>,
    pub goal_line: [Vec2; 2],
}

impl Minimap {
    fn new(bounds: Rect, left_wall: &[Vec2], right_wall: &[Vec2], goal: CrossLine) -> Self {
        let size = bounds.size();
        let longest = size.x.max(size.y).max(f32::EPSILON);
        let scale = MINIMAP_SIZE / longest;
        let offset = Vec2::new(
            MINIMAP_SIZE / 2.0 * (1.0 - size.x / longest),
            MINIMAP_SIZE / 2.0 * (1.0 - size.y / longest),
        );
        let mut minimap = Self {
            scale,
            origin: Vec2::new(bounds.min.x, bounds.max.y),
            offset,
            left_wall: Vec::new(),
            right_wall: Vec::new(),
            goal_line: [Vec2::ZERO; 2],
        };
        minimap.left_wall = left_wall.iter().map(|&p| minimap.project(p)).collect();
        minimap.right_wall = right_wall.iter().map(|&p| minimap.project(p)).collect();
        minimap.goal_line = [minimap.project(goal.left), minimap.project(goal.right)];
        minimap
    }

    pub fn project(&self, world: Vec2) -> Vec2 {
        Vec2::new(
            (world.x - self.origin.x) * self.scale + self.offset.x,
            (self.origin.y - world.y) * self.scale + self.offset.y,
        )
    }
}

/// Boundary geometry of a closed track, shared read-only by every car.
#[derive(Debug, Clone)]
pub struct TrackGeometry {
    name: String,
    laps: u32,
    /// Interleaved `(left, right)` cross lines; the last pair is the goal line.
    segments: Vec<Vec2>,
    left_wall: Vec<Vec2>,
    right_wall: Vec<Vec2>,
    surface: Vec<CrossLine>,
    start_angle: f32,
    bounds: Rect,
    minimap: Minimap,
}

impl TrackGeometry {
    pub fn build(track: &Track) -> Result<Self, TrackError> {
        track.validate_nodes()?;
        let Some(first) = track.nodes.first() else {
            return Err(TrackError::InvalidTrack {
                path: track.name.clone().into(),
                reason: "track has no nodes".to_string(),
            });
        };

        let scale = 1.0 / PIXELS_PER_UNIT;
        let segment_length = track.segment_length as f32 * scale;
        let start_direction = node_angle(first);

        let mut segments = Vec::with_capacity((track.total_segments() + 1) * 2);
        let mut left_wall = Vec::new();
        let mut right_wall = Vec::new();
        let mut surface = Vec::new();

        // The right end of the goal line sits at the origin.
        let mut pos = -heading(start_direction).perp() * (first.width as f32 * scale / 2.0);
        let mut previous: Option<(f32, Vec2, Vec2)> = None;

        for (index, node) in track.nodes.iter().enumerate() {
            let next = track.nodes.get(index + 1).unwrap_or(first);
            let angle = node_angle(node);
            let dir = heading(angle);
            let left_dir = Vec2::new(dir.y, -dir.x);
            let right_dir = dir.perp();
            let width = node.width as f32 * scale;
            let next_width = next.width as f32 * scale;

            if let Some((last_angle, prev_left, prev_right)) = previous {
                if last_angle > angle {
                    // Turning left: pivot on the left edge, miter on the right.
                    pos = prev_left + right_dir * (width / 2.0);
                    right_wall.push(prev_right);
                } else if last_angle < angle {
                    pos = prev_right + left_dir * (width / 2.0);
                    left_wall.push(prev_left);
                }
            }

            let start = CrossLine {
                left: pos + left_dir * (width / 2.0),
                right: pos + right_dir * (width / 2.0),
            };
            left_wall.push(start.left);
            right_wall.push(start.right);
            surface.push(start);

            let length = node.length as usize;
            let mut end = (pos, start);
            for step in 1..=length {
                let t = step as f32 / length as f32;
                let half_width = width / 2.0 + (next_width - width) / 2.0 * t;
                let center = pos + dir * (segment_length * step as f32);
                let line = CrossLine {
                    left: center + left_dir * half_width,
                    right: center + right_dir * half_width,
                };
                segments.push(line.left);
                segments.push(line.right);
                surface.push(line);
                end = (center, line);
            }

            pos = end.0;
            previous = Some((angle, end.1.left, end.1.right));
        }

        if let Some((_, last_left, last_right)) = previous {
            left_wall.push(last_left);
            right_wall.push(last_right);
        }
        let (Some(&goal_left), Some(&goal_right)) = (left_wall.first(), right_wall.first()) else {
            return Err(TrackError::InvalidTrack {
                path: track.name.clone().into(),
                reason: "track produced no walls".to_string(),
            });
        };
        left_wall.push(goal_left);
        right_wall.push(goal_right);
        segments.push(goal_left);
        segments.push(goal_right);

        let bounds = left_wall
            .iter()
            .chain(right_wall.iter())
            .fold(Rect::from_center_size(goal_left, Vec2::ZERO), |rect, &p| {
                rect.union_point(p)
            });
        let goal = CrossLine {
            left: goal_left,
            right: goal_right,
        };
        let minimap = Minimap::new(bounds, &left_wall, &right_wall, goal);

        debug!(
            track = %track.name,
            lines = segments.len() / 2,
            left_wall = left_wall.len(),
            right_wall = right_wall.len(),
            width = bounds.width(),
            height = bounds.height(),
            "built track geometry"
        );

        Ok(Self {
            name: track.name.clone(),
            laps: track.laps,
            segments,
            left_wall,
            right_wall,
            surface,
            start_angle: start_direction + PI,
            bounds,
            minimap,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn laps(&self) -> u32 {
        self.laps
    }

    pub fn segments(&self) -> &[Vec2] {
        &self.segments
    }

    /// Number of cross lines, goal line included.
    pub fn line_count(&self) -> usize {
        self.segments.len() / 2
    }

    /// Index of the goal line.
    pub fn last_line(&self) -> usize {
        self.line_count() - 1
    }

    pub fn line(&self, index: usize) -> CrossLine {
        let i = (index % self.line_count()) * 2;
        CrossLine {
            left: self.segments[i],
            right: self.segments[i + 1],
        }
    }

    pub fn next_line(&self, index: usize) -> usize {
        (index + 1) % self.line_count()
    }

    pub fn prev_line(&self, index: usize) -> usize {
        (index + self.line_count() - 1) % self.line_count()
    }

    pub fn goal_line(&self) -> CrossLine {
        self.line(self.last_line())
    }

    pub fn goal_line_width(&self) -> f32 {
        self.goal_line().width()
    }

    pub fn left_wall(&self) -> &[Vec2] {
        &self.left_wall
    }

    pub fn right_wall(&self) -> &[Vec2] {
        &self.right_wall
    }

    pub fn walls(&self) -> [(WallSide, &[Vec2]); 2] {
        [
            (WallSide::Left, self.left_wall.as_slice()),
            (WallSide::Right, self.right_wall.as_slice()),
        ]
    }

    /// Car angle for driving along the first node. A car's angle vector
    /// points backwards, since forward speeds are negative.
    pub fn start_angle(&self) -> f32 {
        self.start_angle
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn minimap(&self) -> &Minimap {
        &self.minimap
    }

    /// Starting position for grid slot `slot`; slot 0 is furthest from the goal line.
    pub fn grid_position(&self, slot: usize) -> Vec2 {
        let goal = self.goal_line();
        let along = (goal.left - goal.right).normalize_or_zero();
        let back = -goal.forward_normal();

        let row = slot / GRID_COLUMNS;
        let column = slot % GRID_COLUMNS;
        let mut lateral = ((GRID_COLUMNS - 1) as f32 / 2.0 - column as f32) * GRID_SPACING;
        if row % 2 == 1 {
            lateral -= GRID_SPACING / 2.0;
        }
        let behind = (GRID_FIRST_OFFSET - GRID_STEP * slot as f32).max(GRID_STEP);

        goal.midpoint() + along * lateral + back * behind
    }

    /// Quads extruded outwards from every wall edge by the wall thickness.
    pub fn wall_boxes(&self) -> Vec<[Vec2; 4]> {
        let mut boxes = Vec::new();
        for (side, wall) in self.walls() {
            for edge in wall.windows(2) {
                let (a, b) = (edge[0], edge[1]);
                if a.distance_squared(b) < 1e-8 {
                    continue;
                }
                let out = -side.inward_normal(b - a) * WALL_THICKNESS;
                boxes.push([a, b, b + out, a + out]);
            }
        }
        boxes
    }
}

fn mesh_from_quads(quads: impl Iterator<Item = [Vec2; 4]>) -> Mesh {
    let mut positions = Vec::new();
    let mut indices = Vec::new();

    for quad in quads {
        let base = positions.len() as u32;
        for corner in quad {
            positions.push([corner.x, corner.y, 0.0]);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

/// Drivable surface between consecutive cross lines, miter joints included.
pub fn create_track_mesh(geometry: &TrackGeometry) -> Mesh {
    let lines = &geometry.surface;
    let quads = (0..lines.len()).map(|i| {
        let a = lines[i];
        let b = lines[(i + 1) % lines.len()];
        [a.left, b.left, b.right, a.right]
    });
    mesh_from_quads(quads)
}

pub fn create_wall_mesh(geometry: &TrackGeometry) -> Mesh {
    mesh_from_quads(geometry.wall_boxes().into_iter())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const OVAL: &str = "3 60
        6 110 -90
        2 110 -45
        2 110 0
        2 110 45
        6 110 90
        2 110 135
        2 110 180
        2 110 225";

    /// One straight node heading towards -y: the corridor `x in [-w, 0]`.
    pub(crate) const CORRIDOR: &str = "1 30 10 100 -90";

    pub(crate) fn geometry(text: &str) -> TrackGeometry {
        let track = Track::parse("test", text).unwrap();
        TrackGeometry::build(&track).unwrap()
    }

    fn close(a: Vec2, b: Vec2) -> bool {
        a.distance(b) < 1e-3
    }

    #[test]
    fn line_count_is_total_segments_plus_goal() {
        let geometry = geometry(OVAL);
        assert_eq!(geometry.segments().len() % 2, 0);
        assert_eq!(geometry.line_count(), 24 + 1);
    }

    #[test]
    fn walls_are_closed_loops() {
        let geometry = geometry(OVAL);
        for (_, wall) in geometry.walls() {
            assert!(wall.len() > 2);
            assert_eq!(wall.first(), wall.last());
        }
    }

    #[test]
    fn symmetric_loop_returns_to_goal_line() {
        let geometry = geometry(OVAL);
        let goal = geometry.goal_line();
        let last_node_end = geometry.line(geometry.last_line() - 1);
        // Every turn pivots on the left edge, so that edge closes exactly.
        assert!(close(last_node_end.left, goal.left));
        assert!(close(goal.right, Vec2::ZERO));
    }

    #[test]
    fn corridor_lines_are_evenly_spaced() {
        let geometry = geometry(CORRIDOR);
        let width = 100.0 / PIXELS_PER_UNIT;
        let length = 300.0 / PIXELS_PER_UNIT;

        assert_eq!(geometry.line_count(), 11);
        for k in 0..10 {
            let line = geometry.line(k);
            let y = -(k as f32 + 1.0) * length / 10.0;
            assert!(close(line.left, Vec2::new(-width, y)), "line {k}: {line:?}");
            assert!(close(line.right, Vec2::new(0.0, y)), "line {k}: {line:?}");
        }
        let goal = geometry.goal_line();
        assert!(close(goal.left, Vec2::new(-width, 0.0)));
        assert!(close(goal.right, Vec2::ZERO));
        assert!((geometry.goal_line_width() - width).abs() < 1e-4);
        assert!(close(geometry.line(3).forward_normal(), Vec2::new(0.0, -1.0)));
    }

    #[test]
    fn width_is_interpolated_towards_next_node() {
        let geometry = geometry("1 60 2 100 -90 2 200 -90");
        let first = geometry.line(0).width() * PIXELS_PER_UNIT;
        let second = geometry.line(1).width() * PIXELS_PER_UNIT;
        assert!((first - 150.0).abs() < 1e-3);
        assert!((second - 200.0).abs() < 1e-3);
    }

    #[test]
    fn degenerate_node_fails_construction() {
        let track = Track::parse("bad", "1 60 4 0 0").unwrap();
        assert!(matches!(
            TrackGeometry::build(&track),
            Err(TrackError::DegenerateNode { index: 0, .. })
        ));
    }

    #[test]
    fn minimap_fits_canvas_and_flips_y() {
        let geometry = geometry(OVAL);
        let minimap = geometry.minimap();
        for p in minimap.left_wall.iter().chain(minimap.right_wall.iter()) {
            assert!(p.x >= -1e-3 && p.x <= MINIMAP_SIZE + 1e-3);
            assert!(p.y >= -1e-3 && p.y <= MINIMAP_SIZE + 1e-3);
        }
        let bounds = geometry.bounds();
        let top = minimap.project(Vec2::new(bounds.min.x, bounds.max.y));
        let bottom = minimap.project(Vec2::new(bounds.min.x, bounds.min.y));
        assert!(top.y < bottom.y);
        // The longer side spans the whole canvas.
        let extent = bounds.size().max_element() * minimap.scale;
        assert!((extent - MINIMAP_SIZE).abs() < 1e-2);
    }

    #[test]
    fn wall_boxes_extend_outside_the_track() {
        let geometry = geometry(CORRIDOR);
        let boxes = geometry.wall_boxes();
        // Two edges per wall: along the corridor and the closing edge back.
        assert_eq!(boxes.len(), 4);
        let width = 100.0 / PIXELS_PER_UNIT;

        let left = (boxes[0][2] + boxes[0][3]) * 0.5;
        assert!((left.x - (-width - WALL_THICKNESS)).abs() < 1e-3);
        let right = (boxes[2][2] + boxes[2][3]) * 0.5;
        assert!((right.x - WALL_THICKNESS).abs() < 1e-3);
    }

    #[test]
    fn grid_slots_sit_behind_the_goal_line() {
        let geometry = geometry(OVAL);
        let goal = geometry.goal_line();
        let normal = goal.forward_normal();
        let slots: Vec<Vec2> = (0..8).map(|slot| geometry.grid_position(slot)).collect();

        for (i, &a) in slots.iter().enumerate() {
            let behind = (a - goal.midpoint()).dot(normal);
            assert!(behind < 0.0, "slot {i} is past the line");
            for &b in &slots[i + 1..] {
                assert!(a.distance(b) > 1.3);
            }
        }
        let first = (slots[0] - goal.midpoint()).dot(normal);
        let last = (slots[7] - goal.midpoint()).dot(normal);
        assert!(first < last);
    }
}
