use serde::{Deserialize, Serialize};

/// Simulation ticks per second. Every frame count in a snapshot is in these units.
pub const FRAME_RATE: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RacePhase {
    #[default]
    Countdown,
    Running,
    Finished,
}

/// Identifier of an item kind, used by the front end to pick an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemIcon {
    Booster,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarSnapshot {
    pub player: usize,
    pub name: String,
    pub human: bool,
    /// World position in track units.
    pub position: [f32; 2],
    /// Heading angle in radians.
    pub heading: f32,
    /// Signed speed; negative is forward.
    pub speed: f32,
    pub wheel: i32,
    pub rank: u32,
    pub laps: i32,
    pub segment: usize,
    pub wrong_way: bool,
    pub boosting: bool,
    pub item: Option<ItemIcon>,
    pub finished: bool,
    /// Position on the minimap canvas (y grows downwards).
    pub minimap: [f32; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub rank: u32,
    pub name: String,
    pub human: bool,
    /// Race time in frames, `None` for cars that never finished.
    pub time: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub track: String,
    pub phase: RacePhase,
    /// Frames since the start signal, zero while counting down.
    pub time: u32,
    /// Positive while counting down, negative (elapsed) once running.
    pub time_before_start: i32,
    pub laps: u32,
    pub cars: Vec<CarSnapshot>,
    /// Result rows revealed so far, best rank first.
    pub results: Vec<ResultRow>,
    pub actions_available: bool,
}

impl RaceSnapshot {
    pub fn car_for_player(&self, player: usize) -> Option<&CarSnapshot> {
        self.cars.iter().find(|car| car.player == player)
    }
}

/// Format a frame count as `m'ss''cc`.
pub fn format_race_time(frames: u32) -> String {
    let minutes = frames / (FRAME_RATE * 60);
    let seconds = (frames / FRAME_RATE) % 60;
    let hundredths = (frames % FRAME_RATE) * 100 / FRAME_RATE;
    format!("{minutes}'{seconds:02}''{hundredths:02}")
}

pub fn format_rank(rank: u32) -> String {
    let suffix = match (rank % 10, rank % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{rank}{suffix}")
}

/// Banner shown when a lap is completed.
pub fn format_laps_left(laps_left: u32) -> String {
    match laps_left {
        0 => "FINISH".to_string(),
        1 => "FINAL LAP".to_string(),
        n => format!("{n} LAPS LEFT"),
    }
}

/// Countdown overlay for a `time_before_start` value, if anything should be shown.
pub fn countdown_label(time_before_start: i32) -> Option<&'static str> {
    let second = FRAME_RATE as i32;
    match time_before_start {
        t if t < -second => None,
        t if t < 0 => Some("GO!"),
        t if t < second => Some("1"),
        t if t < 2 * second => Some("2"),
        t if t < 3 * second => Some("3"),
        _ => None,
    }
}
