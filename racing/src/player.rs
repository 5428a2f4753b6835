/// Held buttons of one local player for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// Look behind; only affects the view.
    pub mirror: bool,
    pub use_item: bool,
}

impl ControlInput {
    pub fn controls(&self) -> Controls {
        Controls {
            accelerate: self.up,
            brake: self.down,
            steer_left: self.left,
            steer_right: self.right,
        }
    }
}

/// What the vehicle model consumes each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub accelerate: bool,
    pub brake: bool,
    pub steer_left: bool,
    pub steer_right: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKind {
    /// Local player reading the input set `slot`.
    Human { slot: usize },
    Cpu,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControlMode {
    #[default]
    Human,
    Ai,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: usize,
    pub kind: PlayerKind,
    mode: ControlMode,
    finish_rank: Option<u32>,
}

impl Player {
    pub fn human(id: usize, slot: usize) -> Self {
        Self {
            id,
            kind: PlayerKind::Human { slot },
            mode: ControlMode::Human,
            finish_rank: None,
        }
    }

    pub fn cpu(id: usize) -> Self {
        Self {
            id,
            kind: PlayerKind::Cpu,
            mode: ControlMode::Ai,
            finish_rank: None,
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(self.kind, PlayerKind::Human { .. })
    }

    pub fn input_slot(&self) -> Option<usize> {
        match self.kind {
            PlayerKind::Human { slot } => Some(slot),
            PlayerKind::Cpu => None,
        }
    }

    pub fn control_mode(&self) -> ControlMode {
        self.mode
    }

    pub fn is_ai_controlled(&self) -> bool {
        self.mode == ControlMode::Ai
    }

    /// Let the AI drive a human player's car.
    pub fn possess(&mut self) {
        self.mode = ControlMode::Ai;
    }

    pub fn remove_possession(&mut self) {
        if self.is_human() {
            self.mode = ControlMode::Human;
        }
    }

    pub fn finish_rank(&self) -> Option<u32> {
        self.finish_rank
    }

    pub fn finished(&self) -> bool {
        self.finish_rank.is_some()
    }

    pub fn finish(&mut self, rank: u32) {
        self.finish_rank = Some(rank);
    }

    /// Back to the state at the start of a race.
    pub fn reset(&mut self) {
        self.finish_rank = None;
        self.remove_possession();
    }

    pub fn name(&self) -> String {
        match self.kind {
            PlayerKind::Human { slot } => format!("Player {}", slot + 1),
            PlayerKind::Cpu => "CPU".to_string(),
        }
    }
}
