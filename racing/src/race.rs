use race_protocol::RacePhase;
use serde::Deserialize;
use tracing::info;

use crate::car::{Car, LapChange};
use crate::player::Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RaceParams {
    /// Frames between the race being set up and the start signal.
    pub countdown_frames: u32,
    /// Frames after the last watched finisher before the race is over.
    pub finish_delay: u32,
    /// Frames between revealing two rows of the results table.
    pub reveal_frames: u32,
}

impl Default for RaceParams {
    fn default() -> Self {
        Self {
            countdown_frames: 200,
            finish_delay: 180,
            reveal_frames: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceEvent {
    Started,
    LapCompleted { player: usize, laps_left: u32 },
    PlayerFinished { player: usize, rank: u32, time: u32 },
    Finished,
}

/// Standings and phase machine of one race. Cars and players are indexed alike.
#[derive(Debug, Clone)]
pub struct Race {
    params: RaceParams,
    laps: u32,
    phase: RacePhase,
    time: u32,
    /// Car indices, leader first.
    order: Vec<usize>,
    /// Car indices in the order they crossed the line for the last time.
    finishers: Vec<usize>,
    finish_times: Vec<u32>,
    watched: usize,
    watched_finished: usize,
    last_finish: u32,
}

impl Race {
    pub fn new(laps: u32, params: RaceParams, players: &[Player]) -> Self {
        let mut race = Self {
            params,
            laps,
            phase: RacePhase::Countdown,
            time: 0,
            order: Vec::new(),
            finishers: Vec::new(),
            finish_times: Vec::new(),
            watched: 0,
            watched_finished: 0,
            last_finish: 0,
        };
        race.reset(players);
        race
    }

    /// Back to the countdown with the field ordered as on the grid.
    pub fn reset(&mut self, players: &[Player]) {
        self.phase = RacePhase::Countdown;
        self.time = 0;
        self.order = (0..players.len()).collect();
        self.finishers.clear();
        self.finish_times.clear();
        let humans = players.iter().filter(|p| p.is_human()).count();
        // Without humans every car is watched.
        self.watched = if humans == 0 { players.len() } else { humans };
        self.watched_finished = 0;
        self.last_finish = 0;
    }

    /// Advance one frame: track progress, count laps, reorder and run the
    /// phase machine. `launch_boost` supplies launch ratios for AI drivers.
    pub fn update(
        &mut self,
        cars: &mut [Car],
        players: &mut [Player],
        mut launch_boost: impl FnMut() -> f32,
    ) -> Vec<RaceEvent> {
        let mut events = Vec::new();
        let watch_all = !players.iter().any(Player::is_human);

        for pos in 0..self.order.len() {
            let index = self.order[pos];
            let car = &mut cars[index];
            car.update_segment();
            let change = car.update_laps();

            let player = &mut players[index];
            if !player.finished() && change == LapChange::Completed {
                let laps_done = car.progress.laps;
                if laps_done >= self.laps {
                    self.finish_times.push(self.time);
                    self.finishers.push(index);
                    let rank = self.finishers.len() as u32;
                    player.finish(rank);
                    if player.is_human() || watch_all {
                        self.last_finish = self.time;
                        self.watched_finished += 1;
                    }
                    if player.is_human() {
                        player.possess();
                    }
                    info!(player = index, rank, time = self.time, "player finished");
                    events.push(RaceEvent::PlayerFinished {
                        player: index,
                        rank,
                        time: self.time,
                    });
                } else {
                    let laps_left = self.laps - laps_done;
                    info!(player = index, laps_left, "lap completed");
                    events.push(RaceEvent::LapCompleted {
                        player: index,
                        laps_left,
                    });
                }
            }
            self.improve_rank(pos, cars);
        }

        for (pos, &index) in self.order.iter().enumerate() {
            cars[index].rank = pos as u32 + 1;
        }

        self.time += 1;
        if self.phase == RacePhase::Countdown && self.time > self.params.countdown_frames {
            self.start(cars, players, &mut launch_boost);
            events.push(RaceEvent::Started);
        }

        if self.phase == RacePhase::Running
            && self.watched_finished >= self.watched
            && self.time > self.last_finish + self.params.finish_delay
        {
            self.phase = RacePhase::Finished;
            self.last_finish = self.time;
            info!(finishers = self.finishers.len(), "race finished");
            events.push(RaceEvent::Finished);
        }

        events
    }

    fn start(
        &mut self,
        cars: &mut [Car],
        players: &[Player],
        launch_boost: &mut impl FnMut() -> f32,
    ) {
        for (car, player) in cars.iter_mut().zip(players) {
            let ratio = player.is_ai_controlled().then(|| launch_boost());
            car.unleash(ratio);
        }
        self.phase = RacePhase::Running;
        self.time = 0;
        info!(cars = cars.len(), laps = self.laps, "race started");
    }

    /// Let the car at `pos` overtake the one directly ahead of it.
    fn improve_rank(&mut self, pos: usize, cars: &[Car]) {
        if pos == 0 {
            return;
        }
        let (back, front) = (self.order[pos], self.order[pos - 1]);
        if self.is_ahead(back, front, cars) {
            self.order.swap(pos, pos - 1);
        }
    }

    fn finish_position(&self, index: usize) -> Option<usize> {
        self.finishers.iter().position(|&finisher| finisher == index)
    }

    fn is_ahead(&self, a: usize, b: usize, cars: &[Car]) -> bool {
        match (self.finish_position(a), self.finish_position(b)) {
            (Some(x), Some(y)) => return x < y,
            (Some(_), None) => return true,
            (None, Some(_)) => return false,
            (None, None) => {}
        }
        let (a, b) = (&cars[a].progress, &cars[b].progress);
        if a.effective_laps() != b.effective_laps() {
            return a.effective_laps() > b.effective_laps();
        }
        if a.segment != b.segment {
            return a.segment > b.segment;
        }
        a.dist_to_seg < b.dist_to_seg
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn laps(&self) -> u32 {
        self.laps
    }

    /// Frames since the start signal, zero while counting down.
    pub fn elapsed(&self) -> u32 {
        match self.phase {
            RacePhase::Countdown => 0,
            _ => self.time,
        }
    }

    /// Frames left until the start signal, or minus the elapsed time once running.
    pub fn time_before_start(&self) -> i32 {
        match self.phase {
            RacePhase::Countdown => self.params.countdown_frames as i32 - self.time as i32,
            _ => -(self.time as i32),
        }
    }

    pub fn time_since_finish(&self) -> u32 {
        self.time.saturating_sub(self.last_finish)
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn finishers(&self) -> &[usize] {
        &self.finishers
    }

    pub fn finish_time(&self, index: usize) -> Option<u32> {
        self.finish_position(index).map(|pos| self.finish_times[pos])
    }

    /// Result rows shown so far, one more every `reveal_frames` after the race ended.
    pub fn revealed_rows(&self) -> usize {
        if self.phase != RacePhase::Finished {
            return 0;
        }
        let reveal = self.params.reveal_frames.max(1);
        (self.time_since_finish().div_ceil(reveal) as usize).min(self.order.len())
    }

    /// Whether "race again" and "quit" can be offered.
    pub fn actions_available(&self) -> bool {
        let rows = self.order.len().saturating_sub(1) as u32;
        self.phase == RacePhase::Finished
            && self.params.reveal_frames * rows < self.time_since_finish()
    }
}
