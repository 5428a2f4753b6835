use std::sync::Arc;

use race_protocol::{CarSnapshot, RacePhase, RaceSnapshot, ResultRow};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::ai::AiDriver;
use crate::car::{Car, resolve_car_collisions};
use crate::config::GameConfig;
use crate::items::ItemManager;
use crate::player::{ControlInput, Player};
use crate::race::{Race, RaceEvent};
use crate::track::TrackGeometry;
use crate::track_format::{Track, TrackError};

/// One race on one track: every car, player and item box, advanced a frame at a time.
pub struct Simulation {
    geometry: Arc<TrackGeometry>,
    cars: Vec<Car>,
    players: Vec<Player>,
    race: Race,
    items: ItemManager,
    ai: AiDriver,
    rng: StdRng,
}

impl Simulation {
    pub fn new(track: &Track, config: &GameConfig) -> Result<Self, TrackError> {
        let geometry = TrackGeometry::build(track)?;
        Ok(Self::with_geometry(Arc::new(geometry), config))
    }

    pub fn with_geometry(geometry: Arc<TrackGeometry>, config: &GameConfig) -> Self {
        let humans = config.human_players;
        let players: Vec<Player> = (0..config.total_cars())
            .map(|id| {
                if id < humans {
                    Player::human(id, id)
                } else {
                    Player::cpu(id)
                }
            })
            .collect();
        let cars = players
            .iter()
            .map(|_| Car::new(geometry.clone(), config.car))
            .collect();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut simulation = Self {
            race: Race::new(geometry.laps(), config.race, &players),
            items: ItemManager::new(&geometry, &config.items),
            ai: AiDriver::new(config.ai),
            geometry,
            cars,
            players,
            rng,
        };
        simulation.restart();
        info!(
            track = simulation.geometry.name(),
            cars = simulation.cars.len(),
            humans,
            laps = simulation.geometry.laps(),
            "race set up"
        );
        simulation
    }

    /// Put everyone back on the grid and start a new countdown.
    pub fn restart(&mut self) {
        let count = self.cars.len();
        for (index, (car, player)) in self.cars.iter_mut().zip(&mut self.players).enumerate() {
            player.reset();
            // The first player starts nearest the line.
            car.reset(self.geometry.grid_position(count - 1 - index));
            car.lock();
        }
        self.items.reset();
        self.race.reset(&self.players);
        debug!(cars = count, "grid reset");
    }

    /// Advance the whole race by one frame. `inputs` is indexed by local input slot.
    pub fn step(&mut self, inputs: &[ControlInput]) -> Vec<RaceEvent> {
        let racing = self.race.phase() != RacePhase::Countdown;

        for (index, (car, player)) in self.cars.iter_mut().zip(&self.players).enumerate() {
            let (controls, use_item) = if player.is_ai_controlled() {
                let decision = self.ai.decide(car);
                (decision.controls, decision.use_item)
            } else {
                let input = player
                    .input_slot()
                    .and_then(|slot| inputs.get(slot))
                    .copied()
                    .unwrap_or_default();
                (input.controls(), input.use_item)
            };
            if use_item && racing {
                self.items.use_item(index, car);
            }
            car.advance(controls);
        }

        for car in &mut self.cars {
            self.items.hit_test(car);
        }
        resolve_car_collisions(&mut self.cars);
        self.items.update(&mut self.cars);

        let ai = &self.ai;
        let rng = &mut self.rng;
        self.race.update(&mut self.cars, &mut self.players, || {
            ai.random_launch_boost(rng)
        })
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        let minimap = self.geometry.minimap();
        let cars = self
            .cars
            .iter()
            .zip(&self.players)
            .enumerate()
            .map(|(index, (car, player))| CarSnapshot {
                player: index,
                name: player.name(),
                human: player.is_human(),
                position: car.position.to_array(),
                heading: car.angle,
                speed: car.speed,
                wheel: car.wheel,
                rank: car.rank,
                laps: car.effective_laps(),
                segment: car.progress.segment,
                wrong_way: car.going_wrong_way(),
                boosting: car.boosting,
                item: car.item.as_ref().map(|item| item.kind().icon()),
                finished: player.finished(),
                minimap: minimap.project(car.position).to_array(),
            })
            .collect();

        let results = self
            .race
            .order()
            .iter()
            .take(self.race.revealed_rows())
            .enumerate()
            .map(|(pos, &index)| {
                let player = &self.players[index];
                ResultRow {
                    rank: pos as u32 + 1,
                    name: player.name(),
                    human: player.is_human(),
                    time: self.race.finish_time(index),
                }
            })
            .collect();

        RaceSnapshot {
            track: self.geometry.name().to_string(),
            phase: self.race.phase(),
            time: self.race.elapsed(),
            time_before_start: self.race.time_before_start(),
            laps: self.race.laps(),
            cars,
            results,
            actions_available: self.race.actions_available(),
        }
    }

    pub fn geometry(&self) -> &Arc<TrackGeometry> {
        &self.geometry
    }

    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn race(&self) -> &Race {
        &self.race
    }

    pub fn items(&self) -> &ItemManager {
        &self.items
    }

    pub fn is_finished(&self) -> bool {
        self.race.phase() == RacePhase::Finished
    }
}
