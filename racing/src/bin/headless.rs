use racing::config::GameConfig;
use racing::race::RaceEvent;
use racing::simulation::Simulation;
use racing::track_format::TrackCatalog;
use race_protocol::{format_race_time, format_rank};
use tracing::{info, warn};

/// Give up on races that have not ended after half an hour of race time.
const MAX_FRAMES: u64 = 60 * 60 * 30;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "racing=info,headless_race=info".into()),
        )
        .init();

    let mut config = GameConfig::load(&GameConfig::path_from_args())?;
    config.apply_env_overrides();
    config.ai_players += config.human_players;
    config.human_players = 0;
    config.clamp_players();

    let catalog = TrackCatalog::scan(&config.tracks_dir)?;
    let track = catalog.load(config.track.as_deref())?;
    let mut sim = Simulation::new(&track, &config)?;

    let mut frames = 0;
    while !sim.is_finished() {
        if frames >= MAX_FRAMES {
            warn!(frames, "race did not finish, stopping");
            break;
        }
        for event in sim.step(&[]) {
            if let RaceEvent::PlayerFinished { player, rank, time } = event {
                info!(
                    player,
                    rank = %format_rank(rank),
                    time = %format_race_time(time),
                    "crossed the line"
                );
            }
        }
        frames += 1;
    }

    let race = sim.race();
    for (pos, &index) in race.order().iter().enumerate() {
        let time = race
            .finish_time(index)
            .map(format_race_time)
            .unwrap_or_else(|| "--".to_string());
        info!(
            "{:>4}  car {index}  {time}",
            format_rank(pos as u32 + 1)
        );
    }
    info!(frames, track = track.name.as_str(), "headless race done");
    Ok(())
}
