use bevy::prelude::*;
use race_protocol::{
    ItemIcon, RacePhase, countdown_label, format_laps_left, format_race_time, format_rank,
};
use racing::race::RaceEvent;
use racing::track::MINIMAP_SIZE;

use crate::car_color;
use crate::main_game::{LoadError, RaceMessage, RaceSim, Settings, SimState};

pub struct RaceUiPlugin;

impl Plugin for RaceUiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Banner>()
            .add_systems(Startup, setup_ui)
            .add_systems(
                Update,
                (
                    build_minimap.run_if(resource_added::<RaceSim>),
                    update_player_panels,
                    update_clock,
                    update_countdown,
                    update_minimap,
                    update_results,
                )
                    .run_if(resource_exists::<RaceSim>),
            )
            .add_systems(
                Update,
                (
                    handle_race_messages,
                    update_banner,
                    update_pause_text,
                    update_load_error,
                ),
            );
    }
}

#[derive(Component)]
struct PlayerPanelText(usize);
#[derive(Component)]
struct ClockText;
#[derive(Component)]
struct CountdownText;
#[derive(Component)]
struct BannerText;
#[derive(Component)]
struct PauseText;
#[derive(Component)]
struct LoadErrorText;
#[derive(Component)]
struct MinimapRoot;
#[derive(Component)]
struct MinimapDot(usize);
#[derive(Component)]
struct ResultsPanel;
#[derive(Component)]
struct ResultsText;

/// Short message in the middle of the screen, e.g. laps left.
#[derive(Resource, Default)]
struct Banner {
    text: String,
    timer: Option<Timer>,
}

const PANEL_BG: Color = Color::srgba(0.08, 0.08, 0.12, 0.8);
const TEXT_COLOR: Color = Color::srgb(0.9, 0.9, 0.9);
const LABEL_COLOR: Color = Color::srgb(0.7, 0.7, 0.7);
const WARNING_COLOR: Color = Color::srgb(0.95, 0.3, 0.2);
const BANNER_SECONDS: f32 = 2.0;

fn px(val: f32) -> Val {
    Val::Px(val)
}

fn text_font(size: f32) -> TextFont {
    TextFont {
        font_size: size,
        ..default()
    }
}

fn centered_row(top: f32) -> Node {
    Node {
        position_type: PositionType::Absolute,
        top: px(top),
        left: px(0.0),
        right: px(0.0),
        justify_content: JustifyContent::Center,
        ..default()
    }
}

fn setup_ui(mut commands: Commands, settings: Res<Settings>) {
    // Per-player status, top left.
    commands
        .spawn(Node {
            position_type: PositionType::Absolute,
            top: px(8.0),
            left: px(8.0),
            flex_direction: FlexDirection::Column,
            row_gap: px(6.0),
            ..default()
        })
        .with_children(|column| {
            for slot in 0..settings.config.human_players {
                column
                    .spawn((
                        Node {
                            padding: UiRect::axes(px(8.0), px(4.0)),
                            ..default()
                        },
                        BackgroundColor(PANEL_BG),
                    ))
                    .with_children(|panel| {
                        panel.spawn((
                            Text::new(""),
                            PlayerPanelText(slot),
                            text_font(16.0),
                            TextColor(car_color(slot)),
                        ));
                    });
            }
        });

    commands
        .spawn(centered_row(8.0))
        .with_children(|row| {
            row.spawn((
                Text::new("0'00''00"),
                ClockText,
                text_font(22.0),
                TextColor(TEXT_COLOR),
            ));
        });

    commands
        .spawn(centered_row(140.0))
        .with_children(|row| {
            row.spawn((
                Text::new(""),
                CountdownText,
                text_font(72.0),
                TextColor(Color::srgb(1.0, 0.85, 0.2)),
            ));
        });

    commands
        .spawn(centered_row(240.0))
        .with_children(|row| {
            row.spawn((
                Text::new(""),
                BannerText,
                text_font(36.0),
                TextColor(TEXT_COLOR),
            ));
        });

    commands
        .spawn(centered_row(60.0))
        .with_children(|row| {
            row.spawn((
                Text::new(""),
                PauseText,
                text_font(28.0),
                TextColor(LABEL_COLOR),
            ));
            row.spawn((
                Text::new(""),
                LoadErrorText,
                text_font(18.0),
                TextColor(WARNING_COLOR),
            ));
        });

    commands.spawn((
        MinimapRoot,
        Node {
            position_type: PositionType::Absolute,
            right: px(12.0),
            bottom: px(12.0),
            width: px(MINIMAP_SIZE),
            height: px(MINIMAP_SIZE),
            ..default()
        },
        BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.35)),
    ));

    commands
        .spawn((
            ResultsPanel,
            Node {
                position_type: PositionType::Absolute,
                top: px(100.0),
                left: px(0.0),
                right: px(0.0),
                justify_content: JustifyContent::Center,
                ..default()
            },
            Visibility::Hidden,
        ))
        .with_children(|row| {
            row.spawn((
                Node {
                    flex_direction: FlexDirection::Column,
                    padding: UiRect::all(px(16.0)),
                    min_width: px(320.0),
                    ..default()
                },
                BackgroundColor(PANEL_BG),
            ))
            .with_children(|panel| {
                panel.spawn((Text::new("Results"), text_font(24.0), TextColor(TEXT_COLOR)));
                panel.spawn((
                    Text::new(""),
                    ResultsText,
                    text_font(18.0),
                    TextColor(TEXT_COLOR),
                ));
            });
        });
}

fn update_player_panels(
    race: Res<RaceSim>,
    mut text_query: Query<(&PlayerPanelText, &mut Text)>,
) {
    let snapshot = &race.snapshot;
    for (panel, mut text) in &mut text_query {
        let Some(car) = snapshot.car_for_player(panel.0) else {
            continue;
        };
        let lap = (car.laps + 1).clamp(1, snapshot.laps as i32);
        let mut lines = vec![
            car.name.clone(),
            format!("{}  Lap {lap}/{}", format_rank(car.rank), snapshot.laps),
        ];
        if car.finished {
            lines.push("FINISHED".to_string());
        } else if car.wrong_way && snapshot.phase == RacePhase::Running {
            lines.push("WRONG WAY".to_string());
        }
        if let Some(item) = car.item {
            lines.push(match item {
                ItemIcon::Booster => "Item: Booster".to_string(),
            });
        }
        if car.boosting {
            lines.push("BOOST!".to_string());
        }
        text.0 = lines.join("\n");
    }
}

fn update_clock(race: Res<RaceSim>, mut query: Query<&mut Text, With<ClockText>>) {
    let Ok(mut text) = query.single_mut() else {
        return;
    };
    text.0 = format!(
        "{}  {}",
        race.snapshot.track,
        format_race_time(race.snapshot.time)
    );
}

fn update_countdown(race: Res<RaceSim>, mut query: Query<&mut Text, With<CountdownText>>) {
    let Ok(mut text) = query.single_mut() else {
        return;
    };
    text.0 = countdown_label(race.snapshot.time_before_start)
        .unwrap_or_default()
        .to_string();
}

fn handle_race_messages(
    mut messages: MessageReader<RaceMessage>,
    race: Option<Res<RaceSim>>,
    mut banner: ResMut<Banner>,
) {
    let Some(race) = race else {
        messages.clear();
        return;
    };
    for RaceMessage(event) in messages.read() {
        let text = match *event {
            RaceEvent::LapCompleted { player, laps_left } => race
                .snapshot
                .car_for_player(player)
                .filter(|car| car.human)
                .map(|car| format!("{}: {}", car.name, format_laps_left(laps_left))),
            RaceEvent::PlayerFinished { player, rank, .. } => race
                .snapshot
                .car_for_player(player)
                .filter(|car| car.human)
                .map(|car| format!("{} finished {}", car.name, format_rank(rank))),
            RaceEvent::Finished => Some("RACE OVER".to_string()),
            RaceEvent::Started => None,
        };
        if let Some(text) = text {
            banner.text = text;
            banner.timer = Some(Timer::from_seconds(BANNER_SECONDS, TimerMode::Once));
        }
    }
}

fn update_banner(
    time: Res<Time>,
    mut banner: ResMut<Banner>,
    mut query: Query<&mut Text, With<BannerText>>,
) {
    let Ok(mut text) = query.single_mut() else {
        return;
    };
    let Banner {
        text: message,
        timer,
    } = &mut *banner;
    match timer {
        Some(t) => {
            t.tick(time.delta());
            if t.is_finished() {
                *timer = None;
                text.0.clear();
            } else if text.0 != *message {
                text.0 = message.clone();
            }
        }
        None => {
            if !text.0.is_empty() {
                text.0.clear();
            }
        }
    }
}

fn update_pause_text(state: Res<State<SimState>>, mut query: Query<&mut Text, With<PauseText>>) {
    if !state.is_changed() {
        return;
    }
    let Ok(mut text) = query.single_mut() else {
        return;
    };
    text.0 = match state.get() {
        SimState::Racing => String::new(),
        SimState::Paused => "PAUSED (P to resume)".to_string(),
    };
}

fn update_load_error(
    load_error: Res<LoadError>,
    mut query: Query<&mut Text, With<LoadErrorText>>,
) {
    if !load_error.is_changed() {
        return;
    }
    let Ok(mut text) = query.single_mut() else {
        return;
    };
    text.0 = load_error
        .0
        .as_ref()
        .map(|err| format!("Could not start a race: {err}"))
        .unwrap_or_default();
}

fn build_minimap(
    mut commands: Commands,
    race: Res<RaceSim>,
    root_query: Query<Entity, With<MinimapRoot>>,
) {
    let Ok(root) = root_query.single() else {
        return;
    };
    let minimap = race.sim.geometry().minimap();
    commands.entity(root).with_children(|map| {
        for &point in minimap.left_wall.iter().chain(&minimap.right_wall) {
            map.spawn(minimap_dot(point, 2.0, LABEL_COLOR));
        }
        let [a, b] = minimap.goal_line;
        for step in 0..=8 {
            map.spawn(minimap_dot(a.lerp(b, step as f32 / 8.0), 2.0, Color::WHITE));
        }
        for car in &race.snapshot.cars {
            map.spawn((
                minimap_dot(Vec2::from_array(car.minimap), 6.0, car_color(car.player)),
                MinimapDot(car.player),
            ));
        }
    });
}

fn minimap_dot(at: Vec2, size: f32, color: Color) -> (Node, BackgroundColor) {
    (
        Node {
            position_type: PositionType::Absolute,
            left: px(at.x - size / 2.0),
            top: px(at.y - size / 2.0),
            width: px(size),
            height: px(size),
            ..default()
        },
        BackgroundColor(color),
    )
}

fn update_minimap(race: Res<RaceSim>, mut dot_query: Query<(&MinimapDot, &mut Node)>) {
    for (dot, mut node) in &mut dot_query {
        let Some(car) = race.snapshot.car_for_player(dot.0) else {
            continue;
        };
        node.left = px(car.minimap[0] - 3.0);
        node.top = px(car.minimap[1] - 3.0);
    }
}

fn update_results(
    race: Res<RaceSim>,
    mut panel_query: Query<&mut Visibility, With<ResultsPanel>>,
    mut text_query: Query<&mut Text, With<ResultsText>>,
) {
    let snapshot = &race.snapshot;
    let Ok(mut visibility) = panel_query.single_mut() else {
        return;
    };
    if snapshot.phase != RacePhase::Finished {
        *visibility = Visibility::Hidden;
        return;
    }
    *visibility = Visibility::Inherited;

    let Ok(mut text) = text_query.single_mut() else {
        return;
    };
    let mut lines: Vec<String> = snapshot
        .results
        .iter()
        .map(|row| {
            let time = row
                .time
                .map(format_race_time)
                .unwrap_or_else(|| "--".to_string());
            format!("{:>4}  {:<10} {time}", format_rank(row.rank), row.name)
        })
        .collect();
    if snapshot.actions_available {
        lines.push(String::new());
        lines.push("Enter: race again   Esc: quit".to_string());
    }
    text.0 = lines.join("\n");
}
