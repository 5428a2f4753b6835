use std::f32::consts::FRAC_PI_2;

use bevy::{
    color::palettes::css::{WHITE, YELLOW},
    diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin},
    input::mouse::{MouseScrollUnit, MouseWheel},
    prelude::*,
};
use race_protocol::{FRAME_RATE, RaceSnapshot};

use racing::config::GameConfig;
use racing::player::ControlInput;
use racing::race::RaceEvent;
use racing::simulation::Simulation;
use racing::track;
use racing::track_format::TrackCatalog;

mod controls;
mod ui;

pub(crate) use main_game::*;

/// All game-specific types live here so `ui` can import them via `crate::main_game::*`.
mod main_game {
    use super::*;

    use crate::controls::KeyBindings;

    // ── Simulation state ────────────────────────────────────────────────

    #[derive(States, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub enum SimState {
        #[default]
        Racing,
        Paused,
    }

    // ── Messages ────────────────────────────────────────────────────────

    /// A race event produced by the last simulation step.
    #[derive(Message)]
    pub struct RaceMessage(pub RaceEvent);

    #[derive(Message)]
    pub enum RaceCommand {
        Restart,
        Quit,
    }

    // ── Resources ───────────────────────────────────────────────────────

    #[derive(Resource)]
    pub struct Settings {
        pub config: GameConfig,
        pub bindings: Vec<KeyBindings>,
    }

    #[derive(Resource)]
    pub struct RaceSim {
        pub sim: Simulation,
        pub snapshot: RaceSnapshot,
    }

    /// Why no race could be set up; shown instead of the race.
    #[derive(Resource, Default)]
    pub struct LoadError(pub Option<String>);

    /// Held buttons per local input slot, gathered every frame for the next step.
    #[derive(Resource, Default)]
    pub struct PendingInput(pub Vec<ControlInput>);

    // ── Components ──────────────────────────────────────────────────────

    #[derive(Component)]
    pub struct CarBody(pub usize);

    #[derive(Component)]
    pub struct ItemBoxSprite {
        pub group: usize,
        pub index: usize,
    }
}

const CAR_COLORS: [Color; 8] = [
    Color::srgb(0.9, 0.2, 0.2),
    Color::srgb(0.2, 0.4, 0.95),
    Color::srgb(0.2, 0.8, 0.3),
    Color::srgb(0.95, 0.8, 0.1),
    Color::srgb(0.7, 0.3, 0.85),
    Color::srgb(0.1, 0.8, 0.8),
    Color::srgb(0.95, 0.5, 0.1),
    Color::srgb(0.85, 0.85, 0.85),
];

const CAMERA_SCALE: f32 = 0.06;
const CAMERA_LOOKAHEAD: f32 = 6.0;

pub fn car_color(player: usize) -> Color {
    CAR_COLORS[player % CAR_COLORS.len()]
}

/// Track space is drawn mirrored on the y axis so that the left side of a car
/// is on the left of the screen.
fn to_screen(world: Vec2) -> Vec2 {
    Vec2::new(world.x, -world.y)
}

fn main() {
    let config_path = GameConfig::path_from_args();
    let mut load_error = LoadError::default();
    let mut config = GameConfig::load(&config_path).unwrap_or_else(|err| {
        load_error.0 = Some(err.to_string());
        GameConfig::default()
    });
    config.apply_env_overrides();
    let bindings = controls::load_bindings(&config_path);

    App::new()
        .add_plugins((
            DefaultPlugins.set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Racing".to_string(),
                    ..default()
                }),
                ..default()
            }),
            FrameTimeDiagnosticsPlugin::default(),
            ui::RaceUiPlugin,
        ))
        .init_state::<SimState>()
        .add_message::<RaceMessage>()
        .add_message::<RaceCommand>()
        .insert_resource(Time::<Fixed>::from_duration(
            std::time::Duration::from_secs_f64(1.0 / f64::from(FRAME_RATE)),
        ))
        .insert_resource(Settings { config, bindings })
        .insert_resource(load_error)
        .insert_resource(PendingInput::default())
        .add_systems(Startup, (setup_race, setup.after(setup_race)))
        .add_systems(Update, (read_player_input, handle_race_keys))
        .add_systems(
            FixedUpdate,
            step_race.run_if(in_state(SimState::Racing).and(resource_exists::<RaceSim>)),
        )
        .add_systems(
            Update,
            (handle_race_commands, update_cars, update_item_boxes, update_camera)
                .run_if(resource_exists::<RaceSim>),
        )
        .add_systems(Update, update_fps_counter)
        .run();
}

fn setup_race(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
    settings: Res<Settings>,
    mut load_error: ResMut<LoadError>,
) {
    if load_error.0.is_some() {
        return;
    }
    let config = &settings.config;
    let simulation = TrackCatalog::scan(&config.tracks_dir)
        .and_then(|catalog| catalog.load(config.track.as_deref()))
        .and_then(|track| Simulation::new(&track, config));
    let sim = match simulation {
        Ok(sim) => sim,
        Err(err) => {
            error!("failed to set up race: {err}");
            load_error.0 = Some(err.to_string());
            return;
        }
    };

    let geometry = sim.geometry().clone();
    let flip = Transform::from_scale(Vec3::new(1.0, -1.0, 1.0));

    // Grass
    let bounds = geometry.bounds();
    commands.spawn((
        Mesh2d(meshes.add(Rectangle::new(
            bounds.width() + 200.0,
            bounds.height() + 200.0,
        ))),
        MeshMaterial2d(materials.add(Color::srgb(0.2, 0.55, 0.2))),
        Transform::from_translation(to_screen(bounds.center()).extend(-1.0)),
    ));

    commands.spawn((
        Mesh2d(meshes.add(track::create_track_mesh(&geometry))),
        MeshMaterial2d(materials.add(Color::srgb(0.3, 0.3, 0.3))),
        flip,
    ));
    commands.spawn((
        Mesh2d(meshes.add(track::create_wall_mesh(&geometry))),
        MeshMaterial2d(materials.add(Color::srgb(0.75, 0.75, 0.8))),
        flip.with_translation(Vec3::new(0.0, 0.0, 0.1)),
    ));

    // Goal line
    let goal = geometry.goal_line();
    let goal_dir = to_screen(goal.right) - to_screen(goal.left);
    commands.spawn((
        Mesh2d(meshes.add(Rectangle::new(goal.width(), 0.6))),
        MeshMaterial2d(materials.add(Color::from(WHITE))),
        Transform::from_translation(to_screen(goal.midpoint()).extend(0.05))
            .with_rotation(Quat::from_rotation_z(goal_dir.to_angle())),
    ));

    let box_mesh = meshes.add(Rectangle::new(
        racing::items::BOX_SIZE,
        racing::items::BOX_SIZE,
    ));
    let box_material = materials.add(Color::from(YELLOW));
    for (group_index, group) in sim.items().groups().iter().enumerate() {
        for (index, item_box) in group.boxes().iter().enumerate() {
            commands.spawn((
                Mesh2d(box_mesh.clone()),
                MeshMaterial2d(box_material.clone()),
                Transform::from_translation(to_screen(item_box.position).extend(0.2)),
                ItemBoxSprite {
                    group: group_index,
                    index,
                },
            ));
        }
    }

    let body_mesh = meshes.add(Rectangle::new(0.9, 1.6));
    let nose_mesh = meshes.add(Rectangle::new(0.7, 0.3));
    let nose_material = materials.add(Color::srgb(0.1, 0.1, 0.1));
    for (index, car) in sim.cars().iter().enumerate() {
        commands
            .spawn((
                Mesh2d(body_mesh.clone()),
                MeshMaterial2d(materials.add(car_color(index))),
                Transform::from_translation(to_screen(car.position).extend(1.0)),
                CarBody(index),
            ))
            .with_children(|parent| {
                parent.spawn((
                    Mesh2d(nose_mesh.clone()),
                    MeshMaterial2d(nose_material.clone()),
                    Transform::from_xyz(0.0, 0.6, 0.1),
                ));
            });
    }

    info!(
        track = geometry.name(),
        cars = sim.cars().len(),
        "race ready"
    );
    let snapshot = sim.snapshot();
    commands.insert_resource(RaceSim { sim, snapshot });
}

fn setup(mut commands: Commands) {
    // FPS counter
    commands.spawn((
        Node {
            position_type: PositionType::Absolute,
            bottom: Val::Px(8.0),
            left: Val::Px(8.0),
            padding: UiRect::axes(Val::Px(8.0), Val::Px(4.0)),
            ..default()
        },
        BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.55)),
        Text::new("FPS: --"),
        TextFont {
            font_size: 14.0,
            ..default()
        },
        TextColor(WHITE.into()),
        FpsCounterText,
    ));

    commands.spawn((
        Camera2d,
        Projection::Orthographic(OrthographicProjection {
            scale: CAMERA_SCALE,
            ..OrthographicProjection::default_2d()
        }),
    ));
}

#[derive(Component)]
struct FpsCounterText;

fn update_fps_counter(
    diagnostics: Res<DiagnosticsStore>,
    mut query: Query<&mut Text, With<FpsCounterText>>,
) {
    let Ok(mut text) = query.single_mut() else {
        return;
    };

    if let Some(fps) = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|value| value.smoothed())
    {
        text.0 = format!("FPS: {fps:>3.0}");
    }
}

// ── Input ───────────────────────────────────────────────────────────────────

fn read_player_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    settings: Res<Settings>,
    mut pending: ResMut<PendingInput>,
) {
    let humans = settings.config.human_players;
    pending.0.resize(humans, ControlInput::default());
    for (slot, bindings) in settings.bindings.iter().take(humans).enumerate() {
        let input = bindings.read(&keyboard);
        // Item presses are latched until a simulation step consumes them.
        let use_item = pending.0[slot].use_item || input.use_item;
        pending.0[slot] = ControlInput { use_item, ..input };
    }
}

fn handle_race_keys(
    keyboard: Res<ButtonInput<KeyCode>>,
    race: Option<Res<RaceSim>>,
    state: Res<State<SimState>>,
    mut next_state: ResMut<NextState<SimState>>,
    mut race_commands: MessageWriter<RaceCommand>,
) {
    let actions_available = race.is_some_and(|race| race.snapshot.actions_available);
    if keyboard.just_pressed(KeyCode::Escape) {
        race_commands.write(RaceCommand::Quit);
    }
    if actions_available && keyboard.just_pressed(KeyCode::Enter) {
        race_commands.write(RaceCommand::Restart);
    }
    if keyboard.just_pressed(KeyCode::KeyP) {
        next_state.set(match state.get() {
            SimState::Racing => SimState::Paused,
            SimState::Paused => SimState::Racing,
        });
    }
}

fn handle_race_commands(
    mut race_commands: MessageReader<RaceCommand>,
    mut race: ResMut<RaceSim>,
    mut exit: MessageWriter<AppExit>,
) {
    for command in race_commands.read() {
        match command {
            RaceCommand::Restart => {
                info!("restarting race");
                race.sim.restart();
                race.snapshot = race.sim.snapshot();
            }
            RaceCommand::Quit => {
                exit.write(AppExit::Success);
            }
        }
    }
}

// ── Simulation ──────────────────────────────────────────────────────────────

fn step_race(
    mut race: ResMut<RaceSim>,
    mut pending: ResMut<PendingInput>,
    mut messages: MessageWriter<RaceMessage>,
) {
    let events = race.sim.step(&pending.0);
    for input in &mut pending.0 {
        input.use_item = false;
    }
    race.snapshot = race.sim.snapshot();
    for event in events {
        messages.write(RaceMessage(event));
    }
}

// ── Presentation ────────────────────────────────────────────────────────────

fn update_cars(race: Res<RaceSim>, mut car_query: Query<(&CarBody, &mut Transform)>) {
    for (body, mut transform) in &mut car_query {
        let Some(car) = race.snapshot.car_for_player(body.0) else {
            continue;
        };
        let forward = to_screen(-Vec2::from_angle(car.heading));
        transform.translation = to_screen(Vec2::from_array(car.position)).extend(1.0);
        transform.rotation = Quat::from_rotation_z(forward.to_angle() - FRAC_PI_2);
    }
}

fn update_item_boxes(
    race: Res<RaceSim>,
    mut box_query: Query<(&ItemBoxSprite, &mut Transform, &mut Visibility)>,
) {
    let groups = race.sim.items().groups();
    for (sprite, mut transform, mut visibility) in &mut box_query {
        let Some(item_box) = groups
            .get(sprite.group)
            .and_then(|group| group.boxes().get(sprite.index))
        else {
            continue;
        };
        let scale = item_box.scale();
        transform.scale = Vec3::splat(scale.max(0.001));
        transform.rotate_z(0.02);
        *visibility = if scale > 0.0 {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
}

/// Follow the local players' cars, or the leader when nobody plays.
fn update_camera(
    race: Res<RaceSim>,
    pending: Res<PendingInput>,
    mut camera_query: Query<(&mut Transform, &mut Projection), With<Camera2d>>,
    mut scroll_events: MessageReader<MouseWheel>,
) {
    let Ok((mut camera_transform, mut projection)) = camera_query.single_mut() else {
        return;
    };

    if let Projection::Orthographic(ref mut ortho) = *projection {
        for event in scroll_events.read() {
            let zoom_delta = match event.unit {
                MouseScrollUnit::Line => event.y * 0.1,
                MouseScrollUnit::Pixel => event.y * 0.001,
            };
            ortho.scale = (ortho.scale * (1.0 - zoom_delta)).clamp(0.01, 1.0);
        }
    }

    let snapshot = &race.snapshot;
    let followed: Vec<_> = if snapshot.cars.iter().any(|car| car.human) {
        snapshot.cars.iter().filter(|car| car.human).collect()
    } else {
        snapshot.cars.iter().filter(|car| car.rank == 1).collect()
    };
    if followed.is_empty() {
        return;
    }

    let mut target = Vec2::ZERO;
    for car in &followed {
        let mirror = pending.0.get(car.player).is_some_and(|input| input.mirror);
        let look = if mirror {
            -CAMERA_LOOKAHEAD
        } else {
            CAMERA_LOOKAHEAD
        };
        let forward = -Vec2::from_angle(car.heading);
        target += to_screen(Vec2::from_array(car.position) + forward * look);
    }
    target /= followed.len() as f32;

    let current = camera_transform.translation.xy();
    let eased = current.lerp(target, 0.15);
    camera_transform.translation.x = eased.x;
    camera_transform.translation.y = eased.y;
}
