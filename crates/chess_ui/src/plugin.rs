use bevy::{
    prelude::*,
    window::{PresentMode, PrimaryWindow, WindowResolution},
};
use chess_core::{Color as Side, PieceType, Square};
use chess_engine::{spawn_engine, ChessAI, EngineHandle};

use crate::config::StageConfig;
use crate::controller::{GameController, GameEvent, GameOverReason};
use crate::scene::{PieceId, PieceRegistry, SceneBinding};

// Centres of a1 and h8 on the spawned board.
const A1_CENTRE: Vec3 = Vec3::new(-3.5, 0.0, 3.5);
const H8_CENTRE: Vec3 = Vec3::new(3.5, 0.0, -3.5);
const SQUARE_SIZE: f32 = 1.0;

pub struct ChessUiPlugin;

/// Session settings. Insert before adding [`ChessUiPlugin`] to override the
/// defaults.
#[derive(Resource, Default, Clone)]
pub struct StageSettings(pub StageConfig);

#[derive(Resource)]
struct Stage {
    controller: GameController<PieceRegistry, EngineHandle>,
}

#[derive(Resource)]
struct StatusLine(String);

#[derive(Component)]
struct PieceTag(PieceId);

#[derive(Component)]
struct StageCamera;

#[derive(Component)]
struct StatusText;

impl Plugin for ChessUiPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Chess Theater".into(),
                resolution: WindowResolution::new(1024.0, 768.0),
                present_mode: PresentMode::AutoVsync,
                resizable: true,
                ..default()
            }),
            ..default()
        }))
        .init_resource::<StageSettings>()
        .insert_resource(StatusLine("Waiting for the engine...".to_string()))
        .insert_resource(ClearColor(Color::rgb(0.08, 0.08, 0.1)))
        .add_systems(Startup, setup_stage)
        .add_systems(
            Update,
            (
                handle_restart,
                handle_pointer,
                tick_controller,
                sync_scene,
                update_status_text,
            )
                .chain(),
        );
    }
}

fn setup_stage(
    mut commands: Commands,
    settings: Res<StageSettings>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let config = settings.0.clone();

    commands.spawn((
        Camera3dBundle {
            transform: Transform::from_translation(config.start_camera.position)
                .looking_at(config.start_camera.target, Vec3::Y),
            ..default()
        },
        StageCamera,
    ));

    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight {
            illuminance: 12_000.0,
            shadows_enabled: true,
            ..default()
        },
        transform: Transform::from_xyz(4.0, 10.0, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
        ..default()
    });

    // Board
    commands.spawn(PbrBundle {
        mesh: meshes.add(Mesh::from(shape::Box::new(8.6, 0.2, 8.6))),
        material: materials.add(Color::rgb(0.25, 0.15, 0.08).into()),
        transform: Transform::from_xyz(0.0, -0.11, 0.0),
        ..default()
    });

    let square_mesh = meshes.add(Mesh::from(shape::Box::new(SQUARE_SIZE, 0.02, SQUARE_SIZE)));
    let light_square = materials.add(Color::rgb(0.9, 0.86, 0.76).into());
    let dark_square = materials.add(Color::rgb(0.35, 0.25, 0.18).into());
    for square in Square::all() {
        let is_light = (square.file() + square.rank()) % 2 == 1;
        let centre = A1_CENTRE
            + Vec3::new(
                square.file() as f32 * SQUARE_SIZE,
                -0.01,
                -(square.rank() as f32) * SQUARE_SIZE,
            );
        commands.spawn(PbrBundle {
            mesh: square_mesh.clone(),
            material: if is_light {
                light_square.clone()
            } else {
                dark_square.clone()
            },
            transform: Transform::from_translation(centre),
            ..default()
        });
    }

    let registry = PieceRegistry::standard_set(A1_CENTRE, H8_CENTRE, config.start_camera);
    spawn_pieces(&mut commands, &registry, &mut meshes, &mut materials);
    spawn_ui(&mut commands);

    let mut ai = ChessAI::new(config.engine_depth);
    if let Some(seed) = config.seed {
        ai = ai.with_seed(seed);
    }
    let engine = match spawn_engine(ai) {
        Ok(engine) => engine,
        Err(err) => {
            error!("could not start the engine: {err}");
            return;
        }
    };

    match GameController::new(registry, engine, config) {
        Ok(controller) => commands.insert_resource(Stage { controller }),
        Err(err) => error!("could not set up the game: {err}"),
    }
}

fn spawn_pieces(
    commands: &mut Commands,
    registry: &PieceRegistry,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) {
    let white = materials.add(Color::rgb(0.92, 0.9, 0.85).into());
    let black = materials.add(Color::rgb(0.12, 0.12, 0.14).into());

    for piece in PieceId::all() {
        let (mesh, height) = piece_mesh(piece.piece_type());
        let material = match piece.side {
            Side::White => white.clone(),
            Side::Black => black.clone(),
        };
        commands
            .spawn((
                SpatialBundle::from_transform(Transform::from_translation(
                    registry.position(piece),
                )),
                PieceTag(piece),
                Name::new(piece.name()),
            ))
            .with_children(|parent| {
                parent.spawn(PbrBundle {
                    mesh: meshes.add(mesh),
                    material,
                    transform: Transform::from_xyz(0.0, height / 2.0, 0.0),
                    ..default()
                });
            });
    }
}

// Mesh for a piece kind and its height; the mesh is centred on its origin.
fn piece_mesh(piece_type: PieceType) -> (Mesh, f32) {
    match piece_type {
        PieceType::Pawn => (
            Mesh::from(shape::Cylinder {
                radius: 0.25,
                height: 0.55,
                ..default()
            }),
            0.55,
        ),
        PieceType::Rook => (Mesh::from(shape::Box::new(0.5, 0.75, 0.5)), 0.75),
        PieceType::Knight => (Mesh::from(shape::Box::new(0.35, 0.8, 0.6)), 0.8),
        PieceType::Bishop => (
            Mesh::from(shape::Capsule {
                radius: 0.22,
                depth: 0.5,
                ..default()
            }),
            0.94,
        ),
        PieceType::Queen => (
            Mesh::from(shape::Cylinder {
                radius: 0.3,
                height: 1.05,
                ..default()
            }),
            1.05,
        ),
        PieceType::King => (Mesh::from(shape::Box::new(0.45, 1.2, 0.45)), 1.2),
    }
}

fn spawn_ui(commands: &mut Commands) {
    commands.spawn((
        TextBundle::from_section(
            "Waiting for the engine...",
            TextStyle {
                font_size: 28.0,
                color: Color::WHITE,
                ..default()
            },
        )
        .with_style(Style {
            position_type: PositionType::Absolute,
            top: Val::Px(10.0),
            left: Val::Px(10.0),
            ..default()
        }),
        StatusText,
    ));
}

fn handle_restart(
    keys: Res<Input<KeyCode>>,
    stage: Option<ResMut<Stage>>,
    mut status: ResMut<StatusLine>,
) {
    let Some(mut stage) = stage else {
        return;
    };
    if !keys.just_pressed(KeyCode::R) {
        return;
    }
    match stage.controller.restart() {
        Ok(()) => status.0 = "Waiting for the engine...".to_string(),
        Err(err) => error!("restart failed: {err}"),
    }
}

fn handle_pointer(
    windows: Query<&Window, With<PrimaryWindow>>,
    camera_q: Query<(&Camera, &GlobalTransform), With<StageCamera>>,
    mouse_button: Res<Input<MouseButton>>,
    stage: Option<ResMut<Stage>>,
) {
    let Some(mut stage) = stage else {
        return;
    };
    let Ok(window) = windows.get_single() else {
        return;
    };
    let Ok((camera, camera_transform)) = camera_q.get_single() else {
        return;
    };

    let controller = &mut stage.controller;
    let elevation = controller.grid().elevation();
    let Some(point) = window
        .cursor_position()
        .and_then(|cursor| camera.viewport_to_world(camera_transform, cursor))
        .and_then(|ray| {
            ray.intersect_plane(Vec3::new(0.0, elevation, 0.0), Vec3::Y)
                .map(|distance| ray.get_point(distance))
        })
    else {
        return;
    };

    if mouse_button.just_pressed(MouseButton::Left) && !controller.is_dragging() {
        let square = controller.grid().position_to_square(point);
        let centre = controller.grid().square_to_position(square);
        let (file_step, rank_step) = controller.grid().square_size();
        // Clicks beside the board resolve to an edge square; skip them.
        if (point.x - centre.x).abs() <= file_step / 2.0
            && (point.z - centre.z).abs() <= rank_step / 2.0
        {
            if let Some(piece) = controller.pick_up(square) {
                debug!("picked up {piece} on {square}");
            }
        }
    }

    if controller.is_dragging() {
        if mouse_button.pressed(MouseButton::Left) {
            controller.drag_to(point);
        }
        if mouse_button.just_released(MouseButton::Left) {
            if let Err(err) = controller.drop_piece() {
                error!("drop failed: {err}");
            }
        }
    }
}

fn tick_controller(
    time: Res<Time>,
    stage: Option<ResMut<Stage>>,
    mut status: ResMut<StatusLine>,
) {
    let Some(mut stage) = stage else {
        return;
    };
    let controller = &mut stage.controller;
    if let Err(err) = controller.tick(time.delta()) {
        error!("{err}");
    }

    let human = controller.human_side();
    for event in controller.drain_events() {
        status.0 = describe(&event, human);
    }
}

fn describe(event: &GameEvent, human: Side) -> String {
    match event {
        GameEvent::EngineReady => "Engine ready".to_string(),
        GameEvent::EngineThinking => "Engine is thinking...".to_string(),
        GameEvent::MoveApplied { side, mv } if *side == human => format!("You played {mv}"),
        GameEvent::MoveApplied { mv, .. } => format!("Engine played {mv}. Your move"),
        GameEvent::IllegalMove { from, to } => format!("{from}{to} is not a legal move"),
        GameEvent::Check(_) => "Check!".to_string(),
        GameEvent::GameOver(GameOverReason::CheckmateLoss) => {
            "Checkmate, the engine wins. Press R to restart".to_string()
        }
        GameEvent::GameOver(GameOverReason::CheckmateWin) => {
            "Checkmate, you win! Press R to restart".to_string()
        }
        GameEvent::GameOver(GameOverReason::Draw) => "Draw. Press R to restart".to_string(),
    }
}

fn sync_scene(
    stage: Option<Res<Stage>>,
    mut pieces: Query<(&PieceTag, &mut Transform, &mut Visibility)>,
    mut camera: Query<&mut Transform, (With<StageCamera>, Without<PieceTag>)>,
) {
    let Some(stage) = stage else {
        return;
    };
    let scene = stage.controller.scene();

    for (tag, mut transform, mut visibility) in pieces.iter_mut() {
        let rotation = scene.rotation(tag.0);
        transform.translation = scene.position(tag.0);
        transform.rotation = Quat::from_euler(EulerRot::XYZ, rotation.x, rotation.y, rotation.z);
        *visibility = if scene.is_visible(tag.0) {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }

    if let Ok(mut transform) = camera.get_single_mut() {
        let pose = scene.camera_pose();
        *transform = Transform::from_translation(pose.position).looking_at(pose.target, Vec3::Y);
    }
}

fn update_status_text(status: Res<StatusLine>, mut text_query: Query<&mut Text, With<StatusText>>) {
    if !status.is_changed() {
        return;
    }
    if let Ok(mut text) = text_query.get_single_mut() {
        text.sections[0].value = status.0.clone();
    }
}
