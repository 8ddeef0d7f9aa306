use std::time::Duration;

use bevy::math::Vec3;
use chess_core::{Color, STARTING_FEN};

/// Where the camera sits and what it looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
}

impl CameraPose {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self { position, target }
    }
}

/// Tunables for a game session. Distances are in scene units, angles in
/// radians.
#[derive(Debug, Clone, PartialEq)]
pub struct StageConfig {
    /// Position loaded on start and restart, in board notation.
    pub start_fen: String,
    pub human_side: Color,

    /// Height above the board a moving piece is lifted to.
    pub lift_height: f32,
    /// Elevation a dragged piece is raised to.
    pub drag_height: f32,
    pub lift_duration: Duration,
    pub move_duration: Duration,
    pub drag_duration: Duration,
    pub return_duration: Duration,
    pub capture_duration: Duration,
    pub camera_duration: Duration,
    /// Start delay of a capture made by the engine, so the mover lands first.
    pub engine_capture_delay: Duration,

    /// Largest planar offset from the square centre a piece settles at.
    pub jitter_gap: f32,
    /// Largest tilt applied to a lifted piece on each axis.
    pub max_tilt: f32,
    pub capture_distance: f32,
    pub capture_arc_height: f32,

    pub start_camera: CameraPose,

    /// Per-move think time sent with `go`; the engine default when unset.
    pub movetime: Option<Duration>,
    pub engine_depth: u8,
    /// Seeds choreography randomness for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            start_fen: STARTING_FEN.to_string(),
            human_side: Color::White,
            lift_height: 1.2,
            drag_height: 4.0,
            lift_duration: Duration::from_millis(250),
            move_duration: Duration::from_millis(450),
            drag_duration: Duration::from_millis(500),
            return_duration: Duration::from_millis(350),
            capture_duration: Duration::from_millis(700),
            camera_duration: Duration::from_millis(1500),
            engine_capture_delay: Duration::from_millis(400),
            jitter_gap: 0.08,
            max_tilt: 0.15,
            capture_distance: 6.0,
            capture_arc_height: 2.5,
            start_camera: CameraPose::new(Vec3::new(0.0, 9.5, 8.5), Vec3::new(0.0, 0.0, 0.5)),
            movetime: Some(Duration::from_millis(800)),
            engine_depth: 4,
            seed: None,
        }
    }
}
