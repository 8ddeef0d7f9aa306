//! Turns applied moves into timelines on the scene.
//!
//! Every piece animation is tagged [`TimelineGroup::Piece`] and every camera
//! move [`TimelineGroup::Camera`], so either can be cancelled wholesale.

use std::f32::consts::{PI, TAU};
use std::time::Duration;

use bevy::math::Vec3;
use chess_core::{CastleSide, Move, PieceType, Square};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{CameraPose, StageConfig};
use crate::coords::BoardAnchorGrid;
use crate::error::StageError;
use crate::scene::{PieceId, Placements, SceneBinding};
use crate::timeline::{Easing, Timeline, TimelineGroup, TimelineHandle, TimelineScheduler};

// Largest angle a captured piece strays from flying straight off the board.
const CAPTURE_SPREAD: f32 = 0.6;

pub struct MoveChoreographer<S> {
    scene: S,
    grid: BoardAnchorGrid,
    scheduler: TimelineScheduler<S>,
    config: StageConfig,
    rng: StdRng,
}

impl<S: SceneBinding + 'static> MoveChoreographer<S> {
    /// Takes ownership of the scene and calibrates the board grid from it.
    pub fn new(scene: S, config: &StageConfig) -> Self {
        let (a1, h8) = scene.calibration_anchors();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            scene,
            grid: BoardAnchorGrid::from_calibration(a1, h8),
            scheduler: TimelineScheduler::new(),
            config: config.clone(),
            rng,
        }
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn grid(&self) -> &BoardAnchorGrid {
        &self.grid
    }

    pub fn scheduler(&self) -> &TimelineScheduler<S> {
        &self.scheduler
    }

    pub fn advance(&mut self, dt: Duration) {
        self.scheduler.advance(dt, &mut self.scene);
    }

    /// True once no piece animation is in flight.
    pub fn is_idle(&self) -> bool {
        self.scheduler.active_in(TimelineGroup::Piece) == 0
    }

    pub fn cancel(&mut self, handle: TimelineHandle) -> bool {
        self.scheduler.cancel(handle)
    }

    pub fn cancel_group(&mut self, group: TimelineGroup) -> usize {
        self.scheduler.cancel_group(group)
    }

    /// Lifts the piece with a random tilt, then carries it to `to` and sets
    /// it down at its rest orientation, slightly off centre.
    pub fn animate_move(&mut self, piece: PieceId, from: Square, to: Square) -> TimelineHandle {
        let start = self.scene.position(piece);
        let turned = self.scene.rotation(piece);
        let rest = self.rest_rotation_of(piece);
        let tilted = rest + Vec3::new(self.tilt(), self.tilt(), self.tilt());

        let elevation = self.grid.elevation();
        let lifted = elevation + self.config.lift_height;
        let target = self.grid.square_to_position(to) + Vec3::new(self.jitter(), 0.0, self.jitter());

        let lift = Timeline::new(
            "lift",
            vec![start.y, turned.x, turned.y, turned.z],
            vec![lifted, tilted.x, tilted.y, tilted.z],
            self.config.lift_duration,
        )
        .easing(Easing::QuadraticOut)
        .on_update(move |scene: &mut S, v| {
            let at = scene.position(piece);
            scene.set_position(piece, Vec3::new(at.x, v[0], at.z));
            scene.set_rotation(piece, Vec3::new(v[1], v[2], v[3]));
        });

        let travel = Timeline::new(
            "travel",
            vec![start.x, start.z, lifted, tilted.x, tilted.y, tilted.z],
            vec![target.x, target.z, elevation, rest.x, rest.y, rest.z],
            self.config.move_duration,
        )
        .easing(Easing::QuadraticInOut)
        .on_update(move |scene: &mut S, v| {
            scene.set_position(piece, Vec3::new(v[0], v[2], v[1]));
            scene.set_rotation(piece, Vec3::new(v[3], v[4], v[5]));
        });

        debug!("{piece}: {from} -> {to}");
        self.scheduler
            .schedule(lift.then(travel), TimelineGroup::Piece)
    }

    /// Throws a captured piece off the board in an arc and hides it.
    ///
    /// `start_delay` lets a mover arrive before its victim leaves; pass zero
    /// for captures the player made by hand.
    pub fn animate_capture(&mut self, piece: PieceId, start_delay: Duration) -> TimelineHandle {
        let start = self.scene.position(piece);
        let centre = self.board_centre();

        let outward = Vec3::new(start.x - centre.x, 0.0, start.z - centre.z);
        let heading = if outward.length_squared() > 1e-6 {
            outward.z.atan2(outward.x) + self.rng.gen_range(-CAPTURE_SPREAD..=CAPTURE_SPREAD)
        } else {
            self.rng.gen_range(0.0..TAU)
        };
        let distance = self.config.capture_distance;
        let end_x = start.x + heading.cos() * distance;
        let end_z = start.z + heading.sin() * distance;
        let base = start.y;
        let arc = self.config.capture_arc_height;

        let timeline = Timeline::new(
            "capture",
            vec![start.x, start.z, 0.0],
            vec![end_x, end_z, 1.0],
            self.config.capture_duration,
        )
        .delay(start_delay)
        .easing(Easing::QuadraticOut)
        .on_update(move |scene: &mut S, v| {
            let height = base + (v[2] * PI).sin() * arc;
            scene.set_position(piece, Vec3::new(v[0], height, v[1]));
        })
        .on_complete(move |scene: &mut S, _| scene.set_visible(piece, false));

        debug!("{piece} captured, leaving after {start_delay:?}");
        self.scheduler.schedule(timeline, TimelineGroup::Piece)
    }

    /// Moves the rook that goes with a castling king.
    ///
    /// Returns `Ok(None)` when the king move is not one of e1g1, e1c1, e8g8
    /// or e8c8. `placements` must still describe the board before the move.
    pub fn animate_castle(
        &mut self,
        king_move: Move,
        mover: PieceId,
        placements: &Placements,
    ) -> Result<Option<TimelineHandle>, StageError> {
        if mover.piece_type() != PieceType::King {
            return Ok(None);
        }
        let Some(side) = CastleSide::from_king_move(king_move.from, king_move.to) else {
            return Ok(None);
        };
        let (rook_from, rook_to) = side.rook_squares(mover.side);
        let rook = placements.require(rook_from)?;
        Ok(Some(self.animate_move(rook, rook_from, rook_to)))
    }

    /// Sends a piece back to `origin` after a rejected drop.
    pub fn return_to_origin(&mut self, piece: PieceId, origin: Square) -> TimelineHandle {
        let start = self.scene.position(piece);
        let turned = self.scene.rotation(piece);
        let rest = self.scene.rest_rotation(piece).unwrap_or(turned);
        let target = self.grid.square_to_position(origin);

        let timeline = Timeline::new(
            "return",
            vec![start.x, start.y, start.z, turned.x, turned.y, turned.z],
            vec![target.x, target.y, target.z, rest.x, rest.y, rest.z],
            self.config.return_duration,
        )
        .easing(Easing::QuadraticOut)
        .on_update(move |scene: &mut S, v| {
            scene.set_position(piece, Vec3::new(v[0], v[1], v[2]));
            scene.set_rotation(piece, Vec3::new(v[3], v[4], v[5]));
        });
        self.scheduler.schedule(timeline, TimelineGroup::Piece)
    }

    /// Raises a picked-up piece to drag height. Only elevation is animated,
    /// so the piece can be dragged across the board meanwhile.
    pub fn lift_for_drag(&mut self, piece: PieceId) -> TimelineHandle {
        let start = self.scene.position(piece);
        let timeline = Timeline::new(
            "drag",
            vec![start.y],
            vec![self.config.drag_height],
            self.config.drag_duration,
        )
        .easing(Easing::ExponentialOut)
        .on_update(move |scene: &mut S, v| {
            let at = scene.position(piece);
            scene.set_position(piece, Vec3::new(at.x, v[0], at.z));
        });
        self.scheduler.schedule(timeline, TimelineGroup::Piece)
    }

    /// Replaces any running camera move with one towards `pose`.
    pub fn move_camera(&mut self, pose: CameraPose) -> TimelineHandle {
        self.scheduler.cancel_group(TimelineGroup::Camera);
        let current = self.scene.camera_pose();
        let timeline = Timeline::new(
            "camera",
            vec![
                current.position.x,
                current.position.y,
                current.position.z,
                current.target.x,
                current.target.y,
                current.target.z,
            ],
            vec![
                pose.position.x,
                pose.position.y,
                pose.position.z,
                pose.target.x,
                pose.target.y,
                pose.target.z,
            ],
            self.config.camera_duration,
        )
        .easing(Easing::SineInOut)
        .on_update(|scene: &mut S, v| {
            scene.set_camera_pose(CameraPose::new(
                Vec3::new(v[0], v[1], v[2]),
                Vec3::new(v[3], v[4], v[5]),
            ));
        });
        self.scheduler.schedule(timeline, TimelineGroup::Camera)
    }

    /// Puts a piece on a square at once, upright and visible.
    pub fn place(&mut self, piece: PieceId, square: Square) {
        let rest = self.rest_rotation_of(piece);
        self.scene
            .set_position(piece, self.grid.square_to_position(square));
        self.scene.set_rotation(piece, rest);
        self.scene.set_visible(piece, true);
    }

    pub fn hide(&mut self, piece: PieceId) {
        self.scene.set_visible(piece, false);
    }

    // Recorded on first movement and reused for every later settle.
    fn rest_rotation_of(&mut self, piece: PieceId) -> Vec3 {
        match self.scene.rest_rotation(piece) {
            Some(rest) => rest,
            None => {
                let rest = self.scene.rotation(piece);
                self.scene.set_rest_rotation(piece, rest);
                rest
            }
        }
    }

    fn board_centre(&self) -> Vec3 {
        let (a1, h8) = self.scene.calibration_anchors();
        (a1 + h8) / 2.0
    }

    fn jitter(&mut self) -> f32 {
        let gap = self.config.jitter_gap.abs();
        self.rng.gen_range(-gap..=gap)
    }

    fn tilt(&mut self) -> f32 {
        let max = self.config.max_tilt.abs();
        self.rng.gen_range(-max..=max)
    }
}
