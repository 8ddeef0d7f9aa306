//! Identities of the 32 piece objects and the scene state bound to them.

use std::collections::HashMap;
use std::fmt;

use bevy::math::Vec3;
use chess_core::{Color, PieceType, Square};
use log::debug;

use crate::config::CameraPose;
use crate::coords::BoardAnchorGrid;
use crate::error::StageError;

/// Which of a side's sixteen objects this is. Numbered slots are 1-based,
/// counted from the a-file as the set stands at the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceSlot {
    King,
    Queen,
    Rook(u8),
    Knight(u8),
    Bishop(u8),
    Pawn(u8),
}

const SLOTS: [PieceSlot; 16] = [
    PieceSlot::Rook(1),
    PieceSlot::Rook(2),
    PieceSlot::Knight(1),
    PieceSlot::Knight(2),
    PieceSlot::Bishop(1),
    PieceSlot::Bishop(2),
    PieceSlot::Queen,
    PieceSlot::King,
    PieceSlot::Pawn(1),
    PieceSlot::Pawn(2),
    PieceSlot::Pawn(3),
    PieceSlot::Pawn(4),
    PieceSlot::Pawn(5),
    PieceSlot::Pawn(6),
    PieceSlot::Pawn(7),
    PieceSlot::Pawn(8),
];

/// One physical piece object in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceId {
    pub side: Color,
    pub slot: PieceSlot,
}

impl PieceId {
    pub const fn new(side: Color, slot: PieceSlot) -> Self {
        Self { side, slot }
    }

    /// All 32 identities, White first, in slot order.
    pub fn all() -> impl Iterator<Item = PieceId> {
        [Color::White, Color::Black]
            .into_iter()
            .flat_map(|side| SLOTS.iter().map(move |&slot| PieceId::new(side, slot)))
    }

    pub fn piece_type(self) -> PieceType {
        match self.slot {
            PieceSlot::King => PieceType::King,
            PieceSlot::Queen => PieceType::Queen,
            PieceSlot::Rook(_) => PieceType::Rook,
            PieceSlot::Knight(_) => PieceType::Knight,
            PieceSlot::Bishop(_) => PieceType::Bishop,
            PieceSlot::Pawn(_) => PieceType::Pawn,
        }
    }

    /// Square the object stands on in the standard starting arrangement.
    pub fn home_square(self) -> Square {
        let back = self.side.home_rank();
        let pawns = if self.side == Color::White { 1 } else { 6 };
        let (file, rank) = match self.slot {
            PieceSlot::Rook(1) => (0, back),
            PieceSlot::Rook(_) => (7, back),
            PieceSlot::Knight(1) => (1, back),
            PieceSlot::Knight(_) => (6, back),
            PieceSlot::Bishop(1) => (2, back),
            PieceSlot::Bishop(_) => (5, back),
            PieceSlot::Queen => (3, back),
            PieceSlot::King => (4, back),
            PieceSlot::Pawn(n) => (n.clamp(1, 8) - 1, pawns),
        };
        Square::new(file, rank).unwrap_or(Square::from_index(0))
    }

    fn index(self) -> usize {
        let slot = SLOTS.iter().position(|&slot| slot == self.slot).unwrap_or(0);
        match self.side {
            Color::White => slot,
            Color::Black => 16 + slot,
        }
    }

    /// Scene object name, e.g. `white_R1` or `black_P5`.
    pub fn name(self) -> String {
        let side = match self.side {
            Color::White => "white",
            Color::Black => "black",
        };
        let slot = match self.slot {
            PieceSlot::King => "K".to_string(),
            PieceSlot::Queen => "Q".to_string(),
            PieceSlot::Rook(n) => format!("R{n}"),
            PieceSlot::Knight(n) => format!("N{n}"),
            PieceSlot::Bishop(n) => format!("B{n}"),
            PieceSlot::Pawn(n) => format!("P{n}"),
        };
        format!("{side}_{slot}")
    }

    pub fn from_name(name: &str) -> Option<Self> {
        PieceId::all().find(|id| id.name() == name)
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// The scene as the choreography sees it.
///
/// Rotations are Euler angles (x, y, z) in radians. Every identity is
/// guaranteed to exist once a binding is constructed, so lookups are
/// infallible.
pub trait SceneBinding {
    fn position(&self, piece: PieceId) -> Vec3;
    fn set_position(&mut self, piece: PieceId, position: Vec3);
    fn is_visible(&self, piece: PieceId) -> bool;
    fn set_visible(&mut self, piece: PieceId, visible: bool);
    fn rotation(&self, piece: PieceId) -> Vec3;
    fn set_rotation(&mut self, piece: PieceId, rotation: Vec3);
    /// Orientation recorded the first time the piece moved.
    fn rest_rotation(&self, piece: PieceId) -> Option<Vec3>;
    fn set_rest_rotation(&mut self, piece: PieceId, rotation: Vec3);
    /// Load-time positions of the a1 and h8 calibration pieces.
    fn calibration_anchors(&self) -> (Vec3, Vec3);
    fn camera_pose(&self) -> CameraPose;
    fn set_camera_pose(&mut self, pose: CameraPose);
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PieceState {
    position: Vec3,
    rotation: Vec3,
    rest_rotation: Option<Vec3>,
    visible: bool,
}

const UNPLACED: PieceState = PieceState {
    position: Vec3::ZERO,
    rotation: Vec3::ZERO,
    rest_rotation: None,
    visible: true,
};

/// In-memory scene: one state record per piece identity plus the camera.
#[derive(Debug, Clone)]
pub struct PieceRegistry {
    pieces: [PieceState; 32],
    anchors: (Vec3, Vec3),
    camera: CameraPose,
}

/// Calibration pieces: the white a-file rook and the black h-file rook.
pub const A1_ANCHOR: PieceId = PieceId::new(Color::White, PieceSlot::Rook(1));
pub const H8_ANCHOR: PieceId = PieceId::new(Color::Black, PieceSlot::Rook(2));

impl PieceRegistry {
    /// Builds the registry from named scene objects. Every one of the 32
    /// identities must be present; unknown names are ignored.
    pub fn from_named<'a>(
        objects: impl IntoIterator<Item = (&'a str, Vec3)>,
        camera: CameraPose,
    ) -> Result<Self, StageError> {
        let mut found: HashMap<PieceId, Vec3> = HashMap::new();
        for (name, position) in objects {
            match PieceId::from_name(name) {
                Some(id) => {
                    found.insert(id, position);
                }
                None => debug!("scene object '{name}' is not a piece"),
            }
        }

        let mut pieces = [UNPLACED; 32];
        for id in PieceId::all() {
            let position = *found.get(&id).ok_or(StageError::MissingPiece(id))?;
            pieces[id.index()].position = position;
        }

        let anchors = (
            pieces[A1_ANCHOR.index()].position,
            pieces[H8_ANCHOR.index()].position,
        );
        Ok(Self {
            pieces,
            anchors,
            camera,
        })
    }

    /// A full set standing on its home squares of a board whose a1 and h8
    /// centres are given.
    pub fn standard_set(a1: Vec3, h8: Vec3, camera: CameraPose) -> Self {
        let grid = BoardAnchorGrid::from_calibration(a1, h8);
        let mut pieces = [UNPLACED; 32];
        for id in PieceId::all() {
            pieces[id.index()].position = grid.square_to_position(id.home_square());
        }
        Self {
            pieces,
            anchors: (a1, h8),
            camera,
        }
    }

    pub fn visible_pieces(&self) -> impl Iterator<Item = PieceId> + '_ {
        PieceId::all().filter(|&id| self.pieces[id.index()].visible)
    }
}

impl SceneBinding for PieceRegistry {
    fn position(&self, piece: PieceId) -> Vec3 {
        self.pieces[piece.index()].position
    }

    fn set_position(&mut self, piece: PieceId, position: Vec3) {
        self.pieces[piece.index()].position = position;
    }

    fn is_visible(&self, piece: PieceId) -> bool {
        self.pieces[piece.index()].visible
    }

    fn set_visible(&mut self, piece: PieceId, visible: bool) {
        self.pieces[piece.index()].visible = visible;
    }

    fn rotation(&self, piece: PieceId) -> Vec3 {
        self.pieces[piece.index()].rotation
    }

    fn set_rotation(&mut self, piece: PieceId, rotation: Vec3) {
        self.pieces[piece.index()].rotation = rotation;
    }

    fn rest_rotation(&self, piece: PieceId) -> Option<Vec3> {
        self.pieces[piece.index()].rest_rotation
    }

    fn set_rest_rotation(&mut self, piece: PieceId, rotation: Vec3) {
        self.pieces[piece.index()].rest_rotation = Some(rotation);
    }

    fn calibration_anchors(&self) -> (Vec3, Vec3) {
        self.anchors
    }

    fn camera_pose(&self) -> CameraPose {
        self.camera
    }

    fn set_camera_pose(&mut self, pose: CameraPose) {
        self.camera = pose;
    }
}

/// Which object stands on which square, as far as the stage knows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placements {
    squares: HashMap<Square, PieceId>,
}

impl Placements {
    pub fn get(&self, square: Square) -> Option<PieceId> {
        self.squares.get(&square).copied()
    }

    pub fn require(&self, square: Square) -> Result<PieceId, StageError> {
        self.get(square).ok_or(StageError::PieceNotFound(square))
    }

    pub fn place(&mut self, square: Square, piece: PieceId) {
        self.squares.insert(square, piece);
    }

    pub fn take(&mut self, square: Square) -> Option<PieceId> {
        self.squares.remove(&square)
    }

    /// Moves whatever stands on `from` to `to`, replacing any occupant.
    pub fn relocate(&mut self, from: Square, to: Square) -> Option<PieceId> {
        let piece = self.squares.remove(&from)?;
        self.squares.insert(to, piece);
        Some(piece)
    }

    pub fn clear(&mut self) {
        self.squares.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Square, PieceId)> + '_ {
        self.squares.iter().map(|(&square, &piece)| (square, piece))
    }
}
