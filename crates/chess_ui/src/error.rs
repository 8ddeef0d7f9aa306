use chess_core::{Color, FenError, Move, MoveError, PieceType, Square};
use thiserror::Error;

use crate::scene::PieceId;

/// Failures of the stage: the scene, the choreography or the turn loop.
///
/// Illegal player moves are not errors; they come back as
/// [`GameEvent::IllegalMove`](crate::controller::GameEvent::IllegalMove).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("scene has no object for {0}")]
    MissingPiece(PieceId),

    #[error("no piece stands on {0}")]
    PieceNotFound(Square),

    #[error("engine move {mv} was rejected: {source}")]
    EngineMove {
        mv: Move,
        #[source]
        source: MoveError,
    },

    #[error("not enough {color:?} {piece_type:?} objects to set up the position")]
    NotEnoughInstances { color: Color, piece_type: PieceType },

    #[error("invalid start position: {0}")]
    StartPosition(#[from] FenError),
}
