// Core chess game logic modules
pub mod board;
pub mod error;
pub mod fen;
pub mod moves;
pub mod piece;
pub mod square;

// Re-export main types for convenience
pub use board::{Board, CastlingRights, STARTING_FEN};
pub use error::{FenError, MoveError};
pub use moves::{CastleSide, Move, MoveDetail};
pub use piece::{Color, Piece, PieceType};
pub use square::Square;
