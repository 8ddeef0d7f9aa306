use thiserror::Error;

use crate::{Color, Move, Square};

/// Reasons the rule engine refuses a move.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("no piece on {0}")]
    NoPiece(Square),

    #[error("the piece on {square} is {owner:?} but {turn:?} is to move")]
    WrongSide {
        square: Square,
        owner: Color,
        turn: Color,
    },

    #[error("{0} is not a legal move")]
    Illegal(Move),

    #[error("{0} reaches the last rank and needs a promotion piece")]
    PromotionRequired(Move),
}

/// Problems found while reading board notation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenError {
    #[error("empty position string")]
    Empty,

    #[error("expected 8 ranks, found {0}")]
    RankCount(usize),

    #[error("rank {rank} describes {files} files")]
    RankWidth { rank: usize, files: usize },

    #[error("unknown piece letter '{0}'")]
    PieceLetter(char),

    #[error("invalid side to move '{0}'")]
    SideToMove(String),

    #[error("invalid castling field '{0}'")]
    Castling(String),

    #[error("invalid en passant square '{0}'")]
    EnPassant(String),

    #[error("invalid move counter '{0}'")]
    Counter(String),

    #[error("each side needs exactly one king")]
    Kings,
}
