use std::fmt;

use crate::{Color, Piece, PieceType, Square};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceType>,
}

impl Move {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(from: Square, to: Square, promotion: PieceType) -> Self {
        Self {
            from,
            to,
            promotion: Some(promotion),
        }
    }

    /// Parses `<from><to><promo?>`, e.g. `e2e4` or `e7e8q`.
    pub fn from_uci(text: &str) -> Option<Self> {
        if !text.is_ascii() || !(4..=5).contains(&text.len()) {
            return None;
        }
        let from = Square::from_algebraic(&text[0..2])?;
        let to = Square::from_algebraic(&text[2..4])?;
        let promotion = match text[4..].chars().next() {
            None => None,
            Some(letter @ ('q' | 'r' | 'b' | 'n')) => PieceType::from_letter(letter),
            Some(_) => return None,
        };
        Some(Self {
            from,
            to,
            promotion,
        })
    }

    pub fn to_uci(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promotion) = self.promotion {
            write!(f, "{}", promotion.letter())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastleSide {
    KingSide,
    QueenSide,
}

impl CastleSide {
    /// Recognises the four canonical king moves (e1g1, e1c1, e8g8, e8c8).
    pub fn from_king_move(from: Square, to: Square) -> Option<Self> {
        let on_home_rank = from.rank() == to.rank() && (from.rank() == 0 || from.rank() == 7);
        if !on_home_rank || from.file() != 4 {
            return None;
        }
        match to.file() {
            6 => Some(CastleSide::KingSide),
            2 => Some(CastleSide::QueenSide),
            _ => None,
        }
    }

    /// Origin and destination of the rook that accompanies the king.
    pub fn rook_squares(self, color: Color) -> (Square, Square) {
        let rank = color.home_rank();
        match self {
            CastleSide::KingSide => (Square::at(7, rank), Square::at(5, rank)),
            CastleSide::QueenSide => (Square::at(0, rank), Square::at(3, rank)),
        }
    }

    pub fn king_destination(self, color: Color) -> Square {
        let rank = color.home_rank();
        match self {
            CastleSide::KingSide => Square::at(6, rank),
            CastleSide::QueenSide => Square::at(2, rank),
        }
    }
}

/// What actually happened on the board when a move was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveDetail {
    pub from: Square,
    pub to: Square,
    /// The piece as it stood before moving (a pawn, for promotions).
    pub piece: Piece,
    pub captured: Option<Piece>,
    /// Where the captured piece stood; differs from `to` for en passant.
    pub captured_square: Option<Square>,
    pub promotion: Option<PieceType>,
    pub castle: Option<CastleSide>,
}

impl MoveDetail {
    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }

    pub fn is_en_passant(&self) -> bool {
        matches!(self.captured_square, Some(square) if square != self.to)
    }

    pub fn as_move(&self) -> Move {
        Move {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
    }
}
