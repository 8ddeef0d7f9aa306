//! Rank-by-rank board notation.
//!
//! Ranks run from 8 down to 1 separated by `/`; uppercase letters are White,
//! lowercase Black, digits count empty squares. The side-to-move, castling,
//! en passant and counter fields are optional when reading: a bare placement
//! field loads with White to move and castling inferred from the home squares.

use std::sync::Arc;

use crate::{Board, CastlingRights, Color, FenError, Piece, PieceType, Square};

impl Board {
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let mut fields = fen.split_whitespace();
        let placement = fields.next().ok_or(FenError::Empty)?;
        let squares = parse_placement(placement)?;

        let current_turn = match fields.next() {
            None | Some("w") => Color::White,
            Some("b") => Color::Black,
            Some(other) => return Err(FenError::SideToMove(other.to_string())),
        };

        let castling_rights = match fields.next() {
            None => infer_castling(&squares),
            Some(field) => parse_castling(field)?,
        };

        let mut board = Board::empty(current_turn, castling_rights);
        board.squares = squares;

        board.en_passant = match fields.next() {
            None | Some("-") => None,
            Some(field) => Some(
                Square::from_algebraic(field)
                    .ok_or_else(|| FenError::EnPassant(field.to_string()))?,
            ),
        };
        if let Some(field) = fields.next() {
            board.halfmove_clock = parse_counter(field)?;
        }
        if let Some(field) = fields.next() {
            board.fullmove_number = parse_counter(field)?.max(1);
        }

        for color in [Color::White, Color::Black] {
            let kings = board
                .pieces()
                .filter(|(_, p)| *p == Piece::new(PieceType::King, color))
                .count();
            if kings != 1 {
                return Err(FenError::Kings);
            }
        }

        board.start_fen = Arc::from(board.to_fen());
        board.position_keys.push(board.position_key());
        Ok(board)
    }

    /// The placement field alone, e.g. `rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR`.
    pub fn board_fen(&self) -> String {
        let mut ranks = Vec::with_capacity(8);
        for rank in (0..8u8).rev() {
            let mut text = String::new();
            let mut empty = 0;
            for file in 0..8u8 {
                match self.get_piece(Square::at(file, rank)) {
                    Some(piece) => {
                        if empty > 0 {
                            text.push_str(&empty.to_string());
                            empty = 0;
                        }
                        text.push(piece.fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                text.push_str(&empty.to_string());
            }
            ranks.push(text);
        }
        ranks.join("/")
    }

    pub fn to_fen(&self) -> String {
        let turn = match self.current_turn {
            Color::White => "w",
            Color::Black => "b",
        };
        let en_passant = self
            .en_passant
            .map_or_else(|| "-".to_string(), |square| square.to_string());
        format!(
            "{} {} {} {} {} {}",
            self.board_fen(),
            turn,
            castling_field(self.castling_rights),
            en_passant,
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}

fn parse_placement(placement: &str) -> Result<[Option<Piece>; 64], FenError> {
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return Err(FenError::RankCount(ranks.len()));
    }

    let mut squares = [None; 64];
    for (row, text) in ranks.iter().enumerate() {
        let rank = 7 - row as u8;
        let mut file = 0usize;
        for c in text.chars() {
            if let Some(run) = c.to_digit(10) {
                file += run as usize;
                continue;
            }
            let piece = Piece::from_fen_char(c).ok_or(FenError::PieceLetter(c))?;
            if file < 8 {
                squares[Square::at(file as u8, rank).index()] = Some(piece);
            }
            file += 1;
        }
        if file != 8 {
            return Err(FenError::RankWidth {
                rank: rank as usize + 1,
                files: file,
            });
        }
    }
    Ok(squares)
}

fn parse_castling(field: &str) -> Result<CastlingRights, FenError> {
    let mut rights = CastlingRights::none();
    if field == "-" {
        return Ok(rights);
    }
    for c in field.chars() {
        match c {
            'K' => rights.white_kingside = true,
            'Q' => rights.white_queenside = true,
            'k' => rights.black_kingside = true,
            'q' => rights.black_queenside = true,
            _ => return Err(FenError::Castling(field.to_string())),
        }
    }
    Ok(rights)
}

fn infer_castling(squares: &[Option<Piece>; 64]) -> CastlingRights {
    let holds = |file: u8, rank: u8, piece_type: PieceType, color: Color| {
        squares[Square::at(file, rank).index()] == Some(Piece::new(piece_type, color))
    };
    let white_king = holds(4, 0, PieceType::King, Color::White);
    let black_king = holds(4, 7, PieceType::King, Color::Black);
    CastlingRights {
        white_kingside: white_king && holds(7, 0, PieceType::Rook, Color::White),
        white_queenside: white_king && holds(0, 0, PieceType::Rook, Color::White),
        black_kingside: black_king && holds(7, 7, PieceType::Rook, Color::Black),
        black_queenside: black_king && holds(0, 7, PieceType::Rook, Color::Black),
    }
}

fn castling_field(rights: CastlingRights) -> String {
    let text: String = [
        (rights.white_kingside, 'K'),
        (rights.white_queenside, 'Q'),
        (rights.black_kingside, 'k'),
        (rights.black_queenside, 'q'),
    ]
    .iter()
    .filter(|(allowed, _)| *allowed)
    .map(|(_, letter)| *letter)
    .collect();

    if text.is_empty() {
        "-".to_string()
    } else {
        text
    }
}

fn parse_counter(field: &str) -> Result<u32, FenError> {
    field
        .parse()
        .map_err(|_| FenError::Counter(field.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::STARTING_FEN;

    #[test]
    fn standard_position_round_trips() {
        let board = Board::from_fen(STARTING_FEN).unwrap();
        assert_eq!(board.to_fen(), STARTING_FEN);
        assert_eq!(Board::new().to_fen(), STARTING_FEN);
        assert!(board.starts_from_standard_position());
    }

    #[test]
    fn placement_alone_infers_the_rest() {
        let board = Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR").unwrap();
        assert_eq!(board.to_fen(), STARTING_FEN);
    }

    #[test]
    fn reads_side_to_move_and_counters() {
        let board =
            Board::from_fen("2r5/3r4/p3k1b1/1p1pp1pp/8/1PP1NPP1/PK1R2P1/4R3 b - - 0 26").unwrap();
        assert_eq!(board.current_turn(), Color::Black);
        assert_eq!(board.fullmove_number(), 26);
        assert_eq!(board.castling_rights(), CastlingRights::none());
        assert!(!board.starts_from_standard_position());
    }

    #[test]
    fn board_fen_tracks_moves() {
        let mut board = Board::new();
        let e2 = Square::from_algebraic("e2").unwrap();
        let e4 = Square::from_algebraic("e4").unwrap();
        board.apply_move(e2, e4, None).unwrap();
        assert_eq!(
            board.board_fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR"
        );
        assert_eq!(board.en_passant(), Square::from_algebraic("e3"));
    }

    #[test]
    fn rejects_malformed_notation() {
        assert_eq!(Board::from_fen("").unwrap_err(), FenError::Empty);
        assert_eq!(Board::from_fen("8/8/8").unwrap_err(), FenError::RankCount(3));
        assert!(matches!(
            Board::from_fen("rnbqkbnr/ppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR"),
            Err(FenError::RankWidth { .. })
        ));
        assert_eq!(
            Board::from_fen("xnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR").unwrap_err(),
            FenError::PieceLetter('x')
        );
        assert_eq!(
            Board::from_fen("8/8/8/8/8/8/8/8").unwrap_err(),
            FenError::Kings
        );
    }
}
