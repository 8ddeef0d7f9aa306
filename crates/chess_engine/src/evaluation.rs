use chess_core::{Board, Color, PieceType, Square};

// Standard piece values used in chess engines, measured in centipawns (100 = 1 pawn)
const PAWN_VALUE: i32 = 100;
const KNIGHT_VALUE: i32 = 320;
const BISHOP_VALUE: i32 = 330;
const ROOK_VALUE: i32 = 500;
const QUEEN_VALUE: i32 = 900;
const KING_VALUE: i32 = 20000;

const CHECK_PENALTY: i32 = 50;
const BISHOP_PAIR_BONUS: i32 = 30;
// Non-pawn material (both sides, kings excluded) below which the king table switches.
const ENDGAME_MATERIAL: i32 = 2 * ROOK_VALUE + 2 * BISHOP_VALUE;

// Piece-square tables, written from White's side with rank 8 as the first row.
const PAWN_TABLE: [[i32; 8]; 8] = [
    [0, 0, 0, 0, 0, 0, 0, 0],
    [50, 50, 50, 50, 50, 50, 50, 50],
    [10, 10, 20, 30, 30, 20, 10, 10],
    [5, 5, 10, 25, 25, 10, 5, 5],
    [0, 0, 0, 20, 20, 0, 0, 0],
    [5, -5, -10, 0, 0, -10, -5, 5],
    [5, 10, 10, -20, -20, 10, 10, 5],
    [0, 0, 0, 0, 0, 0, 0, 0],
];

const KNIGHT_TABLE: [[i32; 8]; 8] = [
    [-50, -40, -30, -30, -30, -30, -40, -50],
    [-40, -20, 0, 0, 0, 0, -20, -40],
    [-30, 0, 10, 15, 15, 10, 0, -30],
    [-30, 5, 15, 20, 20, 15, 5, -30],
    [-30, 0, 15, 20, 20, 15, 0, -30],
    [-30, 5, 10, 15, 15, 10, 5, -30],
    [-40, -20, 0, 5, 5, 0, -20, -40],
    [-50, -40, -30, -30, -30, -30, -40, -50],
];

const BISHOP_TABLE: [[i32; 8]; 8] = [
    [-20, -10, -10, -10, -10, -10, -10, -20],
    [-10, 0, 0, 0, 0, 0, 0, -10],
    [-10, 0, 5, 10, 10, 5, 0, -10],
    [-10, 5, 5, 10, 10, 5, 5, -10],
    [-10, 0, 10, 10, 10, 10, 0, -10],
    [-10, 10, 10, 10, 10, 10, 10, -10],
    [-10, 5, 0, 0, 0, 0, 5, -10],
    [-20, -10, -10, -10, -10, -10, -10, -20],
];

const ROOK_TABLE: [[i32; 8]; 8] = [
    [0, 0, 0, 0, 0, 0, 0, 0],
    [5, 10, 10, 10, 10, 10, 10, 5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [0, 0, 0, 5, 5, 0, 0, 0],
];

const QUEEN_TABLE: [[i32; 8]; 8] = [
    [-20, -10, -10, -5, -5, -10, -10, -20],
    [-10, 0, 0, 0, 0, 0, 0, -10],
    [-10, 0, 5, 5, 5, 5, 0, -10],
    [-5, 0, 5, 5, 5, 5, 0, -5],
    [0, 0, 5, 5, 5, 5, 0, -5],
    [-10, 5, 5, 5, 5, 5, 0, -10],
    [-10, 0, 5, 0, 0, 0, 0, -10],
    [-20, -10, -10, -5, -5, -10, -10, -20],
];

// Keeps the king tucked behind its pawns while heavy pieces remain.
const KING_MIDDLE_GAME_TABLE: [[i32; 8]; 8] = [
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-20, -30, -30, -40, -40, -30, -30, -20],
    [-10, -20, -20, -20, -20, -20, -20, -10],
    [20, 20, 0, 0, 0, 0, 20, 20],
    [20, 30, 10, 0, 0, 10, 30, 20],
];

// Pulls the king towards the centre once the board has thinned out.
const KING_END_GAME_TABLE: [[i32; 8]; 8] = [
    [-50, -40, -30, -20, -20, -30, -40, -50],
    [-30, -20, -10, 0, 0, -10, -20, -30],
    [-30, -10, 20, 30, 30, 20, -10, -30],
    [-30, -10, 30, 40, 40, 30, -10, -30],
    [-30, -10, 30, 40, 40, 30, -10, -30],
    [-30, -10, 20, 30, 30, 20, -10, -30],
    [-30, -30, 0, 0, 0, 0, -30, -30],
    [-50, -30, -30, -30, -30, -30, -30, -50],
];

/// Scores a position in centipawns from the side to move's perspective.
pub fn evaluate_position(board: &Board) -> i32 {
    let endgame = is_endgame(board);
    let mut score = 0;
    let mut bishops = [0; 2];

    for (square, piece) in board.pieces() {
        let value = piece_value(piece.piece_type)
            + position_bonus(piece.piece_type, square, piece.color, endgame);
        if piece.piece_type == PieceType::Bishop {
            bishops[piece.color as usize] += 1;
        }
        match piece.color {
            Color::White => score += value,
            Color::Black => score -= value,
        }
    }

    if bishops[Color::White as usize] >= 2 {
        score += BISHOP_PAIR_BONUS;
    }
    if bishops[Color::Black as usize] >= 2 {
        score -= BISHOP_PAIR_BONUS;
    }

    if board.is_in_check(Color::White) {
        score -= CHECK_PENALTY;
    }
    if board.is_in_check(Color::Black) {
        score += CHECK_PENALTY;
    }

    match board.current_turn() {
        Color::White => score,
        Color::Black => -score,
    }
}

/// Base material value of a piece in centipawns.
pub fn piece_value(piece_type: PieceType) -> i32 {
    match piece_type {
        PieceType::Pawn => PAWN_VALUE,
        PieceType::Knight => KNIGHT_VALUE,
        PieceType::Bishop => BISHOP_VALUE,
        PieceType::Rook => ROOK_VALUE,
        PieceType::Queen => QUEEN_VALUE,
        PieceType::King => KING_VALUE,
    }
}

fn is_endgame(board: &Board) -> bool {
    let material: i32 = board
        .pieces()
        .filter(|(_, piece)| !matches!(piece.piece_type, PieceType::King | PieceType::Pawn))
        .map(|(_, piece)| piece_value(piece.piece_type))
        .sum();
    material <= ENDGAME_MATERIAL
}

fn position_bonus(piece_type: PieceType, square: Square, color: Color, endgame: bool) -> i32 {
    // Tables list rank 8 first; Black reads them mirrored top to bottom.
    let row = match color {
        Color::White => 7 - square.rank() as usize,
        Color::Black => square.rank() as usize,
    };
    let col = square.file() as usize;

    let table = match piece_type {
        PieceType::Pawn => &PAWN_TABLE,
        PieceType::Knight => &KNIGHT_TABLE,
        PieceType::Bishop => &BISHOP_TABLE,
        PieceType::Rook => &ROOK_TABLE,
        PieceType::Queen => &QUEEN_TABLE,
        PieceType::King if endgame => &KING_END_GAME_TABLE,
        PieceType::King => &KING_MIDDLE_GAME_TABLE,
    };
    table[row][col]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_position_is_balanced() {
        assert_eq!(evaluate_position(&Board::new()), 0);
    }

    #[test]
    fn extra_queen_is_winning_for_its_owner() {
        let white_up = Board::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        assert!(evaluate_position(&white_up) > 800);

        let black_to_move = Board::from_fen("4k3/8/8/8/8/8/8/3QK3 b - - 0 1").unwrap();
        assert!(evaluate_position(&black_to_move) < -800);
    }
}
