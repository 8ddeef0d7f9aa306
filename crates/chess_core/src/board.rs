use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use log::trace;

use crate::{CastleSide, Color, Move, MoveDetail, MoveError, Piece, PieceType, Square};

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const KNIGHT_STEPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];
const KING_STEPS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];
const DIAGONALS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ORTHOGONALS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CastlingRights {
    pub white_kingside: bool,
    pub white_queenside: bool,
    pub black_kingside: bool,
    pub black_queenside: bool,
}

impl Default for CastlingRights {
    fn default() -> Self {
        Self {
            white_kingside: true,
            white_queenside: true,
            black_kingside: true,
            black_queenside: true,
        }
    }
}

impl CastlingRights {
    pub fn none() -> Self {
        Self {
            white_kingside: false,
            white_queenside: false,
            black_kingside: false,
            black_queenside: false,
        }
    }

    pub fn allows(&self, color: Color, side: CastleSide) -> bool {
        match (color, side) {
            (Color::White, CastleSide::KingSide) => self.white_kingside,
            (Color::White, CastleSide::QueenSide) => self.white_queenside,
            (Color::Black, CastleSide::KingSide) => self.black_kingside,
            (Color::Black, CastleSide::QueenSide) => self.black_queenside,
        }
    }

    fn revoke(&mut self, color: Color) {
        match color {
            Color::White => {
                self.white_kingside = false;
                self.white_queenside = false;
            }
            Color::Black => {
                self.black_kingside = false;
                self.black_queenside = false;
            }
        }
    }

    // A rook leaving or being captured on its corner ends that side's right.
    fn revoke_corner(&mut self, square: Square) {
        match (square.file(), square.rank()) {
            (0, 0) => self.white_queenside = false,
            (7, 0) => self.white_kingside = false,
            (0, 7) => self.black_queenside = false,
            (7, 7) => self.black_kingside = false,
            _ => {}
        }
    }
}

/// Logical game state: placement, side to move and the bookkeeping needed
/// for castling, en passant and the draw rules.
#[derive(Debug, Clone)]
pub struct Board {
    pub(crate) squares: [Option<Piece>; 64],
    pub(crate) current_turn: Color,
    pub(crate) castling_rights: CastlingRights,
    pub(crate) en_passant: Option<Square>,
    pub(crate) halfmove_clock: u32,
    pub(crate) fullmove_number: u32,
    pub(crate) start_fen: Arc<str>,
    pub(crate) history: Vec<Move>,
    pub(crate) position_keys: Vec<u64>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        let mut board = Self::empty(Color::White, CastlingRights::default());
        board.setup_initial_position();
        board.start_fen = Arc::from(STARTING_FEN);
        board.position_keys.push(board.position_key());
        board
    }

    pub(crate) fn empty(current_turn: Color, castling_rights: CastlingRights) -> Self {
        Self {
            squares: [None; 64],
            current_turn,
            castling_rights,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            start_fen: Arc::from(""),
            history: Vec::new(),
            position_keys: Vec::new(),
        }
    }

    fn setup_initial_position(&mut self) {
        let piece_order = [
            PieceType::Rook,
            PieceType::Knight,
            PieceType::Bishop,
            PieceType::Queen,
            PieceType::King,
            PieceType::Bishop,
            PieceType::Knight,
            PieceType::Rook,
        ];

        for (file, &piece_type) in (0u8..8).zip(piece_order.iter()) {
            self.put(Square::at(file, 0), Piece::new(piece_type, Color::White));
            self.put(Square::at(file, 1), Piece::new(PieceType::Pawn, Color::White));
            self.put(Square::at(file, 6), Piece::new(PieceType::Pawn, Color::Black));
            self.put(Square::at(file, 7), Piece::new(piece_type, Color::Black));
        }
    }

    pub(crate) fn put(&mut self, square: Square, piece: Piece) {
        self.squares[square.index()] = Some(piece);
    }

    pub fn get_piece(&self, square: Square) -> Option<Piece> {
        self.squares[square.index()]
    }

    /// Occupied squares in rank-major order.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.squares
            .iter()
            .enumerate()
            .filter_map(|(index, piece)| piece.map(|piece| (Square::from_index(index), piece)))
    }

    pub fn current_turn(&self) -> Color {
        self.current_turn
    }

    pub fn castling_rights(&self) -> CastlingRights {
        self.castling_rights
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Moves applied since the position was loaded, oldest first.
    pub fn history(&self) -> &[Move] {
        &self.history
    }

    /// The position this game was loaded from, in full board notation.
    pub fn start_fen(&self) -> &str {
        &self.start_fen
    }

    pub fn starts_from_standard_position(&self) -> bool {
        &*self.start_fen == STARTING_FEN
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces()
            .find(|(_, piece)| piece.piece_type == PieceType::King && piece.color == color)
            .map(|(square, _)| square)
    }

    /// Validates and applies a move given as coordinates.
    ///
    /// A promotion piece is only consulted when a pawn reaches its last rank;
    /// it is ignored for every other move.
    pub fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceType>,
    ) -> Result<MoveDetail, MoveError> {
        let piece = self.get_piece(from).ok_or(MoveError::NoPiece(from))?;
        let promotes =
            piece.piece_type == PieceType::Pawn && to.rank() == piece.color.promotion_rank();
        let candidate = Move {
            from,
            to,
            promotion: if promotes { promotion } else { None },
        };
        self.make_move(candidate)
    }

    pub fn make_move(&mut self, chess_move: Move) -> Result<MoveDetail, MoveError> {
        let piece = self
            .get_piece(chess_move.from)
            .ok_or(MoveError::NoPiece(chess_move.from))?;

        if piece.color != self.current_turn {
            return Err(MoveError::WrongSide {
                square: chess_move.from,
                owner: piece.color,
                turn: self.current_turn,
            });
        }

        let legal = self.get_valid_moves(chess_move.from);
        if !legal.contains(&chess_move) {
            let needs_promotion = chess_move.promotion.is_none()
                && legal
                    .iter()
                    .any(|m| m.to == chess_move.to && m.promotion.is_some());
            return Err(if needs_promotion {
                MoveError::PromotionRequired(chess_move)
            } else {
                MoveError::Illegal(chess_move)
            });
        }

        self.make_move_without_validation(chess_move)
    }

    /// Applies a move the caller already knows to be legal, e.g. one taken
    /// from [`Board::legal_moves`]. Only the presence of a piece is checked.
    pub fn make_move_without_validation(
        &mut self,
        chess_move: Move,
    ) -> Result<MoveDetail, MoveError> {
        let detail = self.relocate(chess_move)?;
        let MoveDetail { from, to, piece, .. } = detail;
        let is_pawn = piece.piece_type == PieceType::Pawn;

        if piece.piece_type == PieceType::King {
            self.castling_rights.revoke(piece.color);
        }
        self.castling_rights.revoke_corner(from);
        self.castling_rights.revoke_corner(to);

        self.en_passant = if is_pawn && (to.rank() as i8 - from.rank() as i8).abs() == 2 {
            Some(Square::at(from.file(), (from.rank() + to.rank()) / 2))
        } else {
            None
        };

        if is_pawn || detail.is_capture() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if piece.color == Color::Black {
            self.fullmove_number += 1;
        }
        self.current_turn = self.current_turn.opposite();

        let applied = detail.as_move();
        self.history.push(applied);
        self.position_keys.push(self.position_key());
        trace!("applied {applied}");

        Ok(detail)
    }

    // Moves pieces only: captures, the castling rook and promotion.
    fn relocate(&mut self, chess_move: Move) -> Result<MoveDetail, MoveError> {
        let Move { from, to, .. } = chess_move;
        let piece = self.squares[from.index()]
            .take()
            .ok_or(MoveError::NoPiece(from))?;
        let is_pawn = piece.piece_type == PieceType::Pawn;

        let mut captured_square = self.get_piece(to).map(|_| to);
        if is_pawn && from.file() != to.file() && captured_square.is_none() {
            let victim = Square::at(to.file(), from.rank());
            if Some(to) == self.en_passant && self.get_piece(victim).is_some() {
                captured_square = Some(victim);
            }
        }
        let captured = captured_square.and_then(|square| self.squares[square.index()].take());

        let mut castle = None;
        if piece.piece_type == PieceType::King && (to.file() as i8 - from.file() as i8).abs() == 2
        {
            let side = if to.file() == 6 {
                CastleSide::KingSide
            } else {
                CastleSide::QueenSide
            };
            let (rook_from, rook_to) = side.rook_squares(piece.color);
            self.squares[rook_to.index()] = self.squares[rook_from.index()].take();
            castle = Some(side);
        }

        let promotion = chess_move.promotion.filter(|_| is_pawn);
        let placed = promotion
            .map(|piece_type| Piece::new(piece_type, piece.color))
            .unwrap_or(piece);
        self.squares[to.index()] = Some(placed);

        Ok(MoveDetail {
            from,
            to,
            piece,
            captured,
            captured_square: captured.and(captured_square),
            promotion,
            castle,
        })
    }

    // Copy of the placement state without history, for trial moves.
    fn scratch(&self) -> Board {
        Board {
            squares: self.squares,
            current_turn: self.current_turn,
            castling_rights: self.castling_rights,
            en_passant: self.en_passant,
            halfmove_clock: 0,
            fullmove_number: 1,
            start_fen: Arc::clone(&self.start_fen),
            history: Vec::new(),
            position_keys: Vec::new(),
        }
    }

    /// Legal moves for the piece on `square`; empty when it is not that side's turn.
    pub fn get_valid_moves(&self, square: Square) -> Vec<Move> {
        let mut pseudo = Vec::new();
        if let Some(piece) = self.get_piece(square) {
            if piece.color == self.current_turn {
                self.piece_moves(square, piece, &mut pseudo);
            }
        }
        pseudo.retain(|&mv| self.keeps_king_safe(mv));
        pseudo
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        let mut pseudo = Vec::with_capacity(48);
        for (square, piece) in self.pieces() {
            if piece.color == self.current_turn {
                self.piece_moves(square, piece, &mut pseudo);
            }
        }
        pseudo.retain(|&mv| self.keeps_king_safe(mv));
        pseudo
    }

    fn has_legal_move(&self) -> bool {
        let mut pseudo = Vec::new();
        for (square, piece) in self.pieces() {
            if piece.color != self.current_turn {
                continue;
            }
            pseudo.clear();
            self.piece_moves(square, piece, &mut pseudo);
            if pseudo.iter().any(|&mv| self.keeps_king_safe(mv)) {
                return true;
            }
        }
        false
    }

    fn keeps_king_safe(&self, chess_move: Move) -> bool {
        let mover = self.current_turn;
        let mut temp_board = self.scratch();
        temp_board.relocate(chess_move).is_ok() && !temp_board.is_in_check(mover)
    }

    fn piece_moves(&self, from: Square, piece: Piece, out: &mut Vec<Move>) {
        match piece.piece_type {
            PieceType::Pawn => self.pawn_moves(from, piece.color, out),
            PieceType::Knight => self.step_moves(from, piece.color, &KNIGHT_STEPS, out),
            PieceType::Bishop => self.slide_moves(from, piece.color, &DIAGONALS, out),
            PieceType::Rook => self.slide_moves(from, piece.color, &ORTHOGONALS, out),
            PieceType::Queen => {
                self.slide_moves(from, piece.color, &DIAGONALS, out);
                self.slide_moves(from, piece.color, &ORTHOGONALS, out);
            }
            PieceType::King => {
                self.step_moves(from, piece.color, &KING_STEPS, out);
                self.castle_moves(from, piece.color, out);
            }
        }
    }

    fn pawn_moves(&self, from: Square, color: Color, out: &mut Vec<Move>) {
        let direction = color.pawn_direction();

        if let Some(one) = from.offset(0, direction) {
            if self.get_piece(one).is_none() {
                push_pawn_move(from, one, color, out);
                if from.rank() == color.pawn_start_rank() {
                    if let Some(two) = one.offset(0, direction) {
                        if self.get_piece(two).is_none() {
                            out.push(Move::new(from, two));
                        }
                    }
                }
            }
        }

        for file_step in [-1, 1] {
            let Some(target) = from.offset(file_step, direction) else {
                continue;
            };
            match self.get_piece(target) {
                Some(victim) if victim.color != color => push_pawn_move(from, target, color, out),
                None if Some(target) == self.en_passant => out.push(Move::new(from, target)),
                _ => {}
            }
        }
    }

    fn step_moves(&self, from: Square, color: Color, steps: &[(i8, i8)], out: &mut Vec<Move>) {
        for &(file_step, rank_step) in steps {
            if let Some(to) = from.offset(file_step, rank_step) {
                if self.get_piece(to).map_or(true, |p| p.color != color) {
                    out.push(Move::new(from, to));
                }
            }
        }
    }

    fn slide_moves(&self, from: Square, color: Color, rays: &[(i8, i8)], out: &mut Vec<Move>) {
        for &(file_step, rank_step) in rays {
            let mut current = from;
            while let Some(to) = current.offset(file_step, rank_step) {
                match self.get_piece(to) {
                    None => out.push(Move::new(from, to)),
                    Some(blocker) => {
                        if blocker.color != color {
                            out.push(Move::new(from, to));
                        }
                        break;
                    }
                }
                current = to;
            }
        }
    }

    fn castle_moves(&self, from: Square, color: Color, out: &mut Vec<Move>) {
        let rank = color.home_rank();
        if from != Square::at(4, rank) || self.is_in_check(color) {
            return;
        }
        let enemy = color.opposite();
        let rook = Piece::new(PieceType::Rook, color);

        for side in [CastleSide::KingSide, CastleSide::QueenSide] {
            if !self.castling_rights.allows(color, side) {
                continue;
            }
            let (rook_from, _) = side.rook_squares(color);
            if self.get_piece(rook_from) != Some(rook) {
                continue;
            }
            let (between, king_path): (&[u8], [u8; 2]) = match side {
                CastleSide::KingSide => (&[5, 6], [5, 6]),
                CastleSide::QueenSide => (&[1, 2, 3], [3, 2]),
            };
            let path_clear = between
                .iter()
                .all(|&file| self.get_piece(Square::at(file, rank)).is_none());
            let path_safe = king_path
                .iter()
                .all(|&file| !self.is_square_attacked(Square::at(file, rank), enemy));
            if path_clear && path_safe {
                out.push(Move::new(from, side.king_destination(color)));
            }
        }
    }

    pub fn is_square_attacked(&self, square: Square, by: Color) -> bool {
        let attacker = |piece_type: PieceType| Some(Piece::new(piece_type, by));

        // A pawn of `by` attacks from one rank behind the target, seen from its side.
        for file_step in [-1, 1] {
            if let Some(from) = square.offset(file_step, -by.pawn_direction()) {
                if self.get_piece(from) == attacker(PieceType::Pawn) {
                    return true;
                }
            }
        }

        let hit_by_step = |steps: &[(i8, i8)], piece_type| {
            steps.iter().any(|&(df, dr)| {
                square
                    .offset(df, dr)
                    .map_or(false, |from| self.get_piece(from) == attacker(piece_type))
            })
        };
        if hit_by_step(&KNIGHT_STEPS[..], PieceType::Knight)
            || hit_by_step(&KING_STEPS[..], PieceType::King)
        {
            return true;
        }

        let hit_by_ray = |rays: &[(i8, i8)], slider: PieceType| {
            rays.iter().any(|&(df, dr)| {
                let mut current = square;
                while let Some(next) = current.offset(df, dr) {
                    if let Some(piece) = self.get_piece(next) {
                        return piece.color == by
                            && (piece.piece_type == slider || piece.piece_type == PieceType::Queen);
                    }
                    current = next;
                }
                false
            })
        };
        hit_by_ray(&DIAGONALS[..], PieceType::Bishop) || hit_by_ray(&ORTHOGONALS[..], PieceType::Rook)
    }

    pub fn is_in_check(&self, color: Color) -> bool {
        self.king_square(color)
            .map_or(false, |king| self.is_square_attacked(king, color.opposite()))
    }

    /// Whether the side to move is in check.
    pub fn is_check(&self) -> bool {
        self.is_in_check(self.current_turn)
    }

    pub fn is_checkmate(&self) -> bool {
        self.is_check() && !self.has_legal_move()
    }

    pub fn is_stalemate(&self) -> bool {
        !self.is_check() && !self.has_legal_move()
    }

    pub fn has_insufficient_material(&self) -> bool {
        let mut white_pieces = Vec::new();
        let mut black_pieces = Vec::new();

        for (square, piece) in self.pieces() {
            if piece.piece_type == PieceType::King {
                continue;
            }
            match piece.color {
                Color::White => white_pieces.push((square, piece.piece_type)),
                Color::Black => black_pieces.push((square, piece.piece_type)),
            }
        }

        let is_minor = |piece_type: PieceType| {
            matches!(piece_type, PieceType::Bishop | PieceType::Knight)
        };

        match (white_pieces.as_slice(), black_pieces.as_slice()) {
            // King vs king
            ([], []) => true,
            // King and minor piece vs king
            ([(_, minor)], []) | ([], [(_, minor)]) => is_minor(*minor),
            // Bishops on same-coloured squares
            ([(white_sq, PieceType::Bishop)], [(black_sq, PieceType::Bishop)]) => {
                (white_sq.file() + white_sq.rank()) % 2 == (black_sq.file() + black_sq.rank()) % 2
            }
            _ => false,
        }
    }

    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove_clock >= 100
    }

    pub fn is_threefold_repetition(&self) -> bool {
        let Some(&current) = self.position_keys.last() else {
            return false;
        };
        self.position_keys.iter().filter(|&&key| key == current).count() >= 3
    }

    /// Stalemate, dead position, fifty-move rule or threefold repetition.
    pub fn is_draw(&self) -> bool {
        self.is_stalemate()
            || self.has_insufficient_material()
            || self.is_fifty_move_draw()
            || self.is_threefold_repetition()
    }

    pub fn is_game_over(&self) -> bool {
        self.is_checkmate() || self.is_draw()
    }

    /// Hash of everything that makes two positions the same for repetition purposes.
    pub fn position_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.squares.hash(&mut hasher);
        self.current_turn.hash(&mut hasher);
        self.castling_rights.hash(&mut hasher);
        self.en_passant.hash(&mut hasher);
        hasher.finish()
    }
}

fn push_pawn_move(from: Square, to: Square, color: Color, out: &mut Vec<Move>) {
    if to.rank() == color.promotion_rank() {
        out.extend(
            PieceType::PROMOTIONS
                .iter()
                .map(|&piece_type| Move::with_promotion(from, to, piece_type)),
        );
    } else {
        out.push(Move::new(from, to));
    }
}
