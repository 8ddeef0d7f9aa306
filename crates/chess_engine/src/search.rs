// Iterative deepening alpha-beta search with a quiescence tail.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chess_core::{Board, Move, PieceType};
use log::debug;
use rayon::prelude::*;

use crate::evaluation::{evaluate_position, piece_value};

pub const MATE_SCORE: i32 = 30_000;
const INFINITY: i32 = 32_000;
// Scores this close to mate mean a forced line was found.
const MATE_THRESHOLD: i32 = MATE_SCORE - 256;
const MAX_QUIESCENCE_DEPTH: u8 = 6;
// How many nodes pass between clock checks.
const CLOCK_INTERVAL: u64 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_depth: u8,
    pub time_budget: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchReport {
    pub best_move: Option<Move>,
    pub score: i32,
    pub depth: u8,
    pub nodes: u64,
    pub elapsed: Duration,
}

// Shared between the rayon workers searching root moves.
struct SearchContext {
    deadline: Instant,
    nodes: AtomicU64,
    stopped: AtomicBool,
}

impl SearchContext {
    fn new(deadline: Instant) -> Self {
        Self {
            deadline,
            nodes: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    // Counts a node and reports whether the search must unwind.
    fn visit(&self) -> bool {
        let visited = self.nodes.fetch_add(1, Ordering::Relaxed) + 1;
        if visited % CLOCK_INTERVAL == 0 && Instant::now() >= self.deadline {
            self.stopped.store(true, Ordering::Relaxed);
        }
        self.stopped.load(Ordering::Relaxed)
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

/// Finds the best move for the side to move within the given limits.
///
/// Each completed depth replaces the previous answer; a depth interrupted by
/// the clock is discarded unless it is the first one.
pub fn search_best_move(board: &Board, limits: SearchLimits) -> SearchReport {
    let start = Instant::now();
    let context = SearchContext::new(start + limits.time_budget);
    let mut root_moves = board.legal_moves();

    let mut report = SearchReport {
        best_move: root_moves.first().copied(),
        score: 0,
        depth: 0,
        nodes: 0,
        elapsed: Duration::ZERO,
    };
    if root_moves.len() <= 1 {
        report.elapsed = start.elapsed();
        return report;
    }
    order_moves(board, &mut root_moves);

    for depth in 1..=limits.max_depth.max(1) {
        let mut scored: Vec<(Move, i32)> = root_moves
            .par_iter()
            .map(|&mv| {
                let mut child = board.clone();
                let score = match child.make_move_without_validation(mv) {
                    Ok(_) => -negamax(&child, depth - 1, -INFINITY, INFINITY, 1, &context),
                    Err(_) => -INFINITY,
                };
                (mv, score)
            })
            .collect();

        if context.is_stopped() && depth > 1 {
            debug!("depth {depth} interrupted by the clock");
            break;
        }

        // Stable sort keeps the earlier ordering among equal scores.
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        let (best_move, score) = scored[0];
        report.best_move = Some(best_move);
        report.score = score;
        report.depth = depth;
        root_moves = scored.into_iter().map(|(mv, _)| mv).collect();

        debug!("depth {depth}: {best_move} scores {score}");
        if score.abs() >= MATE_THRESHOLD || Instant::now() >= context.deadline {
            break;
        }
    }

    report.nodes = context.nodes.load(Ordering::Relaxed);
    report.elapsed = start.elapsed();
    report
}

fn negamax(
    board: &Board,
    depth: u8,
    mut alpha: i32,
    beta: i32,
    ply: i32,
    context: &SearchContext,
) -> i32 {
    if context.visit() {
        return 0;
    }
    if board.is_fifty_move_draw() || board.is_threefold_repetition() {
        return 0;
    }

    let mut moves = board.legal_moves();
    if moves.is_empty() {
        return if board.is_check() {
            -MATE_SCORE + ply
        } else {
            0
        };
    }
    if depth == 0 {
        return quiescence(board, alpha, beta, 0, context);
    }

    order_moves(board, &mut moves);
    for mv in moves {
        let mut child = board.clone();
        if child.make_move_without_validation(mv).is_err() {
            continue;
        }
        let score = -negamax(&child, depth - 1, -beta, -alpha, ply + 1, context);
        if score >= beta {
            return beta;
        }
        alpha = alpha.max(score);
    }
    alpha
}

fn quiescence(board: &Board, mut alpha: i32, beta: i32, depth: u8, context: &SearchContext) -> i32 {
    if context.visit() {
        return 0;
    }

    let stand_pat = evaluate_position(board);
    if stand_pat >= beta {
        return beta;
    }
    if depth >= MAX_QUIESCENCE_DEPTH {
        return stand_pat;
    }
    alpha = alpha.max(stand_pat);

    let mut tactical: Vec<Move> = board
        .legal_moves()
        .into_iter()
        .filter(|mv| is_tactical(board, mv))
        .collect();
    order_moves(board, &mut tactical);

    for mv in tactical {
        let mut child = board.clone();
        if child.make_move_without_validation(mv).is_err() {
            continue;
        }
        let score = -quiescence(&child, -beta, -alpha, depth + 1, context);
        if score >= beta {
            return beta;
        }
        alpha = alpha.max(score);
    }
    alpha
}

fn is_tactical(board: &Board, mv: &Move) -> bool {
    mv.promotion.is_some() || capture_victim(board, mv).is_some()
}

fn capture_victim(board: &Board, mv: &Move) -> Option<PieceType> {
    if let Some(victim) = board.get_piece(mv.to) {
        return Some(victim.piece_type);
    }
    let mover = board.get_piece(mv.from)?;
    let en_passant = mover.piece_type == PieceType::Pawn
        && mv.from.file() != mv.to.file()
        && Some(mv.to) == board.en_passant();
    en_passant.then_some(PieceType::Pawn)
}

// Most valuable victim first, cheapest attacker breaking ties; promotions next.
fn order_moves(board: &Board, moves: &mut [Move]) {
    moves.sort_by_cached_key(|mv| {
        let attacker = board
            .get_piece(mv.from)
            .map_or(0, |piece| piece_value(piece.piece_type));
        let capture = capture_victim(board, mv)
            .map_or(0, |victim| 10 * piece_value(victim) - attacker / 10);
        let promotion = mv.promotion.map_or(0, piece_value);
        -(capture + promotion)
    });
}
