use std::time::Duration;

use chess_core::Board;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::opening_book::OpeningBook;
use crate::search::{search_best_move, SearchLimits, SearchReport};
use crate::uci::GoOptions;

const MAX_THINK_TIME: Duration = Duration::from_secs(3);
const MIN_THINK_TIME: Duration = Duration::from_millis(50);
const MIN_DEPTH: u8 = 1;
const MAX_DEPTH: u8 = 6;

/// Move selection: opening book first, then a timed search.
#[derive(Clone)]
pub struct ChessAI {
    max_depth: u8,
    max_time: Duration,
    use_book: bool,
    rng: StdRng,
}

impl ChessAI {
    pub fn new(depth: u8) -> Self {
        ChessAI {
            max_depth: depth.clamp(MIN_DEPTH, MAX_DEPTH),
            max_time: MAX_THINK_TIME,
            use_book: true,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_book(mut self, use_book: bool) -> Self {
        self.use_book = use_book;
        self
    }

    /// Makes book choices reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn set_max_time(&mut self, duration: Duration) {
        self.max_time = duration.clamp(MIN_THINK_TIME, MAX_THINK_TIME);
    }

    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    pub fn max_time(&self) -> Duration {
        self.max_time
    }

    /// Picks a move for the side to move. `best_move` is `None` only when
    /// the position has no legal move.
    pub fn choose_move(&mut self, board: &Board, options: &GoOptions) -> SearchReport {
        if self.use_book {
            if let Some(book_move) = OpeningBook::shared().probe(board, &mut self.rng) {
                debug!("book move {book_move}");
                return SearchReport {
                    best_move: Some(book_move),
                    score: 0,
                    depth: 0,
                    nodes: 0,
                    elapsed: Duration::ZERO,
                };
            }
        }

        let limits = SearchLimits {
            max_depth: options
                .depth
                .map_or(self.max_depth, |depth| depth.clamp(MIN_DEPTH, MAX_DEPTH)),
            time_budget: options.movetime.unwrap_or(self.max_time),
        };
        let mut report = search_best_move(board, limits);
        if report.best_move.is_none() {
            report.best_move = board.legal_moves().first().copied();
        }

        info!(
            "searched {} nodes to depth {} in {:?}",
            report.nodes, report.depth, report.elapsed
        );
        report
    }
}

impl Default for ChessAI {
    fn default() -> Self {
        ChessAI::new(MIN_DEPTH + 3)
    }
}
