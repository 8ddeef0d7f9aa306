use std::collections::HashMap;

use chess_core::{Board, Move};
use log::warn;
use once_cell::sync::Lazy;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

static SHARED_BOOK: Lazy<OpeningBook> = Lazy::new(OpeningBook::new);

// Main lines from the standard start, with how often each should be chosen.
const LINES: &[(&str, u32)] = &[
    ("e2e4 e7e5 g1f3 b8c6 f1b5 a7a6", 100), // Ruy Lopez
    ("e2e4 e7e5 g1f3 b8c6 f1c4 f8c5", 80),  // Italian Game
    ("e2e4 c7c5 g1f3 d7d6 d2d4 c5d4", 90),  // Open Sicilian
    ("e2e4 e7e6 d2d4 d7d5 b1c3", 60),       // French Defence
    ("e2e4 c7c6 d2d4 d7d5 b1c3", 50),       // Caro-Kann
    ("d2d4 d7d5 c2c4 e7e6 b1c3 g8f6", 90),  // Queen's Gambit Declined
    ("d2d4 d7d5 c2c4 c7c6 g1f3", 60),       // Slav
    ("d2d4 g8f6 c2c4 e7e6 g1f3 b7b6", 70),  // Queen's Indian
    ("d2d4 g8f6 c2c4 g7g6 b1c3 f8g7", 60),  // King's Indian
    ("c2c4 e7e5 b1c3 g8f6", 40),            // English
    ("g1f3 d7d5 g2g3 g8f6", 30),            // Reti
];

#[derive(Clone)]
struct BookMove {
    mv: Move,
    weight: u32, // Higher weight means more likely to be played
}

/// Weighted replies for well-known positions, keyed by position hash.
#[derive(Clone)]
pub struct OpeningBook {
    positions: HashMap<u64, Vec<BookMove>>,
}

impl Default for OpeningBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OpeningBook {
    pub fn new() -> Self {
        let mut book = Self {
            positions: HashMap::new(),
        };
        for &(line, weight) in LINES {
            book.add_line(line, weight);
        }
        book
    }

    /// The process-wide book, built on first use.
    pub fn shared() -> &'static OpeningBook {
        &SHARED_BOOK
    }

    fn add_line(&mut self, line: &str, weight: u32) {
        let mut board = Board::new();
        for text in line.split_whitespace() {
            let Some(mv) = Move::from_uci(text) else {
                warn!("opening line '{line}' has unreadable move '{text}'");
                return;
            };
            let key = board.position_key();
            if let Err(err) = board.make_move(mv) {
                warn!("opening line '{line}' stops at {text}: {err}");
                return;
            }

            let entries = self.positions.entry(key).or_default();
            match entries.iter_mut().find(|entry| entry.mv == mv) {
                Some(entry) => entry.weight += weight,
                None => entries.push(BookMove { mv, weight }),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Picks a book reply for the position, weighted by popularity.
    pub fn probe<R: Rng + ?Sized>(&self, board: &Board, rng: &mut R) -> Option<Move> {
        let entries = self.positions.get(&board.position_key())?;
        let weights = WeightedIndex::new(entries.iter().map(|entry| entry.weight)).ok()?;
        let mv = entries[weights.sample(rng)].mv;
        board.legal_moves().contains(&mv).then_some(mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn answers_the_starting_position() {
        let book = OpeningBook::new();
        let mut rng = StdRng::seed_from_u64(7);
        let first = book.probe(&Board::new(), &mut rng).unwrap();
        assert!(["e2e4", "d2d4", "c2c4", "g1f3"].contains(&first.to_uci().as_str()));
    }

    #[test]
    fn follows_a_line() {
        let book = OpeningBook::shared();
        let mut board = Board::new();
        board.make_move(Move::from_uci("e2e4").unwrap()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let reply = book.probe(&board, &mut rng).unwrap();
        assert!(["e7e5", "c7c5", "e7e6", "c7c6"].contains(&reply.to_uci().as_str()));
    }

    #[test]
    fn unknown_positions_have_no_entry() {
        let board = Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(OpeningBook::shared().probe(&board, &mut rng).is_none());
        assert!(!OpeningBook::shared().is_empty());
    }
}
