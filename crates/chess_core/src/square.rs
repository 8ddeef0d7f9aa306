use std::fmt;

/// A board cell: file 0-7 (a-h) and rank 0-7 (1-8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    pub const fn new(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && rank < 8 {
            Some(Self { file, rank })
        } else {
            None
        }
    }

    /// Builds a square from coordinates already known to be on the board.
    pub(crate) const fn at(file: u8, rank: u8) -> Self {
        Self {
            file: file & 7,
            rank: rank & 7,
        }
    }

    /// Inverse of [`Square::index`]; wraps values above 63.
    pub const fn from_index(index: usize) -> Self {
        Self::at((index % 8) as u8, (index / 8 % 8) as u8)
    }

    pub const fn file(self) -> u8 {
        self.file
    }

    pub const fn rank(self) -> u8 {
        self.rank
    }

    /// Rank-major index: a1 = 0, h1 = 7, a8 = 56.
    pub const fn index(self) -> usize {
        self.rank as usize * 8 + self.file as usize
    }

    pub fn offset(self, file_step: i8, rank_step: i8) -> Option<Self> {
        let file = self.file as i8 + file_step;
        let rank = self.rank as i8 + rank_step;
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            Some(Self::at(file as u8, rank as u8))
        } else {
            None
        }
    }

    pub fn from_algebraic(notation: &str) -> Option<Self> {
        let mut chars = notation.chars();
        let file = chars.next()?;
        let rank = chars.next()?;
        if chars.next().is_some() {
            return None;
        }

        if !('a'..='h').contains(&file) || !('1'..='8').contains(&rank) {
            return None;
        }

        Some(Self::at(file as u8 - b'a', rank as u8 - b'1'))
    }

    /// All 64 squares, rank by rank starting at a1.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64).map(Square::from_index)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, self.rank + 1)
    }
}
