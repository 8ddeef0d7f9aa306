pub mod ai;
pub mod error;
pub mod evaluation;
pub mod opening_book;
pub mod process;
pub mod search;
pub mod uci;

pub use ai::ChessAI;
pub use error::UciError;
pub use evaluation::evaluate_position;
pub use opening_book::OpeningBook;
pub use process::{spawn_engine, EngineHandle};
pub use search::{search_best_move, SearchLimits, SearchReport};
pub use uci::{Flow, GoOptions, UciCommand, UciEngine};
