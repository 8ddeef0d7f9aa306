use chess_core::{FenError, MoveError};
use thiserror::Error;

/// Problems with a command received on the engine's input channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UciError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("position command needs 'startpos' or 'fen'")]
    MissingPosition,

    #[error("invalid position: {0}")]
    Fen(#[from] FenError),

    #[error("unreadable move '{0}'")]
    MoveText(String),

    #[error("move {text} cannot be played: {source}")]
    Move {
        text: String,
        #[source]
        source: MoveError,
    },

    #[error("invalid value '{value}' for go parameter '{name}'")]
    GoParameter { name: String, value: String },
}
