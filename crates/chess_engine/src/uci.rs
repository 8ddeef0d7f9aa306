//! Line protocol spoken by the search process.
//!
//! Each inbound line is parsed into a [`UciCommand`] and answered with zero
//! or more reply lines. Searches run synchronously, so `stop` has nothing to
//! interrupt and a `bestmove` always follows its `go`.

use std::time::Duration;

use chess_core::{Board, Move};
use log::{debug, trace, warn};

use crate::ai::ChessAI;
use crate::error::UciError;

const ENGINE_NAME: &str = "Chess Theater";
const ENGINE_AUTHOR: &str = "chess-theater contributors";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoOptions {
    pub movetime: Option<Duration>,
    pub depth: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    NewGame,
    Position { fen: Option<String>, moves: Vec<Move> },
    Go(GoOptions),
    Stop,
    Quit,
}

impl UciCommand {
    pub fn parse(line: &str) -> Result<Self, UciError> {
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().unwrap_or_default();
        match keyword {
            "uci" => Ok(UciCommand::Uci),
            "isready" => Ok(UciCommand::IsReady),
            "ucinewgame" => Ok(UciCommand::NewGame),
            "stop" => Ok(UciCommand::Stop),
            "quit" => Ok(UciCommand::Quit),
            "position" => parse_position(tokens.collect()),
            "go" => parse_go(tokens.collect()).map(UciCommand::Go),
            other => Err(UciError::UnknownCommand(other.to_string())),
        }
    }
}

fn parse_position(tokens: Vec<&str>) -> Result<UciCommand, UciError> {
    let moves_at = tokens.iter().position(|&token| token == "moves");
    let (setup, move_tokens) = match moves_at {
        Some(index) => (&tokens[..index], &tokens[index + 1..]),
        None => (&tokens[..], &[][..]),
    };

    let fen = match setup.split_first() {
        Some((&"startpos", _)) => None,
        Some((&"fen", fields)) if !fields.is_empty() => Some(fields.join(" ")),
        _ => return Err(UciError::MissingPosition),
    };

    let moves = move_tokens
        .iter()
        .map(|text| Move::from_uci(text).ok_or_else(|| UciError::MoveText(text.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(UciCommand::Position { fen, moves })
}

fn parse_go(tokens: Vec<&str>) -> Result<GoOptions, UciError> {
    let mut options = GoOptions::default();
    let mut tokens = tokens.into_iter();
    while let Some(name) = tokens.next() {
        match name {
            "movetime" | "depth" => {
                let value = tokens.next().unwrap_or_default();
                let invalid = || UciError::GoParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                };
                if name == "movetime" {
                    let millis: u64 = value.parse().map_err(|_| invalid())?;
                    options.movetime = Some(Duration::from_millis(millis));
                } else {
                    options.depth = Some(value.parse().map_err(|_| invalid())?);
                }
            }
            // Clock and pondering parameters are accepted and ignored.
            _ => trace!("ignoring go parameter '{name}'"),
        }
    }
    Ok(options)
}

/// What the driver loop should do after a line has been handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Reply(Vec<String>),
    Quit,
}

/// Engine-side session state: the current position and the move chooser.
pub struct UciEngine {
    ai: ChessAI,
    board: Board,
}

impl UciEngine {
    pub fn new(ai: ChessAI) -> Self {
        Self {
            ai,
            board: Board::new(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn handle(&mut self, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Reply(Vec::new());
        }

        let command = match UciCommand::parse(line) {
            Ok(command) => command,
            Err(UciError::UnknownCommand(keyword)) => {
                debug!("ignoring unknown command '{keyword}'");
                return Flow::Reply(Vec::new());
            }
            Err(err) => {
                warn!("rejected '{line}': {err}");
                return Flow::Reply(Vec::new());
            }
        };

        match command {
            UciCommand::Uci => Flow::Reply(vec![
                format!("id name {ENGINE_NAME}"),
                format!("id author {ENGINE_AUTHOR}"),
                "uciok".to_string(),
            ]),
            UciCommand::IsReady => Flow::Reply(vec!["readyok".to_string()]),
            UciCommand::NewGame => {
                self.board = Board::new();
                Flow::Reply(Vec::new())
            }
            UciCommand::Position { fen, moves } => {
                if let Err(err) = self.set_position(fen.as_deref(), &moves) {
                    warn!("keeping previous position: {err}");
                }
                Flow::Reply(Vec::new())
            }
            UciCommand::Go(options) => Flow::Reply(self.go(&options)),
            UciCommand::Stop => Flow::Reply(Vec::new()),
            UciCommand::Quit => Flow::Quit,
        }
    }

    /// Replaces the position only when the whole command replays cleanly.
    fn set_position(&mut self, fen: Option<&str>, moves: &[Move]) -> Result<(), UciError> {
        let mut board = match fen {
            Some(fen) => Board::from_fen(fen)?,
            None => Board::new(),
        };
        for &mv in moves {
            board.make_move(mv).map_err(|source| UciError::Move {
                text: mv.to_uci(),
                source,
            })?;
        }
        self.board = board;
        Ok(())
    }

    fn go(&mut self, options: &GoOptions) -> Vec<String> {
        let report = self.ai.choose_move(&self.board, options);
        let Some(best_move) = report.best_move else {
            return vec!["bestmove (none)".to_string()];
        };
        vec![
            format!(
                "info depth {} score cp {} nodes {} time {} pv {}",
                report.depth,
                report.score,
                report.nodes,
                report.elapsed.as_millis(),
                best_move
            ),
            format!("bestmove {best_move}"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::FenError;

    #[test]
    fn parses_positions() {
        assert_eq!(
            UciCommand::parse("position startpos").unwrap(),
            UciCommand::Position {
                fen: None,
                moves: Vec::new()
            }
        );

        let command =
            UciCommand::parse("position fen 4k3/8/8/8/8/8/4P3/4K3 w - - 0 1 moves e2e4").unwrap();
        assert_eq!(
            command,
            UciCommand::Position {
                fen: Some("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1".to_string()),
                moves: vec![Move::from_uci("e2e4").unwrap()],
            }
        );
    }

    #[test]
    fn rejects_broken_commands() {
        assert_eq!(
            UciCommand::parse("position moves e2e4").unwrap_err(),
            UciError::MissingPosition
        );
        assert_eq!(
            UciCommand::parse("position startpos moves e2x4").unwrap_err(),
            UciError::MoveText("e2x4".to_string())
        );
        assert!(matches!(
            UciCommand::parse("go movetime soon"),
            Err(UciError::GoParameter { .. })
        ));
        assert_eq!(
            UciCommand::parse("register later").unwrap_err(),
            UciError::UnknownCommand("register".to_string())
        );
    }

    #[test]
    fn go_options() {
        let command = UciCommand::parse("go wtime 1000 movetime 250 depth 3").unwrap();
        assert_eq!(
            command,
            UciCommand::Go(GoOptions {
                movetime: Some(Duration::from_millis(250)),
                depth: Some(3),
            })
        );
    }

    #[test]
    fn bad_move_list_keeps_the_old_position() {
        let mut engine = UciEngine::new(ChessAI::new(1));
        engine.handle("position startpos moves e2e4");
        let after_e4 = engine.board().to_fen();

        engine.handle("position startpos moves e2e5");
        assert_eq!(engine.board().to_fen(), after_e4);

        let err = engine
            .set_position(Some("8/8/8/8/8/8/8/8 w - - 0 1"), &[])
            .unwrap_err();
        assert_eq!(err, UciError::Fen(FenError::Kings));
    }

    #[test]
    fn mated_side_has_no_best_move() {
        let mut engine = UciEngine::new(ChessAI::new(2).with_book(false));
        engine.handle("position fen R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1");
        assert_eq!(
            engine.handle("go"),
            Flow::Reply(vec!["bestmove (none)".to_string()])
        );
    }
}
