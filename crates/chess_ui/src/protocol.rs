//! Client side of the line protocol spoken with the search process.

use std::time::Duration;

use chess_core::Move;
use chess_engine::EngineHandle;
use log::{debug, info, trace, warn};

/// A one-way channel to a search process: lines go out with `send`, replies
/// are collected with `try_recv`. Neither call may block.
pub trait EngineLink {
    fn send(&mut self, line: &str);
    fn try_recv(&mut self) -> Option<String>;
}

impl EngineLink for EngineHandle {
    fn send(&mut self, line: &str) {
        EngineHandle::send(self, line);
    }

    fn try_recv(&mut self) -> Option<String> {
        EngineHandle::try_recv(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Uninitialized,
    Handshaking,
    Ready,
}

/// Replies the rest of the stage cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    Ready,
    BestMove(Move),
}

pub struct EngineClient<L> {
    link: L,
    status: EngineStatus,
    acknowledged: bool,
    search_pending: bool,
    // Replies still owed by searches abandoned with `stop`.
    abandoned_searches: usize,
}

impl<L: EngineLink> EngineClient<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            status: EngineStatus::Uninitialized,
            acknowledged: false,
            search_pending: false,
            abandoned_searches: 0,
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == EngineStatus::Ready
    }

    pub fn is_searching(&self) -> bool {
        self.search_pending
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Opens the handshake. Does nothing once it has been started.
    pub fn start(&mut self) {
        if self.status != EngineStatus::Uninitialized {
            return;
        }
        self.status = EngineStatus::Handshaking;
        self.send("uci");
    }

    /// Tells the engine a new game begins and waits for it to be ready again.
    ///
    /// A search still running is stopped, and the `bestmove` it still owes is
    /// discarded whenever it arrives, before or after `readyok`.
    pub fn new_game(&mut self) {
        match self.status {
            EngineStatus::Uninitialized => self.start(),
            EngineStatus::Handshaking if !self.acknowledged => {}
            _ => {
                self.status = EngineStatus::Handshaking;
                if self.search_pending {
                    self.search_pending = false;
                    self.abandoned_searches += 1;
                    self.send("stop");
                }
                self.send("ucinewgame");
                self.send("isready");
            }
        }
    }

    /// Sends the position as the start position plus the moves played since.
    pub fn send_position(&mut self, start_fen: Option<&str>, moves: &[Move]) {
        let command = position_command(start_fen, moves);
        self.send(&command);
    }

    /// Asks for a best move. The turn loop keeps a single search in flight;
    /// a second request is still sent but logged.
    pub fn go(&mut self, movetime: Option<Duration>) {
        if self.search_pending {
            warn!("engine is already searching; sending another go");
        }
        self.search_pending = true;
        match movetime {
            Some(limit) => self.send(&format!("go movetime {}", limit.as_millis())),
            None => self.send("go"),
        }
    }

    /// Drains every reply that has arrived, in order.
    pub fn poll(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Some(line) = self.link.try_recv() {
            if let Some(event) = self.handle_line(&line) {
                events.push(event);
            }
        }
        events
    }

    pub fn handle_line(&mut self, line: &str) -> Option<EngineEvent> {
        let line = line.trim();
        match line {
            "uciok" => {
                self.acknowledged = true;
                self.send("ucinewgame");
                self.send("isready");
                None
            }
            "readyok" => {
                if self.status == EngineStatus::Handshaking && self.acknowledged {
                    info!("engine ready");
                    self.status = EngineStatus::Ready;
                    Some(EngineEvent::Ready)
                } else {
                    trace!("unsolicited readyok");
                    None
                }
            }
            _ if self.abandoned_searches > 0 && is_best_move_line(line) => {
                self.abandoned_searches -= 1;
                debug!("discarding '{line}' from an abandoned search");
                None
            }
            _ => match parse_best_move(line) {
                Some(mv) => {
                    self.search_pending = false;
                    Some(EngineEvent::BestMove(mv))
                }
                None => {
                    trace!("ignoring engine line '{line}'");
                    None
                }
            },
        }
    }

    fn send(&mut self, line: &str) {
        debug!("-> engine: {line}");
        self.link.send(line);
    }
}

/// `position startpos|fen <fen>` followed by `moves ...` when any were played.
pub fn position_command(start_fen: Option<&str>, moves: &[Move]) -> String {
    let mut command = match start_fen {
        Some(fen) => format!("position fen {fen}"),
        None => "position startpos".to_string(),
    };
    if !moves.is_empty() {
        command.push_str(" moves");
        for mv in moves {
            command.push(' ');
            command.push_str(&mv.to_uci());
        }
    }
    command
}

fn is_best_move_line(line: &str) -> bool {
    line == "bestmove" || line.starts_with("bestmove ")
}

/// Matches `bestmove <from><to><promo?>` at the start of a line. Anything
/// after the move, such as a `ponder` suggestion, is allowed.
pub fn parse_best_move(line: &str) -> Option<Move> {
    let rest = line.strip_prefix("bestmove ")?;
    let text = rest.split_whitespace().next()?;
    Move::from_uci(text)
}
