//! The turn loop between the player, the rule engine and the search process.
//!
//! ```text
//! Initializing --readyok--> AwaitingPlayerMove <--> AwaitingEngineMove
//!                                    \                 /
//!                                     +--> GameOver <-+
//! ```
//!
//! Only the state that is waiting for a move acts on one: a drop outside
//! `AwaitingPlayerMove` is refused and a `bestmove` outside
//! `AwaitingEngineMove` is dropped, so the board changes strictly in turn.
//! A search process that never answers leaves the loop waiting.

use std::time::Duration;

use bevy::math::Vec3;
use chess_core::{Board, Color, Move, MoveDetail, PieceType, Square};
use log::{debug, info};

use crate::choreographer::MoveChoreographer;
use crate::config::StageConfig;
use crate::coords::BoardAnchorGrid;
use crate::error::StageError;
use crate::protocol::{EngineClient, EngineEvent, EngineLink};
use crate::scene::{PieceId, Placements, SceneBinding};
use crate::timeline::{TimelineGroup, TimelineHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    /// The human side was checkmated.
    CheckmateLoss,
    /// The engine side was checkmated.
    CheckmateWin,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Initializing,
    AwaitingPlayerMove,
    AwaitingEngineMove,
    GameOver(GameOverReason),
}

/// Notifications for whoever presents the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    EngineReady,
    EngineThinking,
    MoveApplied { side: Color, mv: Move },
    IllegalMove { from: Square, to: Square },
    /// The given side is in check but can still move.
    Check(Color),
    GameOver(GameOverReason),
}

/// What a position means for the turn loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnVerdict {
    GameOver(GameOverReason),
    Check,
    Continue,
}

/// Classifies the position after a move; the first matching rule wins:
/// checkmate of the human, checkmate of the engine, the human in check,
/// then any draw.
pub fn evaluate_turn(board: &Board, human: Color) -> TurnVerdict {
    let to_move = board.current_turn();
    if board.is_checkmate() {
        return TurnVerdict::GameOver(if to_move == human {
            GameOverReason::CheckmateLoss
        } else {
            GameOverReason::CheckmateWin
        });
    }
    if board.is_check() && to_move == human {
        return TurnVerdict::Check;
    }
    if board.is_draw() {
        return TurnVerdict::GameOver(GameOverReason::Draw);
    }
    TurnVerdict::Continue
}

struct Drag {
    piece: PieceId,
    origin: Square,
    lift: TimelineHandle,
}

pub struct GameController<S, L> {
    board: Board,
    start: Board,
    config: StageConfig,
    choreographer: MoveChoreographer<S>,
    engine: EngineClient<L>,
    placements: Placements,
    state: ControllerState,
    events: Vec<GameEvent>,
    drag: Option<Drag>,
}

impl<S, L> GameController<S, L>
where
    S: SceneBinding + 'static,
    L: EngineLink,
{
    /// Loads the configured position onto the scene and opens the engine
    /// handshake.
    pub fn new(scene: S, link: L, config: StageConfig) -> Result<Self, StageError> {
        let start = Board::from_fen(&config.start_fen)?;
        let mut controller = Self {
            board: start.clone(),
            start,
            choreographer: MoveChoreographer::new(scene, &config),
            engine: EngineClient::new(link),
            placements: Placements::default(),
            state: ControllerState::Initializing,
            events: Vec::new(),
            drag: None,
            config,
        };
        controller.set_up_pieces()?;
        controller.choreographer.move_camera(controller.config.start_camera);
        controller.engine.start();
        Ok(controller)
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn human_side(&self) -> Color {
        self.config.human_side
    }

    pub fn scene(&self) -> &S {
        self.choreographer.scene()
    }

    pub fn grid(&self) -> &BoardAnchorGrid {
        self.choreographer.grid()
    }

    pub fn choreographer(&self) -> &MoveChoreographer<S> {
        &self.choreographer
    }

    pub fn engine(&self) -> &EngineClient<L> {
        &self.engine
    }

    /// The object standing on `square` once running animations finish.
    pub fn piece_on(&self, square: Square) -> Option<PieceId> {
        self.placements.get(square)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// One frame: handle engine replies that arrived, then animate. A failing
    /// reply does not hold up the others or the animation; the first failure
    /// is returned.
    pub fn tick(&mut self, dt: Duration) -> Result<(), StageError> {
        let mut outcome = Ok(());
        for event in self.engine.poll() {
            if let Err(err) = self.on_engine_event(event) {
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }
        self.choreographer.advance(dt);
        outcome
    }

    /// Tries a player move from `from` to `to`. A pawn reaching the last
    /// rank becomes a queen. Returns whether the move was played; a refusal
    /// sends the piece home and raises [`GameEvent::IllegalMove`].
    pub fn submit_player_move(&mut self, from: Square, to: Square) -> Result<bool, StageError> {
        if self.state != ControllerState::AwaitingPlayerMove {
            debug!("ignoring {from}{to} while {:?}", self.state);
            return Ok(false);
        }

        match self.board.apply_move(from, to, Some(PieceType::Queen)) {
            Ok(detail) => {
                self.choreograph(&detail, Duration::ZERO)?;
                self.after_move(&detail);
                Ok(true)
            }
            Err(err) => {
                info!("refused {from}{to}: {err}");
                self.events.push(GameEvent::IllegalMove { from, to });
                if let Some(piece) = self.placements.get(from) {
                    self.choreographer.return_to_origin(piece, from);
                }
                Ok(false)
            }
        }
    }

    /// Starts dragging the human piece on `square`.
    pub fn pick_up(&mut self, square: Square) -> Option<PieceId> {
        if self.state != ControllerState::AwaitingPlayerMove || self.drag.is_some() {
            return None;
        }
        let piece = self.placements.get(square)?;
        if piece.side != self.config.human_side {
            return None;
        }
        let lift = self.choreographer.lift_for_drag(piece);
        self.drag = Some(Drag {
            piece,
            origin: square,
            lift,
        });
        Some(piece)
    }

    /// Follows the pointer across the board at the dragged elevation.
    pub fn drag_to(&mut self, point: Vec3) {
        let Some(drag) = &self.drag else {
            return;
        };
        let piece = drag.piece;
        let scene = self.choreographer.scene_mut();
        let height = scene.position(piece).y;
        scene.set_position(piece, Vec3::new(point.x, height, point.z));
    }

    /// Releases the dragged piece on the nearest square and plays the move.
    pub fn drop_piece(&mut self) -> Result<bool, StageError> {
        let Some(drag) = self.drag.take() else {
            return Ok(false);
        };
        self.choreographer.cancel(drag.lift);

        let at = self.choreographer.scene().position(drag.piece);
        let target = self.choreographer.grid().position_to_square(at);
        if target == drag.origin {
            self.choreographer.return_to_origin(drag.piece, drag.origin);
            return Ok(false);
        }
        self.submit_player_move(drag.origin, target)
    }

    /// Back to the configured start: board, pieces, camera and engine.
    pub fn restart(&mut self) -> Result<(), StageError> {
        info!("restarting from {}", self.start.start_fen());
        self.drag = None;
        self.board = self.start.clone();
        self.set_up_pieces()?;
        self.choreographer.move_camera(self.config.start_camera);
        self.engine.new_game();
        self.state = ControllerState::Initializing;
        Ok(())
    }

    fn on_engine_event(&mut self, event: EngineEvent) -> Result<(), StageError> {
        match event {
            EngineEvent::Ready => {
                if self.state != ControllerState::Initializing {
                    return Ok(());
                }
                self.events.push(GameEvent::EngineReady);
                self.begin_turn();
            }
            EngineEvent::BestMove(mv) => {
                if self.state != ControllerState::AwaitingEngineMove {
                    debug!("dropping bestmove {mv} while {:?}", self.state);
                    return Ok(());
                }
                let detail = self
                    .board
                    .make_move(mv)
                    .map_err(|source| StageError::EngineMove { mv, source })?;
                self.choreograph(&detail, self.config.engine_capture_delay)?;
                self.after_move(&detail);
            }
        }
        Ok(())
    }

    fn after_move(&mut self, detail: &MoveDetail) {
        self.events.push(GameEvent::MoveApplied {
            side: detail.piece.color,
            mv: detail.as_move(),
        });
        self.begin_turn();
    }

    fn begin_turn(&mut self) {
        match evaluate_turn(&self.board, self.config.human_side) {
            TurnVerdict::GameOver(reason) => {
                info!("game over: {reason:?}");
                self.state = ControllerState::GameOver(reason);
                self.events.push(GameEvent::GameOver(reason));
            }
            TurnVerdict::Check => {
                self.events.push(GameEvent::Check(self.config.human_side));
                self.hand_over();
            }
            TurnVerdict::Continue => self.hand_over(),
        }
    }

    fn hand_over(&mut self) {
        if self.board.current_turn() == self.config.human_side {
            self.state = ControllerState::AwaitingPlayerMove;
            return;
        }

        self.state = ControllerState::AwaitingEngineMove;
        let start_fen =
            (!self.board.starts_from_standard_position()).then(|| self.board.start_fen());
        self.engine.send_position(start_fen, self.board.history());
        self.engine.go(self.config.movetime);
        self.events.push(GameEvent::EngineThinking);
    }

    // Schedules the visuals for an applied move and updates who stands where.
    fn choreograph(&mut self, detail: &MoveDetail, capture_delay: Duration) -> Result<(), StageError> {
        let mover = self.placements.require(detail.from)?;

        if let Some(square) = detail.captured_square {
            let victim = self.placements.require(square)?;
            self.choreographer.animate_capture(victim, capture_delay);
            self.placements.take(square);
        }

        self.choreographer.animate_move(mover, detail.from, detail.to);
        if let Some(side) = detail.castle {
            self.choreographer
                .animate_castle(detail.as_move(), mover, &self.placements)?;
            let (rook_from, rook_to) = side.rook_squares(detail.piece.color);
            self.placements.relocate(rook_from, rook_to);
        }
        self.placements.relocate(detail.from, detail.to);
        Ok(())
    }

    // Objects already on their home square stay there; the rest take the
    // first free object of the right kind. A promoted piece borrows a spare
    // pawn of its side. Leftover objects are hidden.
    fn set_up_pieces(&mut self) -> Result<(), StageError> {
        self.choreographer.cancel_group(TimelineGroup::Piece);
        self.placements.clear();

        let mut unused: Vec<PieceId> = PieceId::all().collect();
        let mut pending = Vec::new();
        for (square, piece) in self.board.pieces() {
            let at_home = unused.iter().position(|id| {
                id.home_square() == square
                    && id.side == piece.color
                    && id.piece_type() == piece.piece_type
            });
            match at_home {
                Some(index) => self.placements.place(square, unused.remove(index)),
                None => pending.push((square, piece)),
            }
        }

        for (square, piece) in pending {
            let index = unused
                .iter()
                .position(|id| id.side == piece.color && id.piece_type() == piece.piece_type)
                .or_else(|| {
                    unused
                        .iter()
                        .position(|id| id.side == piece.color && id.piece_type() == PieceType::Pawn)
                })
                .ok_or(StageError::NotEnoughInstances {
                    color: piece.color,
                    piece_type: piece.piece_type,
                })?;
            self.placements.place(square, unused.remove(index));
        }

        let placed: Vec<(Square, PieceId)> = self.placements.iter().collect();
        for (square, piece) in placed {
            self.choreographer.place(piece, square);
        }
        for piece in unused {
            self.choreographer.hide(piece);
        }
        Ok(())
    }
}
