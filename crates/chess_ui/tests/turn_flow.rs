use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use bevy::math::Vec3;
use chess_core::{Color, Move, Piece, PieceType, Square, STARTING_FEN};
use chess_ui::{
    CameraPose, ControllerState, EngineLink, GameController, GameEvent, PieceId, PieceRegistry,
    PieceSlot, SceneBinding, StageConfig, StageError, TimelineGroup,
};

#[derive(Clone, Default)]
struct Recorder {
    sent: Rc<RefCell<Vec<String>>>,
    inbox: Rc<RefCell<VecDeque<String>>>,
}

impl Recorder {
    fn reply(&self, line: &str) {
        self.inbox.borrow_mut().push_back(line.to_string());
    }

    fn sent(&self) -> Vec<String> {
        self.sent.borrow().clone()
    }

    fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }
}

impl EngineLink for Recorder {
    fn send(&mut self, line: &str) {
        self.sent.borrow_mut().push(line.to_string());
    }

    fn try_recv(&mut self) -> Option<String> {
        self.inbox.borrow_mut().pop_front()
    }
}

type Controller = GameController<PieceRegistry, Recorder>;

fn sq(name: &str) -> Square {
    Square::from_algebraic(name).unwrap()
}

fn start(fen: &str) -> (Controller, Recorder) {
    start_as(fen, Color::White)
}

fn start_as(fen: &str, human_side: Color) -> (Controller, Recorder) {
    let config = StageConfig {
        start_fen: fen.to_string(),
        human_side,
        seed: Some(11),
        ..StageConfig::default()
    };
    let scene = PieceRegistry::standard_set(
        Vec3::new(-3.5, 0.0, 3.5),
        Vec3::new(3.5, 0.0, -3.5),
        CameraPose::new(Vec3::new(0.0, 20.0, 0.0), Vec3::ZERO),
    );
    let link = Recorder::default();
    let controller = GameController::new(scene, link.clone(), config).unwrap();
    (controller, link)
}

fn ready(fen: &str) -> (Controller, Recorder) {
    ready_as(fen, Color::White)
}

fn ready_as(fen: &str, human_side: Color) -> (Controller, Recorder) {
    let (mut controller, link) = start_as(fen, human_side);
    link.reply("uciok");
    link.reply("readyok");
    controller.tick(Duration::ZERO).unwrap();
    (controller, link)
}

fn settle(controller: &mut Controller) {
    for _ in 0..40 {
        controller.tick(Duration::from_millis(100)).unwrap();
    }
}

fn uci(text: &str) -> Move {
    Move::from_uci(text).unwrap()
}

// Visible pieces whose scene position resolves to `square`.
fn visible_on(controller: &Controller, square: Square) -> Vec<PieceId> {
    let scene = controller.scene();
    scene
        .visible_pieces()
        .filter(|&id| controller.grid().position_to_square(scene.position(id)) == square)
        .collect()
}

fn capture_delay(controller: &Controller) -> Option<Duration> {
    controller
        .choreographer()
        .scheduler()
        .iter_group(TimelineGroup::Piece)
        .find(|(_, timeline)| timeline.label() == "capture")
        .map(|(_, timeline)| timeline.start_delay())
}

#[test]
fn handshake_hands_the_first_move_to_the_player() {
    let (mut controller, link) = start(STARTING_FEN);
    assert_eq!(link.sent(), vec!["uci"]);
    assert_eq!(controller.state(), ControllerState::Initializing);

    link.reply("id name Test");
    link.reply("uciok");
    controller.tick(Duration::ZERO).unwrap();
    assert_eq!(link.sent(), vec!["uci", "ucinewgame", "isready"]);
    assert_eq!(controller.state(), ControllerState::Initializing);

    link.reply("readyok");
    controller.tick(Duration::ZERO).unwrap();
    assert_eq!(controller.state(), ControllerState::AwaitingPlayerMove);
    assert_eq!(controller.drain_events(), vec![GameEvent::EngineReady]);
}

#[test]
fn player_move_asks_the_engine_to_reply() {
    let (mut controller, link) = ready(STARTING_FEN);
    link.take_sent();
    controller.drain_events();

    assert!(controller.submit_player_move(sq("e2"), sq("e4")).unwrap());
    assert_eq!(
        link.sent(),
        vec!["position startpos moves e2e4", "go movetime 800"]
    );
    assert_eq!(controller.state(), ControllerState::AwaitingEngineMove);
    assert_eq!(
        controller.drain_events(),
        vec![
            GameEvent::MoveApplied {
                side: Color::White,
                mv: Move::from_uci("e2e4").unwrap(),
            },
            GameEvent::EngineThinking,
        ]
    );

    // Not the player's turn any more.
    assert!(!controller.submit_player_move(sq("d2"), sq("d4")).unwrap());
}

#[test]
fn illegal_move_leaves_everything_untouched() {
    let (mut controller, link) = ready(STARTING_FEN);
    link.take_sent();
    controller.drain_events();

    let before = controller.board().to_fen();
    assert!(!controller.submit_player_move(sq("e2"), sq("e5")).unwrap());
    assert_eq!(controller.board().to_fen(), before);
    assert!(link.sent().is_empty());
    assert_eq!(controller.state(), ControllerState::AwaitingPlayerMove);
    assert_eq!(
        controller.drain_events(),
        vec![GameEvent::IllegalMove {
            from: sq("e2"),
            to: sq("e5"),
        }]
    );

    settle(&mut controller);
    let pawn = controller.piece_on(sq("e2")).unwrap();
    let at = controller.scene().position(pawn);
    assert_eq!(controller.grid().position_to_square(at), sq("e2"));
}

#[test]
fn engine_reply_is_played_and_animated() {
    let (mut controller, link) = ready(STARTING_FEN);
    controller.submit_player_move(sq("e2"), sq("e4")).unwrap();

    link.reply("info depth 4 score cp 10");
    link.reply("bestmove e7e5");
    controller.tick(Duration::ZERO).unwrap();

    assert_eq!(controller.state(), ControllerState::AwaitingPlayerMove);
    let pawn = controller.piece_on(sq("e5")).unwrap();
    assert_eq!(pawn, PieceId::new(Color::Black, PieceSlot::Pawn(5)));
    assert_eq!(controller.piece_on(sq("e7")), None);

    settle(&mut controller);
    assert!(controller.choreographer().is_idle());
    let at = controller.scene().position(pawn);
    assert_eq!(controller.grid().position_to_square(at), sq("e5"));
}

#[test]
fn engine_capture_waits_for_the_mover() {
    let fen = "4k3/8/8/3p4/4P3/8/8/4K3 b - - 0 1";
    let (mut controller, link) = ready(fen);
    assert_eq!(controller.state(), ControllerState::AwaitingEngineMove);
    assert_eq!(
        link.take_sent()[3..].to_vec(),
        vec![format!("position fen {fen}"), "go movetime 800".to_string()]
    );

    let victim = controller.piece_on(sq("e4")).unwrap();
    link.reply("bestmove d5e4");
    controller.tick(Duration::ZERO).unwrap();

    assert_eq!(capture_delay(&controller), Some(Duration::from_millis(400)));
    assert_eq!(controller.state(), ControllerState::AwaitingPlayerMove);
    assert_ne!(controller.piece_on(sq("e4")), Some(victim));

    settle(&mut controller);
    assert!(!controller.scene().is_visible(victim));
}

#[test]
fn player_capture_starts_at_once() {
    let fen = "4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1";
    let (mut controller, link) = ready(fen);
    link.take_sent();

    assert!(controller.submit_player_move(sq("e4"), sq("d5")).unwrap());
    assert_eq!(capture_delay(&controller), Some(Duration::ZERO));
    assert_eq!(
        link.sent(),
        vec![format!("position fen {fen} moves e4d5"), "go movetime 800".to_string()]
    );
}

#[test]
fn dragging_a_piece_plays_the_move() {
    let (mut controller, _link) = ready(STARTING_FEN);

    assert_eq!(controller.pick_up(sq("e7")), None);
    let knight = controller.pick_up(sq("g1")).unwrap();
    assert!(controller.is_dragging());

    settle_drag(&mut controller);
    let target = controller.grid().square_to_position(sq("f3"));
    controller.drag_to(target + Vec3::new(0.2, 0.0, -0.1));
    assert!(controller.drop_piece().unwrap());
    assert!(!controller.is_dragging());
    assert_eq!(controller.piece_on(sq("f3")), Some(knight));
    assert_eq!(controller.state(), ControllerState::AwaitingEngineMove);
}

// A few frames of the drag lift without handing control to the engine.
fn settle_drag(controller: &mut Controller) {
    for _ in 0..3 {
        controller.tick(Duration::from_millis(50)).unwrap();
    }
}

#[test]
fn dropping_on_the_origin_is_not_a_move() {
    let (mut controller, link) = ready(STARTING_FEN);
    link.take_sent();
    controller.drain_events();

    controller.pick_up(sq("d2")).unwrap();
    assert!(!controller.drop_piece().unwrap());
    assert!(controller.drain_events().is_empty());
    assert!(link.sent().is_empty());
    assert_eq!(controller.state(), ControllerState::AwaitingPlayerMove);
}

#[test]
fn restart_ignores_a_stale_reply() {
    let (mut controller, link) = ready(STARTING_FEN);
    controller.submit_player_move(sq("e2"), sq("e4")).unwrap();
    link.take_sent();

    controller.restart().unwrap();
    assert_eq!(controller.state(), ControllerState::Initializing);
    assert_eq!(link.take_sent(), vec!["stop", "ucinewgame", "isready"]);
    assert_eq!(controller.board().to_fen(), STARTING_FEN);
    assert_eq!(
        controller.piece_on(sq("e2")),
        Some(PieceId::new(Color::White, PieceSlot::Pawn(5)))
    );

    link.reply("bestmove e7e5");
    link.reply("readyok");
    controller.tick(Duration::ZERO).unwrap();
    assert_eq!(controller.state(), ControllerState::AwaitingPlayerMove);
    assert_eq!(controller.board().to_fen(), STARTING_FEN);
}

#[test]
fn restart_discards_a_reply_arriving_after_readyok() {
    let (mut controller, link) = ready_as(STARTING_FEN, Color::Black);
    assert_eq!(controller.state(), ControllerState::AwaitingEngineMove);
    link.reply("bestmove e2e4");
    controller.tick(Duration::ZERO).unwrap();
    assert!(controller.submit_player_move(sq("e7"), sq("e5")).unwrap());
    assert!(controller.engine().is_searching());

    controller.restart().unwrap();
    link.take_sent();
    link.reply("readyok");
    controller.tick(Duration::ZERO).unwrap();
    assert_eq!(controller.state(), ControllerState::AwaitingEngineMove);
    assert_eq!(
        link.take_sent(),
        vec!["position startpos", "go movetime 800"]
    );

    // The search abandoned by the restart answers late.
    link.reply("bestmove g1f3");
    controller.tick(Duration::ZERO).unwrap();
    assert_eq!(controller.state(), ControllerState::AwaitingEngineMove);
    assert!(controller.board().history().is_empty());
    assert!(controller.engine().is_searching());

    link.reply("bestmove d2d4");
    controller.tick(Duration::ZERO).unwrap();
    assert_eq!(controller.board().history(), &[uci("d2d4")]);
    assert_eq!(controller.state(), ControllerState::AwaitingPlayerMove);
}

#[test]
fn engine_castling_moves_the_rook_too() {
    let (mut controller, link) = ready("r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1");
    controller.drain_events();
    let king = PieceId::new(Color::Black, PieceSlot::King);
    let rook = PieceId::new(Color::Black, PieceSlot::Rook(2));

    link.reply("bestmove e8g8");
    controller.tick(Duration::ZERO).unwrap();
    assert_eq!(
        controller.drain_events(),
        vec![GameEvent::MoveApplied {
            side: Color::Black,
            mv: uci("e8g8"),
        }]
    );
    assert_eq!(controller.piece_on(sq("g8")), Some(king));
    assert_eq!(controller.piece_on(sq("f8")), Some(rook));
    assert_eq!(controller.piece_on(sq("e8")), None);
    assert_eq!(controller.piece_on(sq("h8")), None);

    settle(&mut controller);
    assert_eq!(visible_on(&controller, sq("g8")), vec![king]);
    assert_eq!(visible_on(&controller, sq("f8")), vec![rook]);
    assert!(visible_on(&controller, sq("e8")).is_empty());
    assert!(visible_on(&controller, sq("h8")).is_empty());
}

#[test]
fn en_passant_removes_the_pawn_beside_the_target() {
    let (mut controller, link) = ready("4k3/3p4/8/4P3/8/8/8/4K3 b - - 0 1");
    let victim = PieceId::new(Color::Black, PieceSlot::Pawn(4));
    assert_eq!(controller.piece_on(sq("d7")), Some(victim));
    link.reply("bestmove d7d5");
    controller.tick(Duration::ZERO).unwrap();
    settle(&mut controller);
    controller.drain_events();

    let capturer = controller.piece_on(sq("e5")).unwrap();
    assert!(controller.submit_player_move(sq("e5"), sq("d6")).unwrap());
    assert_eq!(capture_delay(&controller), Some(Duration::ZERO));
    assert_eq!(controller.piece_on(sq("d6")), Some(capturer));
    assert_eq!(controller.piece_on(sq("d5")), None);
    assert_eq!(
        controller.drain_events(),
        vec![
            GameEvent::MoveApplied {
                side: Color::White,
                mv: uci("e5d6"),
            },
            GameEvent::EngineThinking,
        ]
    );

    settle(&mut controller);
    assert!(!controller.scene().is_visible(victim));
    assert_eq!(visible_on(&controller, sq("d6")), vec![capturer]);
    assert!(visible_on(&controller, sq("d5")).is_empty());
}

#[test]
fn promoted_pawn_keeps_its_object() {
    let (mut controller, _link) = ready("4k3/P7/8/8/8/8/8/4K3 w - - 0 1");
    controller.drain_events();
    let pawn = controller.piece_on(sq("a7")).unwrap();
    assert!(matches!(pawn.slot, PieceSlot::Pawn(_)));

    assert!(controller.submit_player_move(sq("a7"), sq("a8")).unwrap());
    assert_eq!(
        controller.board().get_piece(sq("a8")),
        Some(Piece::new(PieceType::Queen, Color::White))
    );
    assert_eq!(controller.piece_on(sq("a8")), Some(pawn));
    assert_eq!(
        controller.drain_events()[0],
        GameEvent::MoveApplied {
            side: Color::White,
            mv: uci("a7a8q"),
        }
    );

    settle(&mut controller);
    assert_eq!(visible_on(&controller, sq("a8")), vec![pawn]);
    assert!(visible_on(&controller, sq("a7")).is_empty());
}

#[test]
fn check_is_announced_without_leaving_the_turn() {
    let (mut controller, link) = ready("3qk3/8/8/8/8/8/8/K7 b - - 0 1");
    controller.drain_events();
    let queen = PieceId::new(Color::Black, PieceSlot::Queen);

    link.reply("bestmove d8d1");
    controller.tick(Duration::ZERO).unwrap();
    assert_eq!(
        controller.drain_events(),
        vec![
            GameEvent::MoveApplied {
                side: Color::Black,
                mv: uci("d8d1"),
            },
            GameEvent::Check(Color::White),
        ]
    );
    assert_eq!(controller.state(), ControllerState::AwaitingPlayerMove);
    assert_eq!(controller.piece_on(sq("d1")), Some(queen));

    settle(&mut controller);
    assert_eq!(visible_on(&controller, sq("d1")), vec![queen]);
    assert!(controller.submit_player_move(sq("a1"), sq("a2")).unwrap());
}

#[test]
fn rejected_engine_reply_does_not_stall_the_frame() {
    let (mut controller, link) = ready(STARTING_FEN);
    controller.submit_player_move(sq("e2"), sq("e4")).unwrap();
    let pawn = controller.piece_on(sq("e4")).unwrap();

    link.reply("bestmove e7e4");
    link.reply("bestmove e7e5");
    let result = controller.tick(Duration::from_millis(100));
    assert!(matches!(result, Err(StageError::EngineMove { .. })));

    // The later reply was still played and the pieces still moved.
    assert_eq!(controller.board().history(), &[uci("e2e4"), uci("e7e5")]);
    assert_eq!(controller.state(), ControllerState::AwaitingPlayerMove);
    assert!(controller.scene().position(pawn).y > controller.grid().elevation());
}
