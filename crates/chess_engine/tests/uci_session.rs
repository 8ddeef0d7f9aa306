use std::time::Duration;

use chess_core::{Board, Move};
use chess_engine::{spawn_engine, ChessAI, EngineHandle};

const WAIT: Duration = Duration::from_secs(20);

fn read_until(engine: &EngineHandle, prefix: &str) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(line) = engine.recv_timeout(WAIT) {
        let done = line.starts_with(prefix);
        lines.push(line);
        if done {
            return lines;
        }
    }
    panic!("engine never answered with '{prefix}', got {lines:?}");
}

#[test]
fn handshake_then_ready() {
    let engine = spawn_engine(ChessAI::new(1)).unwrap();
    engine.send("uci");
    let lines = read_until(&engine, "uciok");
    assert!(lines[0].starts_with("id name"));
    assert_eq!(lines.last().map(String::as_str), Some("uciok"));

    engine.send("ucinewgame");
    engine.send("isready");
    assert_eq!(read_until(&engine, "readyok"), vec!["readyok".to_string()]);
    engine.shutdown();
}

#[test]
fn answers_with_a_legal_move() {
    let engine = spawn_engine(ChessAI::new(2).with_book(false)).unwrap();
    engine.send("position startpos moves e2e4 e7e5 g1f3");
    engine.send("go movetime 500");

    let lines = read_until(&engine, "bestmove");
    assert!(lines.iter().any(|line| line.starts_with("info depth")));
    let reply = lines.last().unwrap().trim_start_matches("bestmove ").to_string();
    let mv = Move::from_uci(&reply).unwrap();

    let mut board = Board::new();
    for text in ["e2e4", "e7e5", "g1f3"] {
        board.make_move(Move::from_uci(text).unwrap()).unwrap();
    }
    assert!(board.legal_moves().contains(&mv));
}

#[test]
fn noise_is_ignored() {
    let engine = spawn_engine(ChessAI::new(1)).unwrap();
    engine.send("");
    engine.send("setoption name Hash value 32");
    engine.send("position fen not-a-board");
    engine.send("isready");
    assert_eq!(read_until(&engine, "readyok"), vec!["readyok".to_string()]);
    assert_eq!(engine.try_recv(), None);
}

#[test]
fn quit_stops_the_thread() {
    let engine = spawn_engine(ChessAI::new(1)).unwrap();
    engine.send("quit");
    assert_eq!(engine.recv_timeout(WAIT), None);
    engine.send("isready");
    engine.shutdown();
}
