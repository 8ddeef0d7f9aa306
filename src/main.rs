use bevy::prelude::*;
use chess_core::Board;
use chess_ui::{ChessUiPlugin, StageConfig, StageSettings};

fn main() {
    let mut config = StageConfig::default();
    if let Some(fen) = std::env::args().nth(1) {
        if let Err(err) = Board::from_fen(&fen) {
            eprintln!("invalid start position '{fen}': {err}");
            std::process::exit(2);
        }
        config.start_fen = fen;
    }

    App::new()
        .insert_resource(StageSettings(config))
        .add_plugins(ChessUiPlugin)
        .run();
}
