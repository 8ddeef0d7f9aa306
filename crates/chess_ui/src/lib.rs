pub mod choreographer;
pub mod config;
pub mod controller;
pub mod coords;
pub mod error;
pub mod plugin;
pub mod protocol;
pub mod scene;
pub mod timeline;

pub use choreographer::MoveChoreographer;
pub use config::{CameraPose, StageConfig};
pub use controller::{
    evaluate_turn, ControllerState, GameController, GameEvent, GameOverReason, TurnVerdict,
};
pub use coords::BoardAnchorGrid;
pub use error::StageError;
pub use plugin::{ChessUiPlugin, StageSettings};
pub use protocol::{EngineClient, EngineEvent, EngineLink, EngineStatus};
pub use scene::{PieceId, PieceRegistry, PieceSlot, Placements, SceneBinding};
pub use timeline::{Easing, Timeline, TimelineGroup, TimelineHandle, TimelineScheduler};
