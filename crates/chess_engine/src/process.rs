use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, info, warn};

use crate::ai::ChessAI;
use crate::uci::{Flow, UciEngine};

/// Owning end of a search process running on its own thread.
///
/// Commands go in as text lines and replies come back the same way; nothing
/// here waits unless the caller asks it to. Dropping the handle asks the
/// engine to quit.
pub struct EngineHandle {
    commands: Sender<String>,
    replies: Receiver<String>,
    thread: Option<JoinHandle<()>>,
}

pub fn spawn_engine(ai: ChessAI) -> io::Result<EngineHandle> {
    let (command_tx, command_rx) = unbounded::<String>();
    let (reply_tx, reply_rx) = unbounded::<String>();

    let thread = thread::Builder::new()
        .name("chess-engine".to_string())
        .spawn(move || run_engine(UciEngine::new(ai), command_rx, reply_tx))?;

    Ok(EngineHandle {
        commands: command_tx,
        replies: reply_rx,
        thread: Some(thread),
    })
}

fn run_engine(mut engine: UciEngine, commands: Receiver<String>, replies: Sender<String>) {
    info!("engine thread started");
    for line in commands.iter() {
        debug!("engine <- {line}");
        match engine.handle(&line) {
            Flow::Reply(lines) => {
                for reply in lines {
                    debug!("engine -> {reply}");
                    if replies.send(reply).is_err() {
                        warn!("reply channel closed, stopping engine");
                        return;
                    }
                }
            }
            Flow::Quit => break,
        }
    }
    info!("engine thread stopped");
}

impl EngineHandle {
    /// Queues a command line. Sending to an engine that has stopped is logged
    /// and otherwise ignored.
    pub fn send(&self, line: &str) {
        if self.commands.send(line.to_string()).is_err() {
            warn!("engine is gone, dropped command '{line}'");
        }
    }

    pub fn try_recv(&self) -> Option<String> {
        match self.replies.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for the next reply line.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<String> {
        match self.replies.recv_timeout(timeout) {
            Ok(line) => Some(line),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Asks the engine to quit and waits for its thread to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // The engine may already have quit on its own.
        let _ = self.commands.send("quit".to_string());
        if thread.join().is_err() {
            warn!("engine thread panicked");
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
