//! A thread that owns its holds on a shared lock and runs commands on request.
//!
//! The OS ties every hold to the acquiring thread, so multi-thread scenarios are driven by
//! sending commands to long-lived worker threads and waiting for their replies.

#![allow(dead_code)]

use posix_rwlock::{Operation, RwLock};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub const PROMPT: Duration = Duration::from_secs(5);
pub const SETTLE: Duration = Duration::from_millis(100);

/// The result of one command: the lock outcome, or the raw OS error code
pub type Reply = Result<bool, Option<i32>>;

pub enum Command {
    Op(Operation, bool),
    Quit,
}

pub struct LockThread {
    name: String,
    commands: Sender<Command>,
    replies: Receiver<Reply>,
    handle: Option<JoinHandle<()>>,
}

impl LockThread {
    pub fn spawn(name: &str, lock: &Arc<RwLock>) -> Self {
        let (commands, command_rx) = channel::<Command>();
        let (reply_tx, replies) = channel();
        let lock = lock.clone();

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(Command::Op(operation, blocking)) = command_rx.recv() {
                    let reply = lock
                        .operate(operation, blocking)
                        .map_err(|err| err.raw_os_error());
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
            })
            .unwrap();

        Self {
            name: name.to_string(),
            commands,
            replies,
            handle: Some(handle),
        }
    }

    /// Sends a command without waiting for it to finish
    pub fn send(&self, operation: Operation, blocking: bool) {
        self.commands
            .send(Command::Op(operation, blocking))
            .unwrap();
    }

    /// Waits up to `timeout` for the reply to the oldest outstanding command
    pub fn reply_within(&self, timeout: Duration) -> Option<Reply> {
        match self.replies.recv_timeout(timeout) {
            Ok(reply) => Some(reply),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => panic!("{} exited", self.name),
        }
    }

    /// Runs a command and waits promptly for its reply
    pub fn call(&self, operation: Operation, blocking: bool) -> Reply {
        self.send(operation, blocking);
        self.reply_within(PROMPT)
            .unwrap_or_else(|| panic!("{} did not finish {operation}", self.name))
    }

    pub fn read_lock(&self) -> Reply {
        self.call(Operation::Read, true)
    }

    pub fn try_read_lock(&self) -> Reply {
        self.call(Operation::Read, false)
    }

    pub fn write_lock(&self) -> Reply {
        self.call(Operation::Write, true)
    }

    pub fn try_write_lock(&self) -> Reply {
        self.call(Operation::Write, false)
    }

    pub fn unlock(&self) -> Reply {
        self.call(Operation::Unlock, false)
    }
}

impl Drop for LockThread {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Quit);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn setup_log() {
    posix_rwlock_logging::setup_log_no_panic_hook();
}
