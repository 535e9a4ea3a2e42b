//! OS thread running `rdev::listen`.
//!
//! `rdev::listen` cannot be interrupted.  Dropping [`HotkeyListener`] sets a
//! stop flag so the callback forwards nothing further; the thread itself
//! stays parked in the event loop until the process exits.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::{HotkeyBindings, HotkeyCommand};

pub struct HotkeyListener {
    stop: Arc<AtomicBool>,
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyListener {
    /// Forward bound key presses on `tx`.  Uses `try_send`: a press that
    /// arrives while the channel is full is dropped, never queued up.
    pub fn start(bindings: HotkeyBindings, tx: mpsc::Sender<HotkeyCommand>) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let mut filter = RepeatFilter::default();
                let result = rdev::listen(move |event| {
                    if stop_flag.load(Ordering::Relaxed) {
                        return;
                    }
                    let command = match event.event_type {
                        rdev::EventType::KeyPress(key) => match bindings.command_for(key) {
                            Some(command) if filter.press(command) => command,
                            _ => return,
                        },
                        rdev::EventType::KeyRelease(key) => {
                            if let Some(command) = bindings.command_for(key) {
                                filter.release(command);
                            }
                            return;
                        }
                        _ => return,
                    };
                    if let Err(e) = tx.try_send(command) {
                        log::debug!("hotkey: {command:?} dropped: {e}");
                    }
                });

                if let Err(e) = result {
                    log::error!("hotkey: rdev::listen exited with error: {e:?}");
                }
            })?;

        Ok(Self {
            stop,
            _thread: thread,
        })
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Collapses OS auto-repeat: a held key yields one press.
#[derive(Debug, Default)]
struct RepeatFilter {
    held: HashSet<HotkeyCommand>,
}

impl RepeatFilter {
    /// `true` for the first press since the last release.
    fn press(&mut self, command: HotkeyCommand) -> bool {
        self.held.insert(command)
    }

    fn release(&mut self, command: HotkeyCommand) {
        self.held.remove(&command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_key_counts_once() {
        let mut f = RepeatFilter::default();
        assert!(f.press(HotkeyCommand::Talk));
        assert!(!f.press(HotkeyCommand::Talk));
        assert!(f.press(HotkeyCommand::Quit));
        f.release(HotkeyCommand::Talk);
        assert!(f.press(HotkeyCommand::Talk));
    }
}
