//! Watches markdown source files and reports their content whenever it changes.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Full content of a source file after a change.
#[derive(Debug, Clone)]
pub struct SourceUpdate {
    pub path: PathBuf,
    pub content: String,
}

/// Command sent to the watcher thread.
#[derive(Debug)]
pub enum WatchCommand {
    /// Start watching a file
    AddFile(PathBuf),
    /// Stop the watcher
    Stop,
}

/// Last known state of a watched file.
struct FileState {
    path: PathBuf,
    last_content: Option<String>,
}

impl FileState {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_content: None,
        }
    }

    /// Read the file and return its content if it differs from what was last reported.
    fn read_if_changed(&mut self) -> Option<String> {
        if !self.path.exists() {
            // Forget the old content so a re-created file is reported again
            self.last_content = None;
            return None;
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read source");
                return None;
            }
        };

        if self.last_content.as_deref() == Some(content.as_str()) {
            return None;
        }

        self.last_content = Some(content.clone());
        Some(content)
    }
}

/// Watches source files with filesystem notifications plus a polling fallback.
pub struct SourceWatcher {
    /// Polling interval for fallback mode
    poll_interval: Duration,
    /// Sender for commands to the watcher thread
    command_tx: Option<Sender<WatchCommand>>,
    /// Watcher thread handle
    thread_handle: Option<JoinHandle<()>>,
}

impl SourceWatcher {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            command_tx: None,
            thread_handle: None,
        }
    }

    /// Spawn the watcher thread. Updates are delivered on `update_tx`.
    pub fn start(&mut self, update_tx: Sender<SourceUpdate>) {
        self.stop();

        let (command_tx, command_rx) = mpsc::channel();
        self.command_tx = Some(command_tx);

        let poll_interval = self.poll_interval;
        let handle = thread::spawn(move || {
            Self::watch_loop(command_rx, update_tx, poll_interval);
        });

        self.thread_handle = Some(handle);
    }

    /// Handle one command. Returns true if the loop should stop.
    fn process_command(
        cmd: WatchCommand,
        files: &mut HashMap<PathBuf, FileState>,
        watcher: &mut Option<RecommendedWatcher>,
        update_tx: &Sender<SourceUpdate>,
    ) -> bool {
        match cmd {
            WatchCommand::AddFile(path) => {
                debug!(path = %path.display(), "Watching source");
                let mut state = FileState::new(path.clone());
                if let Some(content) = state.read_if_changed() {
                    let update = SourceUpdate {
                        path: path.clone(),
                        content,
                    };
                    if update_tx.send(update).is_err() {
                        debug!(path = %path.display(), "Update receiver dropped, stopping");
                        return true;
                    }
                }

                if let Some(ref mut w) = watcher {
                    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                        if let Err(e) = w.watch(parent, RecursiveMode::NonRecursive) {
                            debug!(error = %e, "Falling back to polling");
                        }
                    }
                }

                files.insert(path, state);
                false
            }
            WatchCommand::Stop => true,
        }
    }

    /// Send updates for every changed file. Returns false once the receiver is gone.
    fn flush_changes<'a>(
        states: impl Iterator<Item = &'a mut FileState>,
        update_tx: &Sender<SourceUpdate>,
    ) -> bool {
        for state in states {
            if let Some(content) = state.read_if_changed() {
                let update = SourceUpdate {
                    path: state.path.clone(),
                    content,
                };
                if update_tx.send(update).is_err() {
                    return false;
                }
            }
        }
        true
    }

    /// Watch loop running in a separate thread.
    fn watch_loop(
        command_rx: Receiver<WatchCommand>,
        update_tx: Sender<SourceUpdate>,
        poll_interval: Duration,
    ) {
        let mut files: HashMap<PathBuf, FileState> = HashMap::new();
        let (notify_tx, notify_rx) = mpsc::channel();

        let mut watcher = match RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default(),
        ) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!(error = %e, "File notifications unavailable, polling only");
                None
            }
        };

        loop {
            while let Ok(cmd) = command_rx.try_recv() {
                if Self::process_command(cmd, &mut files, &mut watcher, &update_tx) {
                    return;
                }
            }

            while let Ok(event) = notify_rx.try_recv() {
                let touched = files
                    .values_mut()
                    .filter(|state| event.paths.iter().any(|p| same_file(p, &state.path)));
                if !Self::flush_changes(touched, &update_tx) {
                    return;
                }
            }

            // Fallback: poll every file
            if !Self::flush_changes(files.values_mut(), &update_tx) {
                return;
            }

            let check_interval = Duration::from_millis(100);
            let mut elapsed = Duration::ZERO;
            while elapsed < poll_interval {
                while let Ok(cmd) = command_rx.try_recv() {
                    if Self::process_command(cmd, &mut files, &mut watcher, &update_tx) {
                        return;
                    }
                }
                thread::sleep(check_interval);
                elapsed += check_interval;
            }
        }
    }

    /// Stop the watcher thread and wait for it to exit.
    pub fn stop(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(WatchCommand::Stop);
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn add_file(&self, path: &Path) {
        if let Some(ref tx) = self.command_tx {
            let _ = tx.send(WatchCommand::AddFile(path.to_path_buf()));
        }
    }
}

impl Drop for SourceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Notify reports absolute paths, while watched paths may be relative.
fn same_file(event_path: &Path, watched: &Path) -> bool {
    if event_path == watched {
        return true;
    }
    match (event_path.canonicalize(), watched.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
