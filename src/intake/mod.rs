//! Recording intake: directory watching, debouncing, and dispatch.

pub mod dispatcher;
pub mod locks;
pub mod watcher;

pub use dispatcher::{DispatcherSettings, IntakeDispatcher};
pub use locks::FileLockRegistry;
pub use watcher::{Debouncer, PollWatcher, WatchEvent};
