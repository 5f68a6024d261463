use std::sync::{Mutex, PoisonError};

/// Prefix for user-facing progress lines
pub const OUTPUT_PREFIX: &str = "[pgfn]";

/// Where user-facing progress goes. The CLI prints, library callers collect
/// or discard.
pub trait OutputHandler: Send + Sync {
    fn info(&self, message: &str);

    fn warning(&self, message: &str);

    /// An action with its subject, e.g. `("Writing", "core/migrations/0001_x.toml")`
    fn status(&self, action: &str, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLevel {
    Info,
    Warning,
    Status,
}

/// Collects messages in memory
#[derive(Debug, Default)]
pub struct LibraryOutputHandler {
    messages: Mutex<Vec<(OutputLevel, String)>>,
}

impl LibraryOutputHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_messages(&self) -> Vec<(OutputLevel, String)> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Messages of one level, without the level tag
    pub fn messages_at(&self, level: OutputLevel) -> Vec<String> {
        self.get_messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message)
            .collect()
    }

    fn add_message(&self, level: OutputLevel, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}

impl OutputHandler for LibraryOutputHandler {
    fn info(&self, message: &str) {
        self.add_message(OutputLevel::Info, message);
    }

    fn warning(&self, message: &str) {
        self.add_message(OutputLevel::Warning, message);
    }

    fn status(&self, action: &str, message: &str) {
        self.add_message(OutputLevel::Status, &format!("{} {}", action, message));
    }
}

/// Prints to the terminal with colors
#[cfg(feature = "cli")]
pub struct CliOutputHandler;

#[cfg(feature = "cli")]
impl OutputHandler for CliOutputHandler {
    fn info(&self, message: &str) {
        use owo_colors::OwoColorize;
        println!("{} {}", OUTPUT_PREFIX.dimmed(), message);
    }

    fn warning(&self, message: &str) {
        use owo_colors::OwoColorize;
        eprintln!("{} {}", OUTPUT_PREFIX.yellow().bold(), message);
    }

    fn status(&self, action: &str, message: &str) {
        use owo_colors::OwoColorize;
        println!("{:>12} {}", action.green().bold(), message);
    }
}

/// Discards everything
pub struct SilentOutputHandler;

impl OutputHandler for SilentOutputHandler {
    fn info(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn status(&self, _action: &str, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_library_handler_records_levels() {
        let handler = LibraryOutputHandler::new();

        handler.info("Generating migration for app 'core'");
        handler.status("Writing", "core/migrations/0001_initial.toml");
        handler.warning("Removed 1 unrecorded migration");

        let messages = handler.get_messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[1],
            (OutputLevel::Status, "Writing core/migrations/0001_initial.toml".to_string())
        );
        assert_eq!(
            handler.messages_at(OutputLevel::Info),
            vec!["Generating migration for app 'core'"]
        );
        assert_eq!(handler.messages_at(OutputLevel::Warning), vec!["Removed 1 unrecorded migration"]);
    }

    #[test]
    fn test_library_handler_shared_across_threads() {
        let handler = Arc::new(LibraryOutputHandler::new());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let handler = Arc::clone(&handler);
                thread::spawn(move || handler.info(&format!("app_{}", i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(handler.messages_at(OutputLevel::Info).len(), 4);
    }
}
