/// Commands sent to the main application loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Request application shutdown.
    Shutdown {
        /// Signal that triggered it.
        signal: &'static str,
    },
}
