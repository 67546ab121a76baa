//! Warning channel for recoverable problems (skipped or omitted entries,
//! sink failures)

/// Callback receiving warning messages
pub type LogHandler = Box<dyn FnMut(&str) + Send>;

/// Routes warnings to a registered handler, or to the `log` facade at
/// `warn` level (target `flowzip`) when none is set.
#[derive(Default)]
pub(crate) struct Logger {
    handler: Option<LogHandler>,
}

impl Logger {
    pub(crate) fn set(&mut self, handler: LogHandler) {
        self.handler = Some(handler);
    }

    pub(crate) fn clear(&mut self) {
        self.handler = None;
    }

    pub(crate) fn warn(&mut self, msg: &str) {
        match self.handler.as_mut() {
            Some(handler) => handler(msg),
            None => log::warn!(target: "flowzip", "{}", msg),
        }
    }
}
