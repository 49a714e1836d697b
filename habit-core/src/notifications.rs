use habit_types::{Notice, NoticeLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Receiver for published notices.
pub trait NoticeHandler: Send {
    fn handle(&mut self, notice: &Notice);
}

/// Publish/subscribe service for user-facing notices. An instance is
/// injected wherever notices are raised; handlers are registered and
/// removed explicitly, so no listener outlives its owner.
pub struct Notifier {
    next_id: u64,
    handlers: Vec<(HandlerId, Box<dyn NoticeHandler>)>,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Box<dyn NoticeHandler>) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.handlers.push((id, handler));
        id
    }

    /// Returns false when the handler was already removed.
    pub fn remove_handler(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() < before
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn publish(&mut self, notice: Notice) {
        for (_, handler) in &mut self.handlers {
            handler.handle(&notice);
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.publish(Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        });
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.publish(Notice {
            level: NoticeLevel::Success,
            message: message.into(),
        });
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.publish(Notice {
            level: NoticeLevel::Warning,
            message: message.into(),
        });
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.publish(Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a point delta with its sign, e.g. "+20" or "-30".
pub fn format_points(points: i32) -> String {
    if points > 0 {
        format!("+{}", points)
    } else {
        points.to_string()
    }
}
