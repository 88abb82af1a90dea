use crate::frame::Frame;

/// Traceable domain event.
///
/// `subject` names the emitter (a layer id for the building pipeline), so
/// hosts can follow one dataset through `loadfeature` → `ready` → `destroy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub frame_index: u64,
    pub kind: &'static str,
    pub subject: u64,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct EventBus {
    events: Vec<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(
        &mut self,
        frame: Frame,
        kind: &'static str,
        subject: u64,
        message: impl Into<String>,
    ) {
        self.events.push(Event {
            frame_index: frame.index,
            kind,
            subject,
            message: message.into(),
        });
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn count(&self, kind: &str, subject: u64) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind == kind && e.subject == subject)
            .count()
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
