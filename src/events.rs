// Build notifications sent from the worker to the controlling thread

use std::sync::mpsc;

/// Status update. `maximum: None` keeps whatever maximum was last announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub action: Option<String>,
    pub maximum: Option<u64>,
    pub current: u64,
}

/// Terminal failure or cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortEvent {
    pub message: String,
}

/// Terminal success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishEvent {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    Progress(ProgressEvent),
    Abort(AbortEvent),
    Finish(FinishEvent),
}

impl BuildEvent {
    /// Whether no further events can follow this one.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BuildEvent::Progress(_))
    }
}

/// Destination for build events. Delivery is best effort: a host that hung
/// up does not stop the build (that is what the cancel token is for).
pub trait EventSink: Send {
    fn emit(&self, event: BuildEvent);
}

impl EventSink for mpsc::Sender<BuildEvent> {
    fn emit(&self, event: BuildEvent) {
        let _ = self.send(event);
    }
}

/// A bounded sender makes the worker wait for the host to keep up.
impl EventSink for mpsc::SyncSender<BuildEvent> {
    fn emit(&self, event: BuildEvent) {
        let _ = self.send(event);
    }
}

/// What a progress display should currently show.
///
/// Mirrors how a host renders the stream: the last announced maximum is kept
/// until a new one arrives, and the shown value never passes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub action: Option<String>,
    pub maximum: u64,
    pub current: u64,
}

impl ProgressState {
    pub fn apply(&mut self, event: &ProgressEvent) {
        if let Some(maximum) = event.maximum {
            self.maximum = maximum;
        }
        if event.action.is_some() {
            self.action = event.action.clone();
        }
        self.current = event.current.min(self.maximum);
    }

    /// Completion in percent, 0 when nothing has been announced yet.
    pub fn percent(&self) -> u8 {
        if self.maximum == 0 {
            return 0;
        }
        (self.current * 100 / self.maximum) as u8
    }
}
