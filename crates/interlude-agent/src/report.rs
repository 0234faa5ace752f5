//! Folding a run's event stream into a single summary

use crate::multiplexer::EventStream;
use futures::StreamExt;
use interlude_core::{Event, EventKind};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    InterventionRequired,
    Failed,
    /// The stream ended without a terminal event.
    #[default]
    Incomplete,
}

#[derive(Clone, Debug, Default)]
pub struct RunReport {
    pub events: Vec<Event>,
    pub status: RunStatus,
    /// Text of the final agent turn.
    pub response: String,
    /// Payload of the intervention request, when suspended.
    pub interrupt: Option<Value>,
    /// `(code, message)` of a failed run.
    pub error: Option<(String, String)>,
}

impl RunReport {
    pub async fn collect(mut stream: EventStream) -> Self {
        let mut report = Self::default();
        while let Some(event) = stream.next().await {
            report.observe(event);
        }
        report
    }

    pub fn from_events(events: impl IntoIterator<Item = Event>) -> Self {
        let mut report = Self::default();
        for event in events {
            report.observe(event);
        }
        report
    }

    fn observe(&mut self, event: Event) {
        match event.kind {
            EventKind::Content => self.response.push_str(&event.content),
            // Text before a tool call belongs to an earlier turn.
            EventKind::ToolResult => self.response.clear(),
            EventKind::InterventionRequired => {
                self.interrupt = event.get("payload").cloned();
                self.status = RunStatus::InterventionRequired;
            }
            EventKind::End => {
                if self.status != RunStatus::InterventionRequired {
                    self.status = RunStatus::Completed;
                }
            }
            EventKind::Error => {
                let code = event
                    .get("code")
                    .and_then(Value::as_str)
                    .unwrap_or("internal")
                    .to_string();
                self.error = Some((code, event.content.clone()));
                self.status = RunStatus::Failed;
            }
            _ => {}
        }
        self.events.push(event);
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.iter().map(|e| e.kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    pub fn first(&self, kind: EventKind) -> Option<&Event> {
        self.events.iter().find(|e| e.kind == kind)
    }
}
