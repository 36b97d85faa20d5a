//! Store event to subscriber event translation.

use routing_types::{EventName, EventType, StoreEvent};

/// Result of translating one store event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translated {
    /// Deliver `data` under `name`.
    Event(EventName, String),
    /// The feed produced something it cannot describe; end the stream.
    End,
}

pub fn translate(event: StoreEvent) -> Translated {
    match event.event_type {
        EventType::Create | EventType::Update => Translated::Event(EventName::Upsert, event.value),
        EventType::Delete | EventType::Expire => Translated::Event(EventName::Delete, event.value),
        EventType::Invalid => Translated::End,
    }
}
