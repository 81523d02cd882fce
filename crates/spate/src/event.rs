//! Service-change events, the sole input to the dispatcher (spec §3/§4.6).
//! Grounded on `model/event.go`'s `Event{ID,Type,Object}`; event IDs use
//! `uuid` here in place of the vendored ULID package (odgrim-abathur-swarm
//! uses the same crate for similar event identifiers).

use crate::label::ServiceSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct ServiceChangeEvent {
    pub id: uuid::Uuid,
    pub event_type: EventType,
    pub service: ServiceSnapshot,
}

impl ServiceChangeEvent {
    pub fn new(event_type: EventType, service: ServiceSnapshot) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            event_type,
            service,
        }
    }
}
