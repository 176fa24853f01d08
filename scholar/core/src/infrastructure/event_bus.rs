// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Publishing never blocks and never fails the publisher; slow subscribers
// lag and lose the oldest events.

use crate::domain::events::{MasteryEvent, ModuleTreeEvent, ProfileEvent};
use crate::domain::mastery::StudentId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Tree(ModuleTreeEvent),
    Mastery(MasteryEvent),
    Profile(ProfileEvent),
}

impl DomainEvent {
    /// Student the event concerns, if it is student-scoped.
    pub fn student_id(&self) -> Option<&StudentId> {
        match self {
            DomainEvent::Tree(_) => None,
            DomainEvent::Mastery(e) => Some(e.student_id()),
            DomainEvent::Profile(e) => Some(e.student_id()),
        }
    }
}

/// Event bus for publishing and subscribing to domain events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity.
    /// Capacity determines how many events can be buffered before dropping old ones.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_tree_event(&self, event: ModuleTreeEvent) {
        self.publish(DomainEvent::Tree(event));
    }

    pub fn publish_mastery_event(&self, event: MasteryEvent) {
        self.publish(DomainEvent::Mastery(event));
    }

    pub fn publish_profile_event(&self, event: ProfileEvent) {
        self.publish(DomainEvent::Profile(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all domain events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the mastery and profile events of one student
    pub fn subscribe_student(&self, student_id: StudentId) -> StudentEventReceiver {
        StudentEventReceiver {
            receiver: self.sender.subscribe(),
            student_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

fn map_try_recv_error(e: broadcast::error::TryRecvError) -> EventBusError {
    match e {
        broadcast::error::TryRecvError::Empty => EventBusError::Empty,
        broadcast::error::TryRecvError::Closed => EventBusError::Closed,
        broadcast::error::TryRecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(map_try_recv_error)
    }

    /// Drain everything currently buffered
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => events.push(event),
                Err(EventBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}

/// Receiver filtered to one student's events
pub struct StudentEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    student_id: StudentId,
}

impl StudentEventReceiver {
    /// Receive the next event for the subscribed student; events for other
    /// students and tree events are skipped.
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.student_id() == Some(&self.student_id) {
                return Ok(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        loop {
            let event = self.receiver.try_recv().map_err(map_try_recv_error)?;
            if event.student_id() == Some(&self.student_id) {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mastery::MasteryStatus;
    use crate::domain::module::ModuleId;
    use crate::domain::signal::SignalSource;
    use chrono::Utc;

    fn updated(student: &str) -> MasteryEvent {
        MasteryEvent::MasteryUpdated {
            student_id: StudentId::from(student),
            module_id: ModuleId::new(),
            source: SignalSource::Tutoring,
            previous_score: 0,
            new_score: 10,
            status: MasteryStatus::InProgress,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let module_id = ModuleId::new();
        event_bus.publish_tree_event(ModuleTreeEvent::ModuleCreated {
            module_id,
            parent_id: None,
            depth: 0,
            created_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            DomainEvent::Tree(ModuleTreeEvent::ModuleCreated { module_id: id, .. }) => assert_eq!(id, module_id),
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_student_event_filtering() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe_student(StudentId::from("alice"));

        event_bus.publish_mastery_event(updated("bob"));
        event_bus.publish_tree_event(ModuleTreeEvent::SubtreeDeleted {
            root_id: ModuleId::new(),
            removed_modules: 1,
            deleted_at: Utc::now(),
        });
        event_bus.publish_mastery_event(updated("alice"));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.student_id(), Some(&StudentId::from("alice")));
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let event_bus = EventBus::default();
        assert_eq!(event_bus.subscriber_count(), 0);
        event_bus.publish_mastery_event(updated("nobody"));
    }

    #[test]
    fn test_lagged_receiver_reports_dropped_events() {
        let event_bus = EventBus::new(2);
        let mut receiver = event_bus.subscribe();
        for _ in 0..5 {
            event_bus.publish_mastery_event(updated("s"));
        }
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Lagged(3))));
        assert_eq!(receiver.drain().len(), 2);
    }
}
