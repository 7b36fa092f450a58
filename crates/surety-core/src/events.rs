//! Append-only event log with a broadcast feed
//!
//! Each committed event gets the next sequence number, which is the single
//! global order observers see.

use chrono::Utc;
use surety_types::{DomainEvent, EventRecord};
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug)]
pub struct EventLog {
    records: Vec<EventRecord>,
    next_sequence: u64,
    sender: broadcast::Sender<EventRecord>,
}

impl EventLog {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self {
            records: Vec::new(),
            next_sequence: 1,
            sender,
        }
    }

    /// Append events from one successful operation
    pub fn commit(&mut self, events: Vec<DomainEvent>) {
        for event in events {
            let record = EventRecord {
                sequence: self.next_sequence,
                recorded_at: Utc::now(),
                event,
            };
            self.next_sequence += 1;
            debug!(sequence = record.sequence, event = record.event.name(), "event recorded");
            // Ignore send errors (no receivers)
            let _ = self.sender.send(record.clone());
            self.records.push(record);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
