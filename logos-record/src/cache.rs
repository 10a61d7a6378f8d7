//! Acquisition cache: one live [`Record`] per name, shared by every holder.
//!
//! The cache also routes inbound record messages to their record and drops
//! records from the map once they are destroyed.
//!
//! A record whose last usage was released is retiring: its UNSUBSCRIBE is in
//! flight and it will be destroyed when the ack arrives. Acquiring the same
//! name meanwhile builds a fresh record, and unsubscribe acks for that name go
//! to the retiring records first, oldest first.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::anonymous::RecordSource;
use crate::protocol::{Action, Event, Message, Topic};
use crate::record::{Record, RecordContext};

#[derive(Default)]
struct Records {
    live: HashMap<String, Record>,
    retiring: HashMap<String, VecDeque<Record>>,
}

impl Records {
    fn prune(&mut self, name: &str, record: &Record) {
        if self.live.get(name).is_some_and(|r| r.same(record)) {
            self.live.remove(name);
        }
        if let Some(queue) = self.retiring.get_mut(name) {
            queue.retain(|r| !r.same(record));
            if queue.is_empty() {
                self.retiring.remove(name);
            }
        }
    }
}

fn acks_unsubscribe(message: &Message) -> bool {
    message.action == Action::Ack
        && message.field(0).ok() == Some(Action::Unsubscribe.code())
}

pub struct RecordCache {
    context: RecordContext,
    records: Mutex<Records>,
}

impl RecordCache {
    pub fn new(context: RecordContext) -> Self {
        Self {
            context,
            records: Mutex::new(Records::default()),
        }
    }

    fn records(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn context(&self) -> &RecordContext {
        &self.context
    }

    /// Acquire the record called `name`, creating it on first use.
    ///
    /// Every call counts as one usage.
    pub fn get_record(&self, name: &str) -> Record {
        let record = {
            let mut records = self.records();
            match records.live.get(name).cloned() {
                Some(record) if !record.is_destroyed() && !record.is_destroy_pending() => record,
                previous => {
                    if let Some(previous) = previous.filter(|r| !r.is_destroyed()) {
                        log::debug!("Record {name} is retiring, creating a replacement");
                        records
                            .retiring
                            .entry(name.to_string())
                            .or_default()
                            .push_back(previous);
                    }
                    let record = Record::new(name, &self.context);
                    records.live.insert(name.to_string(), record.clone());
                    record
                }
            }
        };
        record.retain();
        record
    }

    /// Dispatch an inbound message to the record it names.
    pub fn handle_message(&self, message: &Message) {
        if message.topic != Topic::Record {
            log::debug!("Record cache ignoring {:?} message", message.topic);
            return;
        }
        let Some(name) = message.record_name() else {
            self.context.errors.report_error(
                Topic::Record,
                Event::MessageParseError,
                &format!("{} message without a record name", message.action.code()),
            );
            return;
        };

        let record = {
            let records = self.records();
            let retiring = records.retiring.get(name).and_then(VecDeque::front);
            match retiring {
                Some(record) if acks_unsubscribe(message) => Some(record.clone()),
                _ => records.live.get(name).or(retiring).cloned(),
            }
        };
        let Some(record) = record else {
            self.context.errors.report_error(
                Topic::Record,
                Event::UnsolicitedMessage,
                &format!("{} message for unknown record {name}", message.action.code()),
            );
            return;
        };

        record.on_message(message);

        if record.is_destroyed() {
            self.records().prune(name, &record);
        }
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().live.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records().live.contains_key(name)
    }

    /// Records waiting for their unsubscribe ack.
    pub fn retiring_len(&self) -> usize {
        self.records().retiring.values().map(VecDeque::len).sum()
    }
}

impl RecordSource for RecordCache {
    fn get_record(&self, name: &str) -> Record {
        RecordCache::get_record(self, name)
    }
}
