//! Topic based publish/subscribe with optional deferred delivery.
//!
//! Without a queue every publish is delivered synchronously on the calling
//! context. With a queue, events are stored by value and replayed by
//! whichever task calls [EventBus::dispatch].
//!
//! # Note
//! An interrupt-context publish on an exhausted queue is dropped. It is the
//! only lossy path of the bus.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::{Deque, Vec};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    sweep::SweepMask,
    time::{wait_until, Duration, Timebase},
    Error,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Topic {
    SweepStarted = 0,
    SweepCompleted = 1,
    TouchInput = 2,
    StorageUpdated = 3,
    ConfigurationChanged = 4,
    UsbCommandPending = 5,
    SweepProgress = 6,
}

/// A published event with its topic-specific payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    SweepStarted(SweepMask),
    SweepCompleted(SweepMask),
    TouchInput,
    /// Storage slot written.
    StorageUpdated(u16),
    ConfigurationChanged,
    UsbCommandPending,
    /// Index of the last measured point.
    SweepProgress(u16),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::SweepStarted(_) => Topic::SweepStarted,
            Event::SweepCompleted(_) => Topic::SweepCompleted,
            Event::TouchInput => Topic::TouchInput,
            Event::StorageUpdated(_) => Topic::StorageUpdated,
            Event::ConfigurationChanged => Topic::ConfigurationChanged,
            Event::UsbCommandPending => Topic::UsbCommandPending,
            Event::SweepProgress(_) => Topic::SweepProgress,
        }
    }
}

pub trait Listener {
    fn on_event(&self, event: &Event);
}

/// Anything events can be published to.
pub trait Publisher {
    fn publish(&self, event: Event);
}

#[derive(Copy, Clone)]
struct Subscription<'a> {
    topic: Topic,
    listener: &'a (dyn Listener + Sync),
}

/// Event bus with `S` subscriptions and up to `Q` queued events.
pub struct EventBus<'a, const S: usize, const Q: usize> {
    subscriptions: Vec<Subscription<'a>, S>,
    queue: Option<Mutex<RefCell<Deque<Event, Q>>>>,
}

impl<'a, const S: usize, const Q: usize> EventBus<'a, S, Q> {
    /// Bus that dispatches every publish synchronously.
    pub const fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            queue: None,
        }
    }

    /// Bus that defers delivery to [Self::dispatch].
    pub const fn queued() -> Self {
        Self {
            subscriptions: Vec::new(),
            queue: Some(Mutex::new(RefCell::new(Deque::new()))),
        }
    }

    /// Register `listener` for `topic`.
    ///
    /// # Returns
    /// `Err(listener)` once all `S` subscriptions are taken.
    pub fn subscribe(
        &mut self,
        topic: Topic,
        listener: &'a (dyn Listener + Sync),
    ) -> Result<(), &'a (dyn Listener + Sync)> {
        self.subscriptions
            .push(Subscription { topic, listener })
            .map_err(|s| s.listener)
    }

    fn deliver(&self, event: &Event) {
        let topic = event.topic();
        self.subscriptions
            .iter()
            .filter(|s| s.topic == topic)
            .for_each(|s| s.listener.on_event(event));
    }

    fn enqueue(&self, event: Event) -> Option<Result<(), Error>> {
        let queue = self.queue.as_ref()?;
        Some(critical_section::with(|cs| {
            queue
                .borrow_ref_mut(cs)
                .push_back(event)
                .map_err(|_| Error::QueueExhausted)
        }))
    }

    /// Publish from thread context. Falls back to synchronous delivery when
    /// the queue is full.
    pub fn publish(&self, event: Event) {
        match self.enqueue(event) {
            Some(Ok(())) => {}
            Some(Err(_)) => {
                log::trace!("event queue full, delivering {:?} inline", event.topic());
                self.deliver(&event);
            }
            None => self.deliver(&event),
        }
    }

    /// Publish from interrupt context.
    ///
    /// # Returns
    /// `Err(QueueExhausted)` when the event was dropped.
    pub fn publish_from_isr(&self, event: Event) -> Result<(), Error> {
        match self.enqueue(event) {
            Some(result) => result,
            None => {
                self.deliver(&event);
                Ok(())
            }
        }
    }

    /// Deliver one queued event, waiting up to `timeout` for one to arrive.
    ///
    /// # Returns
    /// Whether an event was delivered.
    pub fn dispatch<T: Timebase + ?Sized>(&self, timebase: &T, timeout: Duration) -> bool {
        let Some(queue) = self.queue.as_ref() else {
            return false;
        };
        let mut event = None;
        wait_until(timebase, timeout, || {
            event = critical_section::with(|cs| queue.borrow_ref_mut(cs).pop_front());
            event.is_some()
        });
        match event {
            Some(event) => {
                self.deliver(&event);
                true
            }
            None => false,
        }
    }

    /// Queue capacity not currently holding an event.
    pub fn free_nodes(&self) -> usize {
        self.queue.as_ref().map_or(0, |queue| {
            critical_section::with(|cs| Q - queue.borrow_ref(cs).len())
        })
    }
}

impl<const S: usize, const Q: usize> Default for EventBus<'_, S, Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const S: usize, const Q: usize> Publisher for EventBus<'_, S, Q> {
    fn publish(&self, event: Event) {
        EventBus::publish(self, event)
    }
}
