//! Event bus connecting window input to subscribers
//!
//! Key principles:
//! - The bus is an ordinary object owned by the driver loop and passed by
//!   reference, so independent instances can coexist (tests, several windows)
//! - Subscribers are registered per [`EventKind`] and notified synchronously,
//!   in subscription order, on the calling thread
//! - The bus only keeps weak references: a dropped subscriber is skipped and
//!   pruned instead of being called after it is gone
//! - `notify` may be called from inside a handler; the subscriber list is
//!   snapshotted before dispatch

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::input::{Key, Modifiers, MouseButton, MouseButtons};

/// Event type identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A key went down (including auto-repeat)
    KeyDown,
    /// A key was released
    KeyUp,
    /// A mouse button was pressed
    MouseButtonDown,
    /// The cursor moved
    MouseMove,
    /// The framebuffer size settled on a new value
    Resize,
}

/// Input and window events delivered through the bus
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// A key went down
    KeyDown {
        /// The key
        key: Key,
        /// Modifiers held at the time
        modifiers: Modifiers,
    },
    /// A key was released
    KeyUp {
        /// The key
        key: Key,
        /// Modifiers held at the time
        modifiers: Modifiers,
    },
    /// A mouse button was pressed at the given cursor position
    MouseButtonDown {
        /// The button
        button: MouseButton,
        /// Cursor x in window coordinates
        x: f64,
        /// Cursor y in window coordinates
        y: f64,
    },
    /// The cursor moved
    MouseMove {
        /// Cursor x in window coordinates
        x: f64,
        /// Cursor y in window coordinates
        y: f64,
        /// Buttons held during the move
        buttons: MouseButtons,
    },
    /// The framebuffer was resized
    Resize {
        /// New framebuffer width in pixels
        width: u32,
        /// New framebuffer height in pixels
        height: u32,
    },
}

impl Event {
    /// The kind subscribers register for
    pub fn kind(&self) -> EventKind {
        match self {
            Self::KeyDown { .. } => EventKind::KeyDown,
            Self::KeyUp { .. } => EventKind::KeyUp,
            Self::MouseButtonDown { .. } => EventKind::MouseButtonDown,
            Self::MouseMove { .. } => EventKind::MouseMove,
            Self::Resize { .. } => EventKind::Resize,
        }
    }
}

/// Event handler trait
pub trait EventHandler {
    /// Handle an event. `bus` is the bus doing the dispatch, so a handler may
    /// publish follow-up events.
    fn on_event(&mut self, event: &Event, bus: &EventBus);
}

type Subscriber = Weak<RefCell<dyn EventHandler>>;

/// Publish/subscribe hub for [`Event`]s
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<HashMap<EventKind, Vec<Subscriber>>>,
}

impl EventBus {
    /// Create a new empty event bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for one event kind
    ///
    /// The bus holds a weak reference; keep the `Rc` alive for as long as the
    /// handler should receive events.
    pub fn subscribe<H: EventHandler + 'static>(&self, kind: EventKind, handler: &Rc<RefCell<H>>) {
        let handler: Rc<RefCell<dyn EventHandler>> = handler.clone();
        self.listeners
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(Rc::downgrade(&handler));
    }

    /// Register `handler` for several event kinds
    pub fn subscribe_all<H: EventHandler + 'static>(&self, kinds: &[EventKind], handler: &Rc<RefCell<H>>) {
        for &kind in kinds {
            self.subscribe(kind, handler);
        }
    }

    /// Deliver `event` to every live subscriber of its kind, in order
    ///
    /// Handlers may call `notify` from `on_event`. A nested delivery skips
    /// any handler that is still inside its own `on_event` further up the
    /// stack, so a handler never sees events it publishes itself; the other
    /// subscribers of that kind still receive them.
    pub fn notify(&self, event: &Event) {
        let kind = event.kind();
        let snapshot: Vec<Subscriber> = match self.listeners.borrow().get(&kind) {
            Some(subscribers) => subscribers.clone(),
            None => return,
        };

        let mut saw_dead = false;
        for subscriber in &snapshot {
            let Some(handler) = subscriber.upgrade() else {
                saw_dead = true;
                continue;
            };
            match handler.try_borrow_mut() {
                Ok(mut handler) => handler.on_event(event, self),
                Err(_) => log::trace!("Skipping re-entrant delivery of {:?}", kind),
            };
        }

        if saw_dead {
            self.prune(kind);
        }
    }

    /// Number of live subscribers for a kind
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.listeners
            .borrow()
            .get(&kind)
            .map_or(0, |subscribers| {
                subscribers.iter().filter(|s| s.strong_count() > 0).count()
            })
    }

    fn prune(&self, kind: EventKind) {
        if let Some(subscribers) = self.listeners.borrow_mut().get_mut(&kind) {
            let before = subscribers.len();
            subscribers.retain(|s| s.strong_count() > 0);
            log::debug!(
                "Pruned {} dropped {:?} subscriber(s)",
                before - subscribers.len(),
                kind
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl EventHandler for Recorder {
        fn on_event(&mut self, event: &Event, _bus: &EventBus) {
            self.log.borrow_mut().push(format!("{}:{:?}", self.name, event.kind()));
        }
    }

    fn recorder(name: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Rc<RefCell<Recorder>> {
        Rc::new(RefCell::new(Recorder { name, log: log.clone() }))
    }

    #[test]
    fn test_notify_in_subscription_order() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let first = recorder("first", &log);
        let second = recorder("second", &log);
        bus.subscribe(EventKind::Resize, &first);
        bus.subscribe(EventKind::Resize, &second);

        bus.notify(&Event::Resize { width: 10, height: 20 });

        assert_eq!(*log.borrow(), vec!["first:Resize", "second:Resize"]);
    }

    #[test]
    fn test_only_matching_kind_is_notified() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let handler = recorder("cam", &log);
        bus.subscribe(EventKind::MouseMove, &handler);

        bus.notify(&Event::KeyDown { key: Key::W, modifiers: Modifiers::empty() });
        assert!(log.borrow().is_empty());

        bus.notify(&Event::MouseMove { x: 1.0, y: 2.0, buttons: MouseButtons::LEFT });
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_dropped_subscriber_is_skipped_and_pruned() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let kept = recorder("kept", &log);
        {
            let dropped = recorder("dropped", &log);
            bus.subscribe(EventKind::KeyUp, &dropped);
        }
        bus.subscribe(EventKind::KeyUp, &kept);

        bus.notify(&Event::KeyUp { key: Key::A, modifiers: Modifiers::SHIFT });

        assert_eq!(*log.borrow(), vec!["kept:KeyUp"]);
        assert_eq!(bus.subscriber_count(EventKind::KeyUp), 1);
        assert_eq!(bus.listeners.borrow()[&EventKind::KeyUp].len(), 1);
    }

    struct Forwarder;

    impl EventHandler for Forwarder {
        fn on_event(&mut self, event: &Event, bus: &EventBus) {
            if let Event::MouseButtonDown { x, y, .. } = *event {
                bus.notify(&Event::MouseMove { x, y, buttons: MouseButtons::LEFT });
            }
        }
    }

    #[test]
    fn test_reentrant_notify_reaches_other_kinds() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let forwarder = Rc::new(RefCell::new(Forwarder));
        let listener = recorder("listener", &log);
        bus.subscribe(EventKind::MouseButtonDown, &forwarder);
        bus.subscribe(EventKind::MouseMove, &listener);

        bus.notify(&Event::MouseButtonDown { button: MouseButton::Left, x: 3.0, y: 4.0 });

        assert_eq!(*log.borrow(), vec!["listener:MouseMove"]);
    }

    #[test]
    fn test_subscribe_during_dispatch_applies_to_next_notify() {
        struct Subscriber {
            late: Rc<RefCell<Recorder>>,
        }
        impl EventHandler for Subscriber {
            fn on_event(&mut self, _event: &Event, bus: &EventBus) {
                bus.subscribe(EventKind::Resize, &self.late);
            }
        }

        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let late = recorder("late", &log);
        let subscriber = Rc::new(RefCell::new(Subscriber { late: late.clone() }));
        bus.subscribe(EventKind::Resize, &subscriber);

        bus.notify(&Event::Resize { width: 1, height: 1 });
        assert!(log.borrow().is_empty());

        bus.notify(&Event::Resize { width: 2, height: 2 });
        assert_eq!(*log.borrow(), vec!["late:Resize"]);
    }

    #[test]
    fn test_nested_notify_skips_the_publishing_handler() {
        struct Echo {
            seen: Vec<Key>,
        }
        impl EventHandler for Echo {
            fn on_event(&mut self, event: &Event, bus: &EventBus) {
                if let Event::KeyDown { key, modifiers } = *event {
                    self.seen.push(key);
                    if key == Key::W {
                        bus.notify(&Event::KeyDown { key: Key::S, modifiers });
                    }
                }
            }
        }

        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let echo = Rc::new(RefCell::new(Echo { seen: Vec::new() }));
        let listener = recorder("listener", &log);
        bus.subscribe(EventKind::KeyDown, &echo);
        bus.subscribe(EventKind::KeyDown, &listener);

        bus.notify(&Event::KeyDown { key: Key::W, modifiers: Modifiers::empty() });

        assert_eq!(echo.borrow().seen, vec![Key::W]);
        // Nested S reached the listener before the outer W did
        assert_eq!(*log.borrow(), vec!["listener:KeyDown", "listener:KeyDown"]);
    }
}
