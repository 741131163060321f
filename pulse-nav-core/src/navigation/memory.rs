//! In-memory navigation container and app-state source.
//!
//! Both emit events synchronously on the calling thread, which is enough to
//! drive the orchestrator from tests and the replay CLI.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{trace, warn};

use super::types::{
    AppStateSource, AppStateStatus, NavigationContainer, NavigationEvent, NavigationRoute,
    Subscription,
};

type Callback = Rc<RefCell<Box<dyn FnMut()>>>;

struct ListenerEntry {
    id: u64,
    event: NavigationEvent,
    callback: Callback,
}

/// A navigation stack that notifies listeners on every change.
///
/// Navigation methods emit `Dispatch` before mutating the stack and `State`
/// after, matching the order a real container reports.
#[derive(Default)]
pub struct MemoryNavigationContainer {
    stack: RefCell<Vec<NavigationRoute>>,
    listeners: Rc<RefCell<Vec<ListenerEntry>>>,
    next_listener_id: Cell<u64>,
}

impl MemoryNavigationContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_route(route: NavigationRoute) -> Self {
        let container = Self::new();
        container.stack.borrow_mut().push(route);
        container
    }

    /// Push `route` onto the stack.
    pub fn navigate(&self, route: NavigationRoute) {
        self.dispatch();
        self.stack.borrow_mut().push(route);
        self.emit(NavigationEvent::State);
    }

    /// Replace the focused route with `route`.
    pub fn replace(&self, route: NavigationRoute) {
        self.dispatch();
        {
            let mut stack = self.stack.borrow_mut();
            stack.pop();
            stack.push(route);
        }
        self.emit(NavigationEvent::State);
    }

    /// Pop the focused route. Returns false when there is nothing to go back to.
    pub fn go_back(&self) -> bool {
        if self.stack.borrow().len() < 2 {
            return false;
        }
        self.dispatch();
        self.stack.borrow_mut().pop();
        self.emit(NavigationEvent::State);
        true
    }

    /// Emit a `Dispatch` event without changing the stack.
    pub fn dispatch(&self) {
        self.emit(NavigationEvent::Dispatch);
    }

    /// Make `route` the focused route and emit `State`, without a dispatch.
    pub fn settle(&self, route: NavigationRoute) {
        self.set_current_route(route);
        self.emit(NavigationEvent::State);
    }

    /// Make `route` the focused route silently.
    pub fn set_current_route(&self, route: NavigationRoute) {
        let mut stack = self.stack.borrow_mut();
        if stack.last().map(|r| r.key.as_str()) == Some(route.key.as_str()) {
            return;
        }
        // Going back to an entry already on the stack pops down to it
        if let Some(pos) = stack.iter().position(|r| r.key == route.key) {
            stack.truncate(pos + 1);
        } else {
            stack.push(route);
        }
    }

    /// Remove every route, leaving no focused route.
    pub fn clear_routes(&self) {
        self.stack.borrow_mut().clear();
    }

    pub fn routes(&self) -> Vec<NavigationRoute> {
        self.stack.borrow().clone()
    }

    /// Invoke every listener registered for `event`.
    pub fn emit(&self, event: NavigationEvent) {
        let callbacks: Vec<Callback> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event == event)
            .map(|l| Rc::clone(&l.callback))
            .collect();
        trace!(event = event.as_str(), listeners = callbacks.len(), "Emitting navigation event");

        for callback in callbacks {
            match callback.try_borrow_mut() {
                Ok(mut callback) => (*callback)(),
                Err(_) => warn!(event = event.as_str(), "Skipping re-entrant listener"),
            }
        }
    }

    pub fn listener_count(&self, event: NavigationEvent) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|l| l.event == event)
            .count()
    }
}

impl NavigationContainer for MemoryNavigationContainer {
    fn add_listener(&self, event: NavigationEvent, callback: Box<dyn FnMut()>) -> Subscription {
        let id = self.next_listener_id.get();
        self.next_listener_id.set(id + 1);
        self.listeners.borrow_mut().push(ListenerEntry {
            id,
            event,
            callback: Rc::new(RefCell::new(callback)),
        });

        let listeners: Weak<RefCell<Vec<ListenerEntry>>> = Rc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().retain(|l| l.id != id);
            }
        })
    }

    fn current_route(&self) -> Option<NavigationRoute> {
        self.stack.borrow().last().cloned()
    }
}

type StateCallback = Rc<RefCell<Box<dyn FnMut(AppStateStatus)>>>;

/// OS app state under test control.
pub struct MemoryAppState {
    state: Cell<AppStateStatus>,
    listeners: Rc<RefCell<Vec<(u64, StateCallback)>>>,
    next_listener_id: Cell<u64>,
}

impl Default for MemoryAppState {
    fn default() -> Self {
        Self::new(AppStateStatus::Active)
    }
}

impl MemoryAppState {
    pub fn new(initial: AppStateStatus) -> Self {
        Self {
            state: Cell::new(initial),
            listeners: Rc::new(RefCell::new(Vec::new())),
            next_listener_id: Cell::new(0),
        }
    }

    /// Transition to `next`, notifying listeners. Returns false if unchanged.
    pub fn set_state(&self, next: AppStateStatus) -> bool {
        if self.state.replace(next) == next {
            return false;
        }

        let callbacks: Vec<StateCallback> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for callback in callbacks {
            match callback.try_borrow_mut() {
                Ok(mut callback) => (*callback)(next),
                Err(_) => warn!(state = %next, "Skipping re-entrant app state listener"),
            }
        }
        true
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl AppStateSource for MemoryAppState {
    fn current_state(&self) -> AppStateStatus {
        self.state.get()
    }

    fn add_change_listener(&self, callback: Box<dyn FnMut(AppStateStatus)>) -> Subscription {
        let id = self.next_listener_id.get();
        self.next_listener_id.set(id + 1);
        self.listeners
            .borrow_mut()
            .push((id, Rc::new(RefCell::new(callback))));

        let listeners = Rc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().retain(|(l, _)| *l != id);
            }
        })
    }
}
