// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event bus: an ordered, typed fan-out from publishers to listeners.
//!
//! Listeners declare the concrete message types they handle in [`Listener::register`]. Publishing
//! a message calls, in registration order, only the handlers declared for that exact type. There
//! is no supertype or subtype matching.
//!
//! The bus is fail-fast: the first handler error is returned from [`Bus::publish`] and the
//! remaining handlers are not called.

use crate::errors::{BoxError, ListenerError};
use std::{any::TypeId, cell::RefCell, fmt, rc::Rc};
use trellis_metadata::Message;

/// A shared handle to a subscribed listener, used to inspect its state after a run.
pub type ListenerHandle<L> = Rc<RefCell<L>>;

/// Handles one message type.
pub trait Handler<M: Message> {
    /// Handles a message. An error aborts the run.
    fn handle(&mut self, message: &M) -> Result<(), BoxError>;
}

/// An observer of execution events.
pub trait Listener: Sized + 'static {
    /// The name used when reporting failures of this listener.
    const NAME: &'static str;

    /// Declares, one message type at a time, which messages this listener handles.
    fn register(registry: &mut Registry<'_, Self>);
}

/// Collects a listener's handler declarations. See [`Listener::register`].
pub struct Registry<'a, L> {
    subscriptions: &'a mut Vec<Subscription>,
    listener: &'a ListenerHandle<L>,
}

impl<L: Listener> Registry<'_, L> {
    /// Declares that the listener handles messages of type `M`.
    pub fn handle<M>(&mut self) -> &mut Self
    where
        M: Message,
        L: Handler<M>,
    {
        let listener = self.listener.clone();
        let call: Box<dyn Fn(&dyn std::any::Any) -> Result<(), ListenerError>> =
            Box::new(move |message| {
                let Some(message) = message.downcast_ref::<M>() else {
                    return Ok(());
                };
                listener
                    .borrow_mut()
                    .handle(message)
                    .map_err(|err| ListenerError::new(L::NAME, M::TYPE_NAME, err))
            });
        self.subscriptions.push(Subscription {
            listener: L::NAME,
            type_id: TypeId::of::<M>(),
            call,
        });
        self
    }
}

struct Subscription {
    listener: &'static str,
    type_id: TypeId,
    call: Box<dyn Fn(&dyn std::any::Any) -> Result<(), ListenerError>>,
}

/// The event bus.
///
/// The bus is populated once, before a run, and only read while the run is in progress.
#[derive(Default)]
pub struct Bus {
    subscriptions: Vec<Subscription>,
}

impl Bus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` to the message types it declares, after every existing subscription.
    pub fn subscribe<L: Listener>(&mut self, listener: L) -> ListenerHandle<L> {
        let handle = Rc::new(RefCell::new(listener));
        self.subscribe_handle(&handle);
        handle
    }

    /// Subscribes a listener that is already shared.
    pub fn subscribe_handle<L: Listener>(&mut self, handle: &ListenerHandle<L>) {
        let mut registry = Registry {
            subscriptions: &mut self.subscriptions,
            listener: handle,
        };
        L::register(&mut registry);
        tracing::trace!(listener = L::NAME, "subscribed listener");
    }

    /// Publishes a message to every handler declared for its exact type, in registration order.
    pub fn publish<M: Message>(&self, message: &M) -> Result<(), ListenerError> {
        let type_id = TypeId::of::<M>();
        for subscription in &self.subscriptions {
            if subscription.type_id == type_id {
                (subscription.call)(message)?;
            }
        }
        Ok(())
    }

    /// Returns true if no listener is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.subscriptions.iter().map(|s| s.listener))
            .finish()
    }
}
