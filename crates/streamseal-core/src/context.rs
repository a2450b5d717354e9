//! Per-message security context.
//!
//! Shared state for one message: the token-provider registry, typed named
//! properties processors use to share ancillary state without direct
//! coupling, and the observation log. Created when processing of a
//! message starts, discarded when it ends; never shared across messages.

use std::{
    any::Any,
    collections::HashMap,
    rc::Rc,
};

use crate::{
    error::SecurityError,
    observe::{SecurityEvent, SecurityEventListener},
    token::{SecurityToken, TokenProvider},
};

/// Per-message shared state.
#[derive(Default)]
pub struct SecurityContext {
    providers: HashMap<String, Rc<dyn TokenProvider>>,
    properties: HashMap<&'static str, Box<dyn Any>>,
    events: Vec<SecurityEvent>,
    listener: Option<Box<dyn SecurityEventListener>>,
}

impl SecurityContext {
    /// A fresh context with no registered tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observation listener. Records appended from now on are
    /// forwarded to it in order.
    pub fn set_listener(&mut self, listener: Box<dyn SecurityEventListener>) {
        self.listener = Some(listener);
    }

    /// Register a token provider under `id`. Last registration for a
    /// given id wins.
    pub fn register_token_provider(&mut self, id: impl Into<String>, provider: Rc<dyn TokenProvider>) {
        let id = id.into();
        tracing::debug!(id = %id, "registering token provider");
        self.providers.insert(id, provider);
    }

    /// The provider registered under `id`.
    pub fn token_provider(&self, id: &str) -> Result<Rc<dyn TokenProvider>, SecurityError> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| SecurityError::TokenNotFound { id: id.to_string() })
    }

    /// Resolve the token registered under `id`.
    pub fn resolve_token(&self, id: &str) -> Result<Rc<SecurityToken>, SecurityError> {
        self.token_provider(id)?.token()
    }

    /// Store a typed named property, replacing any previous value under
    /// the same key.
    pub fn set_property<T: Any>(&mut self, key: &'static str, value: T) {
        self.properties.insert(key, Box::new(value));
    }

    /// Borrow a typed named property mutably. `None` if absent or of a
    /// different type.
    pub fn property_mut<T: Any>(&mut self, key: &'static str) -> Option<&mut T> {
        self.properties.get_mut(key).and_then(|value| value.downcast_mut())
    }

    /// Remove and return a typed named property.
    pub fn take_property<T: Any>(&mut self, key: &'static str) -> Option<T> {
        let value = self.properties.remove(key)?;
        match value.downcast() {
            Ok(boxed) => Some(*boxed),
            Err(other) => {
                // Wrong type: put it back untouched.
                self.properties.insert(key, other);
                None
            },
        }
    }

    /// Append an observation record and notify the listener.
    pub fn record(&mut self, event: SecurityEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_security_event(&event);
        }
        self.events.push(event);
    }

    /// The observation log so far, in order.
    pub fn events(&self) -> &[SecurityEvent] {
        &self.events
    }

    /// Consume the context, returning the observation log.
    pub fn into_events(self) -> Vec<SecurityEvent> {
        self.events
    }
}

impl std::fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("events", &self.events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::token::StaticTokenProvider;

    fn provider(id: &str, secret: &[u8]) -> Rc<dyn TokenProvider> {
        Rc::new(StaticTokenProvider::new(SecurityToken::symmetric(id, secret.to_vec())))
    }

    #[test]
    fn missing_token_is_token_not_found() {
        let context = SecurityContext::new();

        let result = context.token_provider("nope");
        assert!(matches!(result, Err(SecurityError::TokenNotFound { id }) if id == "nope"));
    }

    #[test]
    fn last_registration_wins() {
        let mut context = SecurityContext::new();
        context.register_token_provider("ek-1", provider("ek-1", b"old"));
        context.register_token_provider("ek-1", provider("ek-1", b"new"));

        let token = context.resolve_token("ek-1").unwrap();
        assert_eq!(token.secret().map(|s| s.as_slice()), Some(&b"new"[..]));
    }

    #[test]
    fn typed_properties_roundtrip() {
        let mut context = SecurityContext::new();
        context.set_property("parts", vec!["id-1".to_string()]);

        if let Some(parts) = context.property_mut::<Vec<String>>("parts") {
            parts.push("id-2".to_string());
        }

        let parts: Vec<String> = context.take_property("parts").unwrap();
        assert_eq!(parts, vec!["id-1".to_string(), "id-2".to_string()]);
        assert!(context.take_property::<Vec<String>>("parts").is_none());
    }

    #[test]
    fn wrongly_typed_take_leaves_value_in_place() {
        let mut context = SecurityContext::new();
        context.set_property("count", 7usize);

        assert!(context.take_property::<String>("count").is_none());
        assert_eq!(context.take_property::<usize>("count"), Some(7));
    }

    #[test]
    fn records_flow_to_listener_in_order() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);

        let mut context = SecurityContext::new();
        context.set_listener(Box::new(move |event: &SecurityEvent| {
            if let Ok(mut log) = sink.lock() {
                log.push(event.clone());
            }
        }));

        context.record(SecurityEvent::Operation { operation: "timestamp" });
        context.record(SecurityEvent::Operation { operation: "signature" });

        let log = seen.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(context.events(), &log[..]);
    }
}
