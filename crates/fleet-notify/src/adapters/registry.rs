//! Handler registry backed by a fixed map.

use std::collections::HashMap;
use std::sync::Arc;

use shared_types::NotificationType;

use crate::ports::{HandlerRegistry, NotificationHandler};

/// Handlers registered at startup.
#[derive(Default, Clone)]
pub struct StaticHandlerRegistry {
    handlers: HashMap<NotificationType, Arc<dyn NotificationHandler>>,
}

impl StaticHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of `register`.
    pub fn with(mut self, notification_type: NotificationType, handler: Arc<dyn NotificationHandler>) -> Self {
        self.register(notification_type, handler);
        self
    }

    /// Register `handler`, replacing any previous one for the type.
    pub fn register(&mut self, notification_type: NotificationType, handler: Arc<dyn NotificationHandler>) {
        self.handlers.insert(notification_type, handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl HandlerRegistry for StaticHandlerRegistry {
    fn resolve(&self, notification_type: NotificationType) -> Option<Arc<dyn NotificationHandler>> {
        self.handlers.get(&notification_type).cloned()
    }
}
