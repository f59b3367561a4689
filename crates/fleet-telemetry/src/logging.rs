//! Structured logging helpers.
//!
//! Every protocol event carries a `component` field so log pipelines can
//! split key discovery, delivery and inbox traffic.

/// Log with a `component` field.
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(component = $component, $($($field)*,)? $msg)
    };
    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(component = $component, $($($field)*,)? $msg)
    };
    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(component = $component, $($($field)*,)? $msg)
    };
    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(component = $component, $($($field)*,)? $msg)
    };
}

/// Log a key-discovery decision with standard fields.
#[macro_export]
macro_rules! log_key_event {
    ($level:ident, $msg:expr, $node_id:expr, $key_id:expr, $origin:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = "key_discovery",
            node_id = %$node_id,
            key_id = %$key_id,
            origin = %$origin,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a notification lifecycle event with standard fields.
#[macro_export]
macro_rules! log_notification_event {
    ($level:ident, $component:expr, $msg:expr, $notification_id:expr, $notification_type:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            notification_id = %$notification_id,
            notification_type = %$notification_type,
            $($($field)*,)?
            $msg
        )
    };
}
