//! Per-device sink for backend diagnostics.
//!
//! Backends report compiler warnings and unsupported-feature notes through a
//! [`DebugLog`] handed to them at device creation, so each device can route
//! its own messages.

use std::sync::Arc;

use once_cell::sync::Lazy;

/// Receives diagnostic messages emitted by a backend.
pub trait DebugLog: Send + Sync {
    fn log(&self, message: &str);
}

impl<F> DebugLog for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Forwards backend messages to `tracing` under the `texgpu::backend` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl DebugLog for TracingLog {
    fn log(&self, message: &str) {
        tracing::debug!(target: "texgpu::backend", "{message}");
    }
}

static DEFAULT_LOG: Lazy<Arc<dyn DebugLog>> = Lazy::new(|| Arc::new(TracingLog));

/// Shared [`TracingLog`] instance used when a device is created without an
/// explicit sink.
pub fn default_log() -> Arc<dyn DebugLog> {
    Arc::clone(&DEFAULT_LOG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn closures_are_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |m: &str| seen.lock().unwrap().push(m.to_owned())
        };
        let log: Arc<dyn DebugLog> = Arc::new(sink);
        log.log("binding group 1 is not supported");
        assert_eq!(seen.lock().unwrap().as_slice(), ["binding group 1 is not supported"]);
    }

    #[test]
    fn default_log_is_shared() {
        assert!(Arc::ptr_eq(&default_log(), &default_log()));
    }
}
