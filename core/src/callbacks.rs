//! Callback system for circuit breaker state transitions

use crate::context::Context;
use crate::outcome::Fault;
use std::sync::Arc;
use std::time::Duration;

pub type BreakCallback<R, E> = Arc<dyn Fn(&Fault<R, E>, Duration, &Context) + Send + Sync>;
pub type ResetCallback = Arc<dyn Fn(&Context) + Send + Sync>;
pub type HalfOpenCallback = Arc<dyn Fn() + Send + Sync>;

/// Callbacks for circuit breaker events
pub struct Callbacks<R, E> {
    /// Fired with the breaking fault and the break length (`Duration::MAX` when isolated)
    pub on_break: Option<BreakCallback<R, E>>,
    pub on_reset: Option<ResetCallback>,
    pub on_half_open: Option<HalfOpenCallback>,
}

impl<R, E> Callbacks<R, E> {
    pub fn new() -> Self {
        Self {
            on_break: None,
            on_reset: None,
            on_half_open: None,
        }
    }

    pub fn trigger_break(&self, fault: &Fault<R, E>, duration: Duration, ctx: &Context) {
        if let Some(ref callback) = self.on_break {
            callback(fault, duration, ctx);
        }
    }

    pub fn trigger_reset(&self, ctx: &Context) {
        if let Some(ref callback) = self.on_reset {
            callback(ctx);
        }
    }

    pub fn trigger_half_open(&self) {
        if let Some(ref callback) = self.on_half_open {
            callback();
        }
    }
}

impl<R, E> Clone for Callbacks<R, E> {
    fn clone(&self) -> Self {
        Self {
            on_break: self.on_break.clone(),
            on_reset: self.on_reset.clone(),
            on_half_open: self.on_half_open.clone(),
        }
    }
}

impl<R, E> Default for Callbacks<R, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, E> std::fmt::Debug for Callbacks<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_break", &self.on_break.is_some())
            .field("on_reset", &self.on_reset.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .finish()
    }
}
