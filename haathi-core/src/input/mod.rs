//! Host input queued for delivery to the guest.
//!
//! Front ends push events as they arrive, in host terms (key names, y-down pixel positions).
//! The runtime drains the queue once per frame and converts each event with
//! [`InputEvent::to_guest`] before calling the matching guest export.

use std::collections::VecDeque;

use crate::keys;

/// An input event as the host sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),
    MouseDown(u32),
    MouseUp(u32),
    /// Pointer position in surface pixels, y-down.
    MouseMove { x: f32, y: f32 },
}

/// An input event as the guest receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestEvent {
    KeyDown(u32),
    KeyUp(u32),
    MouseDown(u32),
    MouseUp(u32),
    /// Pointer position, y-up.
    MouseMove(i32, i32),
}

impl InputEvent {
    /// Normalize key names through the keycode table and flip y for a surface `height` tall.
    pub fn to_guest(&self, height: u32) -> GuestEvent {
        match self {
            InputEvent::KeyDown(name) => GuestEvent::KeyDown(keys::code_of(name)),
            InputEvent::KeyUp(name) => GuestEvent::KeyUp(keys::code_of(name)),
            InputEvent::MouseDown(button) => GuestEvent::MouseDown(*button),
            InputEvent::MouseUp(button) => GuestEvent::MouseUp(*button),
            InputEvent::MouseMove { x, y } => {
                GuestEvent::MouseMove(x.round() as i32, (height as f32 - y).round() as i32)
            }
        }
    }
}

/// FIFO of pending events.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    pub fn key_down(&mut self, name: impl Into<String>) {
        self.push(InputEvent::KeyDown(name.into()));
    }

    pub fn key_up(&mut self, name: impl Into<String>) {
        self.push(InputEvent::KeyUp(name.into()));
    }

    /// Take every pending event, oldest first.
    pub fn drain(&mut self) -> Vec<InputEvent> {
        self.events.drain(..).collect()
    }

    /// Put undelivered events back ahead of anything queued since, keeping their order.
    pub fn requeue_front(&mut self, events: impl IntoIterator<Item = InputEvent>) {
        let rest = std::mem::take(&mut self.events);
        self.events.extend(events);
        self.events.extend(rest);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
