// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pointer event normalization.
//!
//! The host reports raw mouse input: a position, and for presses a button
//! identifier. The engine expects a phase-tagged pointer stream that is
//! bracketed by `Add` and `Remove`. [`PointerNormalizer`] bridges the two.
//!
//! Rules:
//!
//! - The phase is derived from the held buttons after applying the input and
//!   from whether a press was already in progress: no buttons held gives
//!   `Up` if a press was in progress, else `Hover`; buttons held gives `Move`
//!   if a press was in progress, else `Down`.
//! - Any event other than `Add` reported while the pointer is not added is
//!   preceded by a synthesized `Add` at the same position with no buttons.
//! - An explicit `Add` while already added is suppressed.
//! - `Remove` resets the whole [`MouseState`].
//! - Unknown host button identifiers are dropped with a warning and leave
//!   the state untouched.

use core::fmt;

use bitflags::bitflags;
use kurbo::Point;

use crate::time::HostTime;

bitflags! {
    /// Canonical pointer button bits as the engine understands them.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PointerButtons: u32 {
        /// The primary (usually left) button.
        const PRIMARY = 1;
        /// The secondary (usually right) button.
        const SECONDARY = 1 << 1;
        /// The middle button.
        const MIDDLE = 1 << 2;
    }
}

/// Host button identifier for the primary button.
pub const HOST_BUTTON_PRIMARY: i32 = -1;
/// Host button identifier for the secondary button.
pub const HOST_BUTTON_SECONDARY: i32 = -2;
/// Host button identifier for the middle button.
pub const HOST_BUTTON_MIDDLE: i32 = -3;

/// Maps a host button identifier to its canonical bit.
pub fn button_from_host(id: i32) -> Result<PointerButtons, UnknownButton> {
    match id {
        HOST_BUTTON_PRIMARY => Ok(PointerButtons::PRIMARY),
        HOST_BUTTON_SECONDARY => Ok(PointerButtons::SECONDARY),
        HOST_BUTTON_MIDDLE => Ok(PointerButtons::MIDDLE),
        other => Err(UnknownButton(other)),
    }
}

/// A host button identifier with no canonical mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownButton(pub i32);

impl fmt::Display for UnknownButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown host mouse button identifier {}", self.0)
    }
}

impl core::error::Error for UnknownButton {}

/// Phase of a pointer event in the engine's protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerPhase {
    /// The pointer entered the view.
    Add,
    /// The pointer left the view.
    Remove,
    /// The pointer moved with no button held.
    Hover,
    /// A press started.
    Down,
    /// The pointer moved, or the button set changed, during a press.
    Move,
    /// The last held button was released.
    Up,
}

/// Kind of device that produced a pointer event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// A mouse.
    Mouse,
}

/// One event in the engine's pointer stream.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    /// Phase of the event.
    pub phase: PointerPhase,
    /// Position in physical pixels.
    pub position: Point,
    /// Buttons held after the event.
    pub buttons: PointerButtons,
    /// Monotonic timestamp in microseconds.
    pub timestamp_micros: u64,
    /// Device kind.
    pub kind: DeviceKind,
    /// `true` when the normalizer synthesized this event.
    pub synthesized: bool,
}

impl PointerEvent {
    const EMPTY: Self = Self {
        phase: PointerPhase::Hover,
        position: Point::ZERO,
        buttons: PointerButtons::empty(),
        timestamp_micros: 0,
        kind: DeviceKind::Mouse,
        synthesized: false,
    };
}

/// Events produced by one host input call, in delivery order.
///
/// Holds at most two events: an optional synthesized `Add` and the event
/// itself.
#[derive(Clone, Copy, PartialEq)]
pub struct PointerBatch {
    events: [PointerEvent; 2],
    len: usize,
}

impl fmt::Debug for PointerBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl PointerBatch {
    const fn empty() -> Self {
        Self {
            events: [PointerEvent::EMPTY; 2],
            len: 0,
        }
    }

    fn push(&mut self, event: PointerEvent) {
        debug_assert!(self.len < self.events.len(), "pointer batch overflow");
        self.events[self.len] = event;
        self.len += 1;
    }

    /// Returns the events in delivery order.
    #[must_use]
    pub fn as_slice(&self) -> &[PointerEvent] {
        &self.events[..self.len]
    }

    /// Returns the number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing is to be delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Pointer state tracked between host input calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MouseState {
    /// Buttons currently held.
    pub buttons: PointerButtons,
    /// A press is in progress.
    pub is_down: bool,
    /// The engine has seen an `Add` not yet followed by a `Remove`.
    pub is_added: bool,
}

impl Default for MouseState {
    fn default() -> Self {
        Self {
            buttons: PointerButtons::empty(),
            is_down: false,
            is_added: false,
        }
    }
}

impl MouseState {
    fn phase(&self) -> PointerPhase {
        match (self.buttons.is_empty(), self.is_down) {
            (true, true) => PointerPhase::Up,
            (true, false) => PointerPhase::Hover,
            (false, true) => PointerPhase::Move,
            (false, false) => PointerPhase::Down,
        }
    }
}

/// Turns raw host mouse input into the engine's pointer stream.
#[derive(Debug, Default)]
pub struct PointerNormalizer {
    state: MouseState,
}

impl PointerNormalizer {
    /// Creates a normalizer with the pointer not added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> MouseState {
        self.state
    }

    /// Handles a button press.
    pub fn on_mouse_down(
        &mut self,
        position: Point,
        button: i32,
        now: HostTime,
    ) -> Result<PointerBatch, UnknownButton> {
        let bit = self.map_button(button)?;
        self.state.buttons.insert(bit);
        let phase = self.state.phase();
        let batch = self.emit(phase, position, now);
        if phase == PointerPhase::Down {
            self.state.is_down = true;
        }
        Ok(batch)
    }

    /// Handles a button release.
    pub fn on_mouse_up(
        &mut self,
        position: Point,
        button: i32,
        now: HostTime,
    ) -> Result<PointerBatch, UnknownButton> {
        let bit = self.map_button(button)?;
        self.state.buttons.remove(bit);
        let phase = self.state.phase();
        let batch = self.emit(phase, position, now);
        if phase == PointerPhase::Up {
            self.state.is_down = false;
        }
        Ok(batch)
    }

    /// Handles pointer motion.
    pub fn on_mouse_move(&mut self, position: Point, now: HostTime) -> PointerBatch {
        let phase = self.state.phase();
        self.emit(phase, position, now)
    }

    /// Handles the pointer entering the view.
    ///
    /// Produces an explicit `Add`, or nothing if the pointer is already added.
    pub fn on_mouse_enter(&mut self, position: Point, now: HostTime) -> PointerBatch {
        self.emit(PointerPhase::Add, position, now)
    }

    /// Handles the pointer leaving the view.
    ///
    /// Produces a `Remove` (preceded by an `Add` if needed) and resets the
    /// state.
    pub fn on_mouse_leave(&mut self, position: Point, now: HostTime) -> PointerBatch {
        self.emit(PointerPhase::Remove, position, now)
    }

    fn map_button(&self, button: i32) -> Result<PointerButtons, UnknownButton> {
        button_from_host(button).inspect_err(|err| {
            log::warn!("dropping pointer event: {err}");
        })
    }

    fn emit(&mut self, phase: PointerPhase, position: Point, now: HostTime) -> PointerBatch {
        let mut batch = PointerBatch::empty();
        let timestamp_micros = now.micros();

        if phase == PointerPhase::Add {
            if self.state.is_added {
                return batch;
            }
        } else if !self.state.is_added {
            batch.push(PointerEvent {
                phase: PointerPhase::Add,
                position,
                buttons: PointerButtons::empty(),
                timestamp_micros,
                kind: DeviceKind::Mouse,
                synthesized: true,
            });
            self.state.is_added = true;
        }

        batch.push(PointerEvent {
            phase,
            position,
            buttons: self.state.buttons,
            timestamp_micros,
            kind: DeviceKind::Mouse,
            synthesized: false,
        });

        match phase {
            PointerPhase::Add => self.state.is_added = true,
            PointerPhase::Remove => self.state = MouseState::default(),
            _ => {}
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AT: Point = Point::new(5.0, 5.0);

    fn phases(batch: &PointerBatch) -> alloc::vec::Vec<PointerPhase> {
        batch.as_slice().iter().map(|e| e.phase).collect()
    }

    #[test]
    fn first_press_synthesizes_add_then_down() {
        let mut n = PointerNormalizer::new();
        let batch = n
            .on_mouse_down(AT, HOST_BUTTON_PRIMARY, HostTime(7_000))
            .unwrap();

        let events = batch.as_slice();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].phase, PointerPhase::Add);
        assert_eq!(events[0].position, AT);
        assert_eq!(events[0].buttons, PointerButtons::empty());
        assert!(events[0].synthesized, "leading add is synthesized");
        assert_eq!(events[1].phase, PointerPhase::Down);
        assert_eq!(events[1].buttons, PointerButtons::PRIMARY);
        assert_eq!(events[1].timestamp_micros, 7);
        assert_eq!(events[1].kind, DeviceKind::Mouse);

        assert_eq!(
            n.state(),
            MouseState {
                buttons: PointerButtons::PRIMARY,
                is_down: true,
                is_added: true,
            }
        );
    }

    #[test]
    fn release_of_last_button_emits_up() {
        let mut n = PointerNormalizer::new();
        let _ = n.on_mouse_down(AT, HOST_BUTTON_PRIMARY, HostTime(0)).unwrap();
        let batch = n.on_mouse_up(AT, HOST_BUTTON_PRIMARY, HostTime(1)).unwrap();

        assert_eq!(phases(&batch), [PointerPhase::Up]);
        assert_eq!(batch.as_slice()[0].buttons, PointerButtons::empty());
        assert!(!n.state().is_down, "press ended");
        assert!(n.state().is_added, "still added");
    }

    #[test]
    fn unknown_button_emits_nothing_and_keeps_state() {
        let mut n = PointerNormalizer::new();
        let before = n.state();
        assert_eq!(
            n.on_mouse_down(AT, 0, HostTime(0)),
            Err(UnknownButton(0))
        );
        assert_eq!(n.state(), before);

        let _ = n.on_mouse_down(AT, HOST_BUTTON_MIDDLE, HostTime(0)).unwrap();
        let held = n.state();
        assert!(n.on_mouse_up(AT, 42, HostTime(0)).is_err());
        assert_eq!(n.state(), held);
    }

    #[test]
    fn hover_before_any_press_is_preceded_by_add() {
        let mut n = PointerNormalizer::new();
        let batch = n.on_mouse_move(Point::new(1.0, 2.0), HostTime(0));
        assert_eq!(phases(&batch), [PointerPhase::Add, PointerPhase::Hover]);
        assert_eq!(batch.as_slice()[0].position, Point::new(1.0, 2.0));

        let batch = n.on_mouse_move(Point::new(3.0, 2.0), HostTime(0));
        assert_eq!(phases(&batch), [PointerPhase::Hover]);
    }

    #[test]
    fn drag_reports_move_and_second_button_keeps_press() {
        let mut n = PointerNormalizer::new();
        let _ = n.on_mouse_down(AT, HOST_BUTTON_PRIMARY, HostTime(0)).unwrap();
        assert_eq!(phases(&n.on_mouse_move(AT, HostTime(1))), [PointerPhase::Move]);

        let batch = n.on_mouse_down(AT, HOST_BUTTON_SECONDARY, HostTime(2)).unwrap();
        assert_eq!(phases(&batch), [PointerPhase::Move]);
        assert_eq!(
            batch.as_slice()[0].buttons,
            PointerButtons::PRIMARY | PointerButtons::SECONDARY
        );

        let batch = n.on_mouse_up(AT, HOST_BUTTON_PRIMARY, HostTime(3)).unwrap();
        assert_eq!(phases(&batch), [PointerPhase::Move]);
        assert!(n.state().is_down, "secondary still held");

        let batch = n.on_mouse_up(AT, HOST_BUTTON_SECONDARY, HostTime(4)).unwrap();
        assert_eq!(phases(&batch), [PointerPhase::Up]);
        assert!(!n.state().is_down, "all released");
    }

    #[test]
    fn explicit_add_is_suppressed_when_added() {
        let mut n = PointerNormalizer::new();
        let batch = n.on_mouse_enter(AT, HostTime(0));
        assert_eq!(phases(&batch), [PointerPhase::Add]);
        assert!(!batch.as_slice()[0].synthesized, "explicit add");
        assert!(n.on_mouse_enter(AT, HostTime(1)).is_empty());
    }

    #[test]
    fn leave_removes_and_resets_state() {
        let mut n = PointerNormalizer::new();
        let _ = n.on_mouse_down(AT, HOST_BUTTON_PRIMARY, HostTime(0)).unwrap();
        let batch = n.on_mouse_leave(AT, HostTime(1));
        assert_eq!(phases(&batch), [PointerPhase::Remove]);
        assert_eq!(n.state(), MouseState::default());

        // A later move starts a fresh add/hover sequence.
        let batch = n.on_mouse_move(AT, HostTime(2));
        assert_eq!(phases(&batch), [PointerPhase::Add, PointerPhase::Hover]);
    }

    #[test]
    fn leave_without_add_brackets_remove() {
        let mut n = PointerNormalizer::new();
        let batch = n.on_mouse_leave(AT, HostTime(0));
        assert_eq!(phases(&batch), [PointerPhase::Add, PointerPhase::Remove]);
        assert!(!n.state().is_added, "removed");
    }

    #[test]
    fn no_non_add_event_reaches_engine_while_not_added() {
        let mut n = PointerNormalizer::new();
        let mut added = false;
        let script: [(u8, i32); 9] = [
            (0, 0),
            (1, HOST_BUTTON_PRIMARY),
            (0, 0),
            (2, HOST_BUTTON_PRIMARY),
            (3, 0),
            (2, HOST_BUTTON_SECONDARY),
            (1, HOST_BUTTON_MIDDLE),
            (3, 0),
            (4, 0),
        ];
        for (step, (op, button)) in script.into_iter().enumerate() {
            let t = HostTime(step as u64 * 1_000);
            let batch = match op {
                0 => n.on_mouse_move(AT, t),
                1 => n.on_mouse_down(AT, button, t).unwrap(),
                2 => n.on_mouse_up(AT, button, t).unwrap(),
                3 => n.on_mouse_leave(AT, t),
                _ => n.on_mouse_enter(AT, t),
            };
            for event in batch.as_slice() {
                match event.phase {
                    PointerPhase::Add => {
                        assert!(!added, "duplicate add at step {step}");
                        added = true;
                    }
                    PointerPhase::Remove => {
                        assert!(added, "remove without add at step {step}");
                        added = false;
                    }
                    other => assert!(added, "{other:?} before add at step {step}"),
                }
            }
        }
    }
}
