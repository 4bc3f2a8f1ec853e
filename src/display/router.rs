//! Seat input routing
//!
//! Pointer events go to the window under the pointer, keyboard events to the
//! window holding keyboard focus. Surfaces the toolkit does not know about
//! (the cursor surface, or windows destroyed in flight) are dropped.

use log::{debug, error, trace};
use memmap2::MmapOptions;
use std::fs::File;
use std::os::fd::OwnedFd;

use super::Display;
use crate::input::{effective_modifiers, key_symbol};
use crate::protocol::{fixed_to_pixels, ButtonState, KeyState, KeymapFormat, ObjectId};

impl Display {
    pub(crate) fn handle_pointer_enter(&mut self, serial: u32, surface: Option<ObjectId>, x: i32, y: i32) {
        let Some(surface) = surface else {
            return;
        };
        let Some(window) = self.window_for_surface(surface) else {
            debug!("Pointer entered unknown surface {}", surface);
            return;
        };

        self.last_serial = serial;
        self.pointer_enter_serial = serial;
        self.pointer_focus = Some(window);
        let (x, y) = (fixed_to_pixels(x), fixed_to_pixels(y));
        trace!("pointer enter {:?} at {},{}", window, x, y);
        self.for_each_widget(window, |widget, ctx| widget.pointer_enter(ctx, x, y));
    }

    pub(crate) fn handle_pointer_leave(&mut self, serial: u32) {
        self.last_serial = serial;
        let Some(window) = self.pointer_focus else {
            return;
        };
        self.for_each_widget(window, |widget, ctx| widget.pointer_leave(ctx));
        self.pointer_focus = None;
    }

    pub(crate) fn handle_pointer_motion(&mut self, x: i32, y: i32) {
        let Some(window) = self.pointer_focus else {
            return;
        };
        let (x, y) = (fixed_to_pixels(x), fixed_to_pixels(y));
        self.for_each_widget(window, |widget, ctx| widget.pointer_motion(ctx, x, y));
    }

    pub(crate) fn handle_pointer_button(&mut self, serial: u32, button: u32, state: ButtonState) {
        self.last_serial = serial;
        let Some(window) = self.pointer_focus else {
            return;
        };
        self.for_each_widget(window, |widget, ctx| widget.pointer_button(ctx, button, state));
    }

    /// Compile a keymap sent by the compositor
    ///
    /// A keymap that cannot be used leaves the previous translation state,
    /// if any, in place.
    pub(crate) fn handle_keymap(&mut self, format: KeymapFormat, fd: OwnedFd, size: u32) {
        if format != KeymapFormat::XkbV1 {
            error!("❌ Unsupported keymap format {:?}", format);
            return;
        }

        let file = File::from(fd);
        // SAFETY: the compositor hands out a read-only keymap it never resizes.
        let map = match unsafe { MmapOptions::new().len(size as usize).map(&file) } {
            Ok(map) => map,
            Err(e) => {
                error!("❌ Cannot map keymap ({} bytes): {}", size, e);
                return;
            }
        };

        match self.keymap_compiler.compile(format, &map) {
            Ok(state) => {
                self.keyboard_state = Some(state);
                debug!("⌨️ Keymap installed");
            }
            Err(e) => error!("❌ Cannot compile keymap: {}", e),
        }
    }

    pub(crate) fn handle_keyboard_enter(&mut self, serial: u32, surface: Option<ObjectId>) {
        self.last_serial = serial;
        if self.keyboard_state.is_none() {
            return;
        }
        let Some(surface) = surface else {
            return;
        };
        match self.window_for_surface(surface) {
            Some(window) => self.keyboard_focus = Some(window),
            None => debug!("Keyboard entered unknown surface {}", surface),
        }
    }

    pub(crate) fn handle_keyboard_leave(&mut self, serial: u32) {
        self.last_serial = serial;
        self.keyboard_focus = None;
    }

    pub(crate) fn handle_key(&mut self, serial: u32, key: u32, state: KeyState) {
        self.last_serial = serial;
        let Some(keyboard) = self.keyboard_state.as_deref() else {
            return;
        };
        let Some(window) = self.keyboard_focus else {
            return;
        };

        let modifiers = effective_modifiers(keyboard);
        let sym = key_symbol(keyboard, key);
        trace!("key {} -> {:?} {:?} ({:?})", key, sym, state, modifiers);
        self.for_each_widget(window, |widget, ctx| widget.keyboard(ctx, modifiers, sym, state));
    }

    pub(crate) fn handle_modifiers(&mut self, serial: u32, depressed: u32, latched: u32, locked: u32, group: u32) {
        self.last_serial = serial;
        if let Some(keyboard) = self.keyboard_state.as_mut() {
            keyboard.update_modifiers(depressed, latched, locked, group);
        }
    }
}
