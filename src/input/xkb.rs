//! libxkbcommon keymap translation

use log::{debug, error};
use xkbcommon::xkb;

use super::{KeyboardState, KeymapCompiler, Keysym, ModifierName};
use crate::error::{Result, ToolkitError};
use crate::protocol::KeymapFormat;

/// Compiles XKB v1 text keymaps with a shared xkb context
pub struct XkbCompiler {
    context: xkb::Context,
}

impl XkbCompiler {
    pub fn new() -> Self {
        Self {
            context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
        }
    }
}

impl Default for XkbCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl KeymapCompiler for XkbCompiler {
    fn compile(&self, format: KeymapFormat, keymap: &[u8]) -> Result<Box<dyn KeyboardState>> {
        if format != KeymapFormat::XkbV1 {
            return Err(ToolkitError::protocol(format!("unsupported keymap format {:?}", format)));
        }

        // The compositor's keymap string is NUL terminated.
        let end = keymap.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        let text = String::from_utf8_lossy(&keymap[..end]).into_owned();

        let keymap = xkb::Keymap::new_from_string(
            &self.context,
            text,
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or_else(|| {
            error!("❌ Cannot compile xkb keymap");
            ToolkitError::protocol("cannot compile xkb keymap")
        })?;

        debug!("⌨️ Compiled xkb keymap ({} bytes)", end);
        Ok(Box::new(XkbState {
            state: xkb::State::new(&keymap),
        }))
    }
}

/// Translation state for one compiled keymap
pub struct XkbState {
    state: xkb::State,
}

impl XkbState {
    fn modifier_name(modifier: ModifierName) -> &'static str {
        match modifier {
            ModifierName::Shift => xkb::MOD_NAME_SHIFT,
            ModifierName::CapsLock => xkb::MOD_NAME_CAPS,
            ModifierName::Control => xkb::MOD_NAME_CTRL,
            ModifierName::Alt => xkb::MOD_NAME_ALT,
            ModifierName::Logo => xkb::MOD_NAME_LOGO,
        }
    }
}

impl KeyboardState for XkbState {
    fn update_modifiers(&mut self, depressed: u32, latched: u32, locked: u32, group: u32) {
        self.state.update_mask(depressed, latched, locked, 0, 0, group);
    }

    fn key_symbols(&self, keycode: u32) -> Vec<Keysym> {
        self.state
            .key_get_syms(keycode.into())
            .iter()
            .map(|sym| Keysym(u32::from(*sym)))
            .collect()
    }

    fn is_modifier_active(&self, modifier: ModifierName) -> bool {
        self.state
            .mod_name_is_active(Self::modifier_name(modifier), xkb::STATE_MODS_EFFECTIVE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{effective_modifiers, key_symbol, Modifiers};

    fn us_keymap() -> Option<(Vec<u8>, u32)> {
        let ctx = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let keymap = xkb::Keymap::new_from_names(&ctx, "", "", "us", "", None, xkb::KEYMAP_COMPILE_NO_FLAGS)?;
        let shift_index = keymap.mod_get_index(xkb::MOD_NAME_SHIFT);
        let mut text = keymap.get_as_string(xkb::KEYMAP_FORMAT_TEXT_V1).into_bytes();
        text.push(0);
        Some((text, 1 << shift_index))
    }

    #[test]
    fn test_rejects_unknown_format() {
        let compiler = XkbCompiler::new();
        assert!(matches!(
            compiler.compile(KeymapFormat::NoKeymap, b""),
            Err(ToolkitError::Protocol(_))
        ));
    }

    #[test]
    fn test_rejects_garbage_keymap() {
        let compiler = XkbCompiler::new();
        assert!(compiler.compile(KeymapFormat::XkbV1, b"not a keymap\0").is_err());
    }

    #[test]
    fn test_us_layout_translation() {
        // Needs xkeyboard-config data on the host; nothing to check without it.
        let Some((text, shift_mask)) = us_keymap() else {
            return;
        };

        let compiler = XkbCompiler::new();
        let mut state = match compiler.compile(KeymapFormat::XkbV1, &text) {
            Ok(state) => state,
            Err(e) => panic!("compiling a generated keymap failed: {}", e),
        };

        // evdev KEY_A
        assert_eq!(key_symbol(state.as_ref(), 30), Keysym(0x61));
        assert_eq!(effective_modifiers(state.as_ref()), Modifiers::empty());

        state.update_modifiers(shift_mask, 0, 0, 0);
        assert_eq!(key_symbol(state.as_ref(), 30), Keysym(0x41));
        assert_eq!(effective_modifiers(state.as_ref()), Modifiers::SHIFT);
    }
}
