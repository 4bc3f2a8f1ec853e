//! Keyboard translation
//!
//! The compositor sends a keymap and raw key codes; translating them into
//! symbols and modifier masks is done by a [`KeymapCompiler`] /
//! [`KeyboardState`] pair. [`xkb`] provides the libxkbcommon backed
//! implementation used by default.

pub mod xkb;

use bitflags::bitflags;

use crate::error::Result;
use crate::protocol::KeymapFormat;

pub use xkb::XkbCompiler;

bitflags! {
    /// Effective modifier mask reported with every key event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        /// Alt
        const MOD1 = 1 << 3;
        /// Logo / Super
        const MOD4 = 1 << 6;
    }
}

/// Named modifiers a keyboard state can be queried for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierName {
    Shift,
    CapsLock,
    Control,
    Alt,
    Logo,
}

impl ModifierName {
    pub const ALL: [ModifierName; 5] = [
        ModifierName::Shift,
        ModifierName::CapsLock,
        ModifierName::Control,
        ModifierName::Alt,
        ModifierName::Logo,
    ];

    pub fn mask(self) -> Modifiers {
        match self {
            ModifierName::Shift => Modifiers::SHIFT,
            ModifierName::CapsLock => Modifiers::LOCK,
            ModifierName::Control => Modifiers::CONTROL,
            ModifierName::Alt => Modifiers::MOD1,
            ModifierName::Logo => Modifiers::MOD4,
        }
    }
}

/// Key symbol value (X11 keysym numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Keysym(pub u32);

impl Keysym {
    pub const NO_SYMBOL: Keysym = Keysym(0);

    pub fn is_none(self) -> bool {
        self == Self::NO_SYMBOL
    }
}

/// Evdev codes are offset by 8 in XKB keycode space
pub const EVDEV_KEYCODE_OFFSET: u32 = 8;

/// Compiles compositor keymaps into translation states
pub trait KeymapCompiler {
    fn compile(&self, format: KeymapFormat, keymap: &[u8]) -> Result<Box<dyn KeyboardState>>;
}

/// Live translation state for one keymap
pub trait KeyboardState {
    fn update_modifiers(&mut self, depressed: u32, latched: u32, locked: u32, group: u32);

    /// Symbols produced by an XKB keycode in the current state
    fn key_symbols(&self, keycode: u32) -> Vec<Keysym>;

    fn is_modifier_active(&self, modifier: ModifierName) -> bool;
}

/// Effective modifier mask of `state`
pub fn effective_modifiers(state: &dyn KeyboardState) -> Modifiers {
    ModifierName::ALL
        .iter()
        .filter(|m| state.is_modifier_active(**m))
        .fold(Modifiers::empty(), |mask, m| mask | m.mask())
}

/// Symbol dispatched for an evdev `key`: only single-symbol keys report one
pub fn key_symbol(state: &dyn KeyboardState, key: u32) -> Keysym {
    match state.key_symbols(key + EVDEV_KEYCODE_OFFSET).as_slice() {
        [sym] => *sym,
        _ => Keysym::NO_SYMBOL,
    }
}
