//! HID keyboard abstraction and the character -> keycode table
//!
//! Only single keys are modeled: characters that need a modifier (shifted
//! punctuation, `{`, `!`, ...) have no entry and are skipped when typing.
//! Upper and lower case letters both map to the bare letter key.

use log::*;
use std::time::Duration;

/// HID keyboard usage ID (usage page 0x07)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Keycode(pub u8);

impl Keycode {
    pub const A: Keycode = Keycode(0x04);
    pub const B: Keycode = Keycode(0x05);
    pub const C: Keycode = Keycode(0x06);
    pub const D: Keycode = Keycode(0x07);
    pub const E: Keycode = Keycode(0x08);
    pub const F: Keycode = Keycode(0x09);
    pub const G: Keycode = Keycode(0x0A);
    pub const H: Keycode = Keycode(0x0B);
    pub const I: Keycode = Keycode(0x0C);
    pub const J: Keycode = Keycode(0x0D);
    pub const K: Keycode = Keycode(0x0E);
    pub const L: Keycode = Keycode(0x0F);
    pub const M: Keycode = Keycode(0x10);
    pub const N: Keycode = Keycode(0x11);
    pub const O: Keycode = Keycode(0x12);
    pub const P: Keycode = Keycode(0x13);
    pub const Q: Keycode = Keycode(0x14);
    pub const R: Keycode = Keycode(0x15);
    pub const S: Keycode = Keycode(0x16);
    pub const T: Keycode = Keycode(0x17);
    pub const U: Keycode = Keycode(0x18);
    pub const V: Keycode = Keycode(0x19);
    pub const W: Keycode = Keycode(0x1A);
    pub const X: Keycode = Keycode(0x1B);
    pub const Y: Keycode = Keycode(0x1C);
    pub const Z: Keycode = Keycode(0x1D);
    pub const ONE: Keycode = Keycode(0x1E);
    pub const ZERO: Keycode = Keycode(0x27);
    pub const ENTER: Keycode = Keycode(0x28);
    pub const TAB: Keycode = Keycode(0x2B);
    pub const SPACE: Keycode = Keycode(0x2C);
    pub const MINUS: Keycode = Keycode(0x2D);
    pub const EQUALS: Keycode = Keycode(0x2E);
    pub const LEFT_BRACKET: Keycode = Keycode(0x2F);
    pub const RIGHT_BRACKET: Keycode = Keycode(0x30);
    pub const BACKSLASH: Keycode = Keycode(0x31);
    pub const SEMICOLON: Keycode = Keycode(0x33);
    pub const QUOTE: Keycode = Keycode(0x34);
    pub const GRAVE_ACCENT: Keycode = Keycode(0x35);
    pub const COMMA: Keycode = Keycode(0x36);
    pub const PERIOD: Keycode = Keycode(0x37);
    pub const FORWARD_SLASH: Keycode = Keycode(0x38);
}

/// Non-alphanumeric characters with a dedicated unshifted key
const SYMBOLS: &[(char, Keycode)] = &[
    ('\n', Keycode::ENTER),
    ('\t', Keycode::TAB),
    ('-', Keycode::MINUS),
    ('=', Keycode::EQUALS),
    ('[', Keycode::LEFT_BRACKET),
    (']', Keycode::RIGHT_BRACKET),
    ('\\', Keycode::BACKSLASH),
    (';', Keycode::SEMICOLON),
    ('\'', Keycode::QUOTE),
    ('`', Keycode::GRAVE_ACCENT),
    (',', Keycode::COMMA),
    ('.', Keycode::PERIOD),
    ('/', Keycode::FORWARD_SLASH),
];

/// Look up the key for a character, `None` if it cannot be typed
pub fn keycode_for(c: char) -> Option<Keycode> {
    match c {
        'a'..='z' => Some(Keycode(Keycode::A.0 + (c as u8 - b'a'))),
        'A'..='Z' => Some(Keycode(Keycode::A.0 + (c as u8 - b'A'))),
        '1'..='9' => Some(Keycode(Keycode::ONE.0 + (c as u8 - b'1'))),
        '0' => Some(Keycode::ZERO),
        ' ' => Some(Keycode::SPACE),
        _ => SYMBOLS.iter().find(|(ch, _)| *ch == c).map(|(_, key)| *key),
    }
}

/// Trait for HID keyboard sinks
pub trait Keyboard {
    /// Error type for report delivery
    type Error: std::fmt::Display;

    /// Press a key (and keep it held)
    fn press(&mut self, key: Keycode) -> Result<(), Self::Error>;

    /// Release every held key
    fn release_all(&mut self) -> Result<(), Self::Error>;
}

/// Type `text` one key at a time, waiting `key_delay` after each key.
///
/// Returns the number of keys sent; unmappable characters are skipped.
pub fn type_string<K: Keyboard>(
    keyboard: &mut K,
    text: &str,
    key_delay: Duration,
) -> Result<usize, K::Error> {
    let mut sent = 0;
    for c in text.chars() {
        let Some(key) = keycode_for(c) else {
            trace!("No keycode for {:?}, skipping", c);
            continue;
        };
        keyboard.press(key)?;
        keyboard.release_all()?;
        sent += 1;
        std::thread::sleep(key_delay);
    }
    Ok(sent)
}
