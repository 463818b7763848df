//! Key codes, modifier sets, and the `"Ctrl + Alt + F1"` style hotkey strings shared with settings and the UI

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::ComboParseError;



/// What the management list shows (and settings may hold) for a window without a shortcut
pub const NONE_DISPLAY : &str = "Ninguno";



bitflags! {
    /// Modifier set for a hotkey .. the bit values line up with the win32 `MOD_*` flags
    # [ derive (Debug, Default, Clone, Copy, PartialEq, Eq, Hash) ]
    pub struct Modifiers : u32 {
        const ALT   = 0x0001;
        const CTRL  = 0x0002;
        const SHIFT = 0x0004;
    }
}

impl Modifiers {
    fn from_modifier_name (name:&str) -> Option<Modifiers> {
        match name.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Some (Modifiers::CTRL),
            "alt"              => Some (Modifiers::ALT),
            "shift"            => Some (Modifiers::SHIFT),
            _ => None
        }
    }
}



# [ derive (Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord) ]
/// A (non-modifier) virtual-key code
pub struct VKey (u32);

// named keys outside the contiguous ranges handled in code
const NAMED_KEYS : &[(&str, u32)] = &[
    ("Back",        0x08),  ("Tab",        0x09),  ("Enter",      0x0D),  ("Pause",      0x13),
    ("CapsLock",    0x14),  ("Escape",     0x1B),  ("Space",      0x20),  ("PageUp",     0x21),
    ("PageDown",    0x22),  ("End",        0x23),  ("Home",       0x24),  ("Left",       0x25),
    ("Up",          0x26),  ("Right",      0x27),  ("Down",       0x28),  ("PrintScreen",0x2C),
    ("Insert",      0x2D),  ("Delete",     0x2E),  ("Multiply",   0x6A),  ("Add",        0x6B),
    ("Separator",   0x6C),  ("Subtract",   0x6D),  ("Decimal",    0x6E),  ("Divide",     0x6F),
    ("NumLock",     0x90),  ("Scroll",     0x91),
    ("OemSemicolon",0xBA),  ("OemPlus",    0xBB),  ("OemComma",   0xBC),  ("OemMinus",   0xBD),
    ("OemPeriod",   0xBE),  ("OemQuestion",0xBF),  ("OemTilde",   0xC0),  ("OemOpenBrackets", 0xDB),
    ("OemPipe",     0xDC),  ("OemCloseBrackets",  0xDD),  ("OemQuotes",  0xDE),
];

// alternate spellings we accept when parsing (the left side is never emitted)
const KEY_ALIASES : &[(&str, &str)] = &[
    ("Return", "Enter"),  ("Esc", "Escape"),  ("Backspace", "Back"),  ("Capital", "CapsLock"),
    ("Prior", "PageUp"),  ("Next", "PageDown"),  ("Snapshot", "PrintScreen"),  ("Del", "Delete"),
    ("Ins", "Insert"),  ("Oem1", "OemSemicolon"),  ("Oem2", "OemQuestion"),  ("Oem3", "OemTilde"),
    ("Oem4", "OemOpenBrackets"),  ("Oem5", "OemPipe"),  ("Oem6", "OemCloseBrackets"),  ("Oem7", "OemQuotes"),
];

impl VKey {

    pub const TAB    : VKey = VKey (0x09);
    pub const ENTER  : VKey = VKey (0x0D);
    pub const ESCAPE : VKey = VKey (0x1B);
    pub const SPACE  : VKey = VKey (0x20);

    /// Wraps a raw virtual-key code, rejecting modifier keys and codes we have no name for
    pub fn from_code (code:u32) -> Option<VKey> {
        Self::code_name (code) .map (|_| VKey (code))
    }

    /// Function key F1 ..= F24
    pub fn f (n:u32) -> Option<VKey> {
        if (1..=24).contains(&n) { Some (VKey (0x6F + n)) } else { None }
    }
    /// Letter key from an ascii letter (either case)
    pub fn letter (c:char) -> Option<VKey> {
        if c.is_ascii_alphabetic() { Some (VKey (c.to_ascii_uppercase() as u32)) } else { None }
    }
    /// Top-row digit key
    pub fn digit (d:u32) -> Option<VKey> {
        if d <= 9 { Some (VKey (0x30 + d)) } else { None }
    }

    pub fn code (&self) -> u32 { self.0 }

    /// Keys that end a hotkey capture without assigning anything
    pub fn cancels_capture (&self) -> bool {
        matches! (*self, VKey::TAB | VKey::ENTER | VKey::ESCAPE)
    }

    pub fn name (&self) -> String {
        Self::code_name (self.0) .unwrap_or_default()
    }

    fn code_name (code:u32) -> Option<String> {
        match code {
            0x30 ..= 0x39 => Some (format! ("D{}", code - 0x30)),
            0x41 ..= 0x5A => char::from_u32(code) .map (|c| c.to_string()),
            0x60 ..= 0x69 => Some (format! ("NumPad{}", code - 0x60)),
            0x70 ..= 0x87 => Some (format! ("F{}", code - 0x6F)),
            _ => NAMED_KEYS .iter() .find (|(_,c)| *c == code) .map (|(n,_)| n.to_string())
        }
    }

    /// Parses a key name (case-insensitive) .. accepts WPF style names like `D1`, `NumPad3`, `Return`
    pub fn from_name (name:&str) -> Option<VKey> {
        let name = name.trim();
        if name.is_empty() { return None }
        let name = KEY_ALIASES .iter() .find (|(a,_)| a.eq_ignore_ascii_case(name)) .map (|(_,n)| *n) .unwrap_or(name);
        let lower = name.to_ascii_lowercase();

        if lower.len() == 1 {
            let c = lower.chars().next()?;
            if c.is_ascii_alphabetic() { return VKey::letter(c) }
            if let Some(d) = c.to_digit(10) { return VKey::digit(d) }
            return None
        }
        if let Some(d) = lower.strip_prefix("numpad") .and_then (|s| s.parse::<u32>().ok()) {
            return if d <= 9 { Some (VKey (0x60 + d)) } else { None }
        }
        if let Some(n) = lower.strip_prefix('f') .and_then (|s| s.parse::<u32>().ok()) {
            return VKey::f(n)
        }
        if let Some(d) = lower.strip_prefix('d') .filter (|s| s.len() == 1) .and_then (|s| s.parse::<u32>().ok()) {
            return VKey::digit(d)
        }
        NAMED_KEYS .iter() .find (|(n,_)| n.eq_ignore_ascii_case(name)) .map (|(_,c)| VKey (*c))
    }
}

impl fmt::Display for VKey {
    fn fmt (&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str (&self.name())
    }
}



# [ derive (Debug, Clone, Copy, PartialEq, Eq, Hash) ]
/// A full hotkey combination : a modifier set plus one non-modifier key
pub struct HotkeyCombo {
    pub modifiers : Modifiers,
    pub key       : VKey,
}

impl HotkeyCombo {

    pub fn new (modifiers:Modifiers, key:VKey) -> HotkeyCombo {
        HotkeyCombo { modifiers, key }
    }

    /// Parses a settings/display string, treating empty and `"Ninguno"` as 'no hotkey'
    pub fn parse_optional (s:&str) -> Result <Option<HotkeyCombo>, ComboParseError> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case(NONE_DISPLAY) { return Ok(None) }
        s.parse::<HotkeyCombo>() .map (Some)
    }

    /// Display string for an optional combo, empty when there is none
    pub fn display_or_empty (combo:Option<&HotkeyCombo>) -> String {
        combo .map (|c| c.to_string()) .unwrap_or_default()
    }
}

impl FromStr for HotkeyCombo {
    type Err = ComboParseError;

    fn from_str (s:&str) -> Result<Self, Self::Err> {
        let parts = s.split('+') .map (|p| p.trim()) .filter (|p| !p.is_empty()) .collect::<Vec<&str>>();
        let (key_part, mod_parts) = parts .split_last() .ok_or (ComboParseError::Empty)?;

        let mut modifiers = Modifiers::empty();
        for m in mod_parts {
            modifiers |= Modifiers::from_modifier_name(m) .ok_or_else (|| ComboParseError::UnknownModifier (m.to_string()))?;
        }
        if Modifiers::from_modifier_name(key_part).is_some() {
            return Err (ComboParseError::ModifierOnly)
        }
        let key = VKey::from_name(key_part) .ok_or_else (|| ComboParseError::UnknownKey (key_part.to_string()))?;
        Ok (HotkeyCombo { modifiers, key })
    }
}

impl fmt::Display for HotkeyCombo {
    fn fmt (&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // fixed modifier order : Ctrl, Alt, Shift
        if self.modifiers.contains(Modifiers::CTRL)  { f.write_str ("Ctrl + ")? }
        if self.modifiers.contains(Modifiers::ALT)   { f.write_str ("Alt + ")? }
        if self.modifiers.contains(Modifiers::SHIFT) { f.write_str ("Shift + ")? }
        write! (f, "{}", self.key)
    }
}
