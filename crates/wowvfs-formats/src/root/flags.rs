//! Locale and content flags carried by root manifest blocks

use std::fmt;
use std::ops::BitOr;

/// Locale bit mask of a root block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LocaleFlags(pub u32);

impl LocaleFlags {
    /// No locale filter
    pub const NONE: Self = Self(0);
    /// English (United States)
    pub const ENUS: Self = Self(0x2);
    /// Korean
    pub const KOKR: Self = Self(0x4);
    /// French
    pub const FRFR: Self = Self(0x10);
    /// German
    pub const DEDE: Self = Self(0x20);
    /// Chinese (Simplified)
    pub const ZHCN: Self = Self(0x40);
    /// Spanish (Spain)
    pub const ESES: Self = Self(0x80);
    /// Chinese (Traditional)
    pub const ZHTW: Self = Self(0x100);
    /// English (Great Britain)
    pub const ENGB: Self = Self(0x200);
    /// English (China)
    pub const ENCN: Self = Self(0x400);
    /// English (Taiwan)
    pub const ENTW: Self = Self(0x800);
    /// Spanish (Mexico)
    pub const ESMX: Self = Self(0x1000);
    /// Russian
    pub const RURU: Self = Self(0x2000);
    /// Portuguese (Brazil)
    pub const PTBR: Self = Self(0x4000);
    /// Italian
    pub const ITIT: Self = Self(0x8000);
    /// Portuguese (Portugal)
    pub const PTPT: Self = Self(0x10000);
    /// Every locale
    pub const ALL: Self = Self(0xFFFF_FFFF);

    const CODES: [(&'static str, Self); 15] = [
        ("enUS", Self::ENUS),
        ("koKR", Self::KOKR),
        ("frFR", Self::FRFR),
        ("deDE", Self::DEDE),
        ("zhCN", Self::ZHCN),
        ("esES", Self::ESES),
        ("zhTW", Self::ZHTW),
        ("enGB", Self::ENGB),
        ("enCN", Self::ENCN),
        ("enTW", Self::ENTW),
        ("esMX", Self::ESMX),
        ("ruRU", Self::RURU),
        ("ptBR", Self::PTBR),
        ("itIT", Self::ITIT),
        ("ptPT", Self::PTPT),
    ];

    /// Map a locale code such as `enUS` to its flag.
    ///
    /// Unknown codes map to [`LocaleFlags::NONE`], which disables locale
    /// filtering instead of failing.
    pub fn from_code(code: &str) -> Self {
        Self::CODES
            .iter()
            .find(|(name, _)| *name == code)
            .map_or(Self::NONE, |(_, flag)| *flag)
    }

    /// Locale code of a single-bit flag
    pub fn code(self) -> Option<&'static str> {
        Self::CODES
            .iter()
            .find(|(_, flag)| *flag == self)
            .map(|(name, _)| *name)
    }

    /// Whether no filter is applied
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Whether the two masks share a bit
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for LocaleFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for LocaleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code() {
            Some(code) => f.write_str(code),
            None => write!(f, "0x{:08x}", self.0),
        }
    }
}

/// Content bit mask of a root block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContentFlags(pub u32);

impl ContentFlags {
    /// No flags
    pub const NONE: Self = Self(0);
    /// Loaded on Windows clients
    pub const LOAD_ON_WINDOWS: Self = Self(0x8);
    /// Loaded on macOS clients
    pub const LOAD_ON_MAC: Self = Self(0x10);
    /// Low-violence variant
    pub const LOW_VIOLENCE: Self = Self(0x80);
    /// Never loaded by the client
    pub const DO_NOT_LOAD: Self = Self(0x100);
    /// Blob is encrypted
    pub const ENCRYPTED: Self = Self(0x0800_0000);
    /// Block carries no name hashes
    pub const NO_NAME_HASH: Self = Self(0x1000_0000);

    /// Check whether every bit of `flag` is set
    pub const fn has(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl BitOr for ContentFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
