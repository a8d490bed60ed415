//! Size classes for cover renditions.

use serde::{Deserialize, Serialize};

/// A named rendition of a cover image.
///
/// `Small`, `Medium` and `Large` are byte-size-bounded derived images;
/// `Original` is the as-uploaded file. The size class is not intrinsic to a
/// cover, it only selects which rendition to fetch.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
    Original,
}

impl SizeClass {
    /// Parse the `S`/`M`/`L` URL suffix letter; empty selects the original.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "" => Some(SizeClass::Original),
            "S" | "s" => Some(SizeClass::Small),
            "M" | "m" => Some(SizeClass::Medium),
            "L" | "l" => Some(SizeClass::Large),
            _ => None,
        }
    }

    /// Lowercase letter used in etags and index filenames. Empty for the
    /// original rendition.
    pub fn letter(&self) -> &'static str {
        match self {
            SizeClass::Small => "s",
            SizeClass::Medium => "m",
            SizeClass::Large => "l",
            SizeClass::Original => "",
        }
    }

    /// `s_`-style prefix joined onto archive item and index names. Must
    /// reproduce the on-disk and remote naming bit-exactly.
    pub fn item_prefix(&self) -> &'static str {
        match self {
            SizeClass::Small => "s_",
            SizeClass::Medium => "m_",
            SizeClass::Large => "l_",
            SizeClass::Original => "",
        }
    }

    /// `-S`-style suffix for entry filenames. Empty for the original.
    pub fn entry_suffix(&self) -> &'static str {
        match self {
            SizeClass::Small => "-S",
            SizeClass::Medium => "-M",
            SizeClass::Large => "-L",
            SizeClass::Original => "",
        }
    }

    /// True for the derived renditions that live in local shard archives.
    pub fn is_derived(&self) -> bool {
        !matches!(self, SizeClass::Original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_round_trip() {
        assert_eq!(SizeClass::from_suffix("S"), Some(SizeClass::Small));
        assert_eq!(SizeClass::from_suffix("m"), Some(SizeClass::Medium));
        assert_eq!(SizeClass::from_suffix(""), Some(SizeClass::Original));
        assert_eq!(SizeClass::from_suffix("X"), None);
    }

    #[test]
    fn naming_fragments() {
        assert_eq!(SizeClass::Medium.item_prefix(), "m_");
        assert_eq!(SizeClass::Original.item_prefix(), "");
        assert_eq!(SizeClass::Large.entry_suffix(), "-L");
        assert_eq!(SizeClass::Original.entry_suffix(), "");
    }
}
