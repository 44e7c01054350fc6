// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU variant selection and capability gating.

use std::fmt;
use std::str::FromStr;

use crate::core::registry::InsnFlags;

/// Target instruction-set profile for one assembly run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CpuVariant {
    #[default]
    M6809,
    HD6309,
    /// 6809 with the 6800 source-compatibility mnemonics enabled.
    M6800Compat,
}

impl CpuVariant {
    pub const ALL: [CpuVariant; 3] = [Self::M6809, Self::HD6309, Self::M6800Compat];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M6809 => "6809",
            Self::HD6309 => "6309",
            Self::M6800Compat => "6800",
        }
    }

    /// Returns true if a descriptor carrying `flags` may be used under this variant.
    pub fn allows(&self, flags: InsnFlags) -> bool {
        if flags.contains(InsnFlags::REQUIRES_6309) && *self != Self::HD6309 {
            return false;
        }
        if flags.contains(InsnFlags::REQUIRES_6800) && *self != Self::M6800Compat {
            return false;
        }
        if flags.contains(InsnFlags::REQUIRES_6809) && *self == Self::HD6309 {
            return false;
        }
        true
    }

    pub fn is_6309(&self) -> bool {
        *self == Self::HD6309
    }

    /// Variants under which a descriptor with `flags` is available.
    pub fn supporting(flags: InsnFlags) -> Vec<CpuVariant> {
        Self::ALL
            .iter()
            .copied()
            .filter(|cpu| cpu.allows(flags))
            .collect()
    }
}

impl fmt::Display for CpuVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a CPU name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCpu(pub String);

impl fmt::Display for UnknownCpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown CPU: {} (expected 6809, 6309 or 6800)", self.0)
    }
}

impl std::error::Error for UnknownCpu {}

impl FromStr for CpuVariant {
    type Err = UnknownCpu;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "6809" | "m6809" | "mc6809" => Ok(Self::M6809),
            "6309" | "h6309" | "hd6309" => Ok(Self::HD6309),
            "6800" | "6800compat" | "6800-compat" | "m6800" => Ok(Self::M6800Compat),
            _ => Err(UnknownCpu(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gating_follows_variant_flags() {
        let only_6309 = InsnFlags::REQUIRES_6309;
        assert!(CpuVariant::HD6309.allows(only_6309));
        assert!(!CpuVariant::M6809.allows(only_6309));
        assert!(!CpuVariant::M6800Compat.allows(only_6309));

        let convenience = InsnFlags::REQUIRES_6809 | InsnFlags::CONVENIENCE;
        assert!(CpuVariant::M6809.allows(convenience));
        assert!(CpuVariant::M6800Compat.allows(convenience));
        assert!(!CpuVariant::HD6309.allows(convenience));

        assert!(CpuVariant::M6800Compat.allows(InsnFlags::REQUIRES_6800));
        assert!(!CpuVariant::M6809.allows(InsnFlags::REQUIRES_6800));
        assert!(CpuVariant::M6809.allows(InsnFlags::empty()));
    }

    #[test]
    fn parses_cpu_names() {
        assert_eq!("6309".parse::<CpuVariant>(), Ok(CpuVariant::HD6309));
        assert_eq!("HD6309".parse::<CpuVariant>(), Ok(CpuVariant::HD6309));
        assert_eq!("6800".parse::<CpuVariant>(), Ok(CpuVariant::M6800Compat));
        assert!("z80".parse::<CpuVariant>().is_err());
    }
}
