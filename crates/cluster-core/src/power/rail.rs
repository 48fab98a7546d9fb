use core::fmt;
use core::ops::BitOr;

/// Latched fault flags reported by the power management chip.
///
/// Any flag is fatal: the frame loop stops and the diagnostic lines are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerRailFaults(u8);

impl PowerRailFaults {
    pub const LDO_OVER_CURRENT: Self = Self(1 << 0);
    pub const BATFET_OVER_CURRENT: Self = Self(1 << 1);
    pub const BATTERY_OVER_VOLTAGE: Self = Self(1 << 2);
    pub const WARNING_LEVEL1: Self = Self(1 << 3);
    pub const WARNING_LEVEL2: Self = Self(1 << 4);

    const DESCRIPTIONS: [(Self, &'static str); 5] = [
        (Self::LDO_OVER_CURRENT, "LDO over-current"),
        (Self::BATFET_OVER_CURRENT, "BATFET over-current"),
        (Self::BATTERY_OVER_VOLTAGE, "Battery over-voltage"),
        (Self::WARNING_LEVEL1, "Warning level 1 (low battery)"),
        (Self::WARNING_LEVEL2, "Warning level 2 (critical battery)"),
    ];

    const ALL_BITS: u8 = 0b1_1111;

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Unknown bits are dropped.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL_BITS)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// One human-readable line per raised flag.
    pub fn lines(self) -> impl Iterator<Item = &'static str> {
        Self::DESCRIPTIONS
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, text)| text)
    }
}

impl BitOr for PowerRailFaults {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for PowerRailFaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (i, line) in self.lines().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}
