use std::fmt;

/// CEC physical address `a.b.c.d`, one nibble per level of the HDMI tree.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct PhysicalAddress(u16);

impl PhysicalAddress {
    /// The root device (`0.0.0.0`), e.g. a TV.
    pub const ROOT: PhysicalAddress = PhysicalAddress(0x0000);
    /// No valid address (`f.f.f.f`).
    pub const INVALID: PhysicalAddress = PhysicalAddress(0xFFFF);

    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Decode the two address bytes of an HDMI VSDB.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    #[must_use]
    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Address of the device attached to input `port` (1..=15) of this one.
    ///
    /// The port number goes into the nibble below the lowest used one. A
    /// device already at depth four has no room for children and yields
    /// [`PhysicalAddress::INVALID`].
    #[must_use]
    pub fn child(self, port: u8) -> PhysicalAddress {
        if self == Self::INVALID {
            return Self::INVALID;
        }
        // Lowest non-zero nibble, counted in bits; 16 for the root
        let mut used = 0;
        while used < 16 && (self.0 >> used) & 0xF == 0 {
            used += 4;
        }
        if used == 0 {
            return Self::INVALID;
        }
        Self(self.0 | (u16::from(port & 0xF) << (used - 4)))
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:x}.{:x}.{:x}.{:x}",
            self.0 >> 12,
            (self.0 >> 8) & 0xF,
            (self.0 >> 4) & 0xF,
            self.0 & 0xF
        )
    }
}
