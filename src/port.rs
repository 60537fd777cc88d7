use std::fmt;

/// Index of a physical HDMI input port.
///
/// Port 0 is the first connector. The EDID composer derives each port's
/// physical address from this index (port 0 becomes child nibble 1).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct InputPort(u8);

impl InputPort {
    /// Highest number of ports a single receiver can describe in its physical
    /// address space.
    pub const MAX: u8 = 3;

    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Nibble value this port occupies in a child physical address.
    #[inline]
    #[must_use]
    pub const fn address_nibble(self) -> u8 {
        self.0 + 1
    }
}

impl fmt::Display for InputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port {}", self.0)
    }
}
