//! Button and scroll values handed to the event scheduler.
//!
//! Both types are small `Copy` values: a provider builds a fresh one for every
//! scheduled event and moves it into the scheduler call.

/// Which button changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonKind {
    /// Primary button; the pen tip on tablets.
    Left,
    /// Middle button; the lower barrel button on tablets.
    Center,
    /// Secondary button; the upper barrel button on tablets.
    Right,
    /// Any further tablet button, by bit index.
    Custom(u8),
}

impl ButtonKind {
    /// Maps a tablet button bit index to a button.
    ///
    /// Bits 0, 1 and 2 are the tip and the two barrel buttons; everything above
    /// is reported as [`ButtonKind::Custom`].
    pub fn from_tablet_bit(bit: u8) -> Self {
        match bit {
            0 => ButtonKind::Left,
            1 => ButtonKind::Center,
            2 => ButtonKind::Right,
            n => ButtonKind::Custom(n),
        }
    }
}

/// A button press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Button {
    pub kind: ButtonKind,
    pub pressed: bool,
}

impl Button {
    pub fn new(kind: ButtonKind, pressed: bool) -> Self {
        Self { kind, pressed }
    }
}

/// Scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// One scroll step of `value` units in `direction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scroll {
    pub direction: ScrollDirection,
    pub value: u32,
}

impl Scroll {
    pub fn new(direction: ScrollDirection, value: u32) -> Self {
        Self { direction, value }
    }

    /// Converts a signed wheel delta (positive = away from the user) into a
    /// scroll value.  Returns `None` for a zero delta.
    pub fn from_wheel_delta(delta: i32) -> Option<Self> {
        match delta {
            0 => None,
            d if d > 0 => Some(Self::new(ScrollDirection::Up, d.unsigned_abs())),
            d => Some(Self::new(ScrollDirection::Down, d.unsigned_abs())),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
