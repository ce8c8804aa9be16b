//! Domain entities for penhub.
//!
//! Pure data types with no infrastructure dependencies.  They can be built and
//! tested on any platform without a tablet attached.

/// Device handle and device identity.
pub mod device;

/// Button and scroll values.
pub mod input;

/// Level (axis) types and their value ranges.
pub mod level;
