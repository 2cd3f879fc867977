//! Math types used for placing instantiated objects.

pub use glam::{Quat, Vec3};
