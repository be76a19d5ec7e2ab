//! Capacity policies
//!
//! Capacity is injected as configuration when the policy is built; nothing
//! here reads global state.

pub mod capacity;

pub use capacity::{CapacityPolicy, FixedCapacity, LessonCapacity};
