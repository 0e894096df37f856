//! Flutter-facing bridge over `balanceos_core`.

pub mod api;
