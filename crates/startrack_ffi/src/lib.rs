//! Flutter-facing bindings over `startrack_core`.

pub mod api;
