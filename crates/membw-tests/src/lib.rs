//! Intentionally empty — this crate exists to host black-box scenario tests
//! against the public `membw-core` API under `tests/`.
