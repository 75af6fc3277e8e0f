//! Command handlers grouped by concern.

pub(crate) mod rules;
pub(crate) mod status;
pub(crate) mod verify;
