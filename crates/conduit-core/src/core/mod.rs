//! Shared error taxonomy (spec §7). The event loop, registry, and
//! autonomous pipeline in `app/` all return `Result<_, CoreError>`.

pub mod error;
