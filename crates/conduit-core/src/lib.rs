//! conduit-core: the session registry, event loop, prompt state machines and
//! autonomous pipeline driving many concurrent AI coding assistant runners,
//! each bound to an isolated git worktree.
//!
//! This crate never renders a UI, never shells out to git/gh directly, and
//! never speaks to a specific AI CLI's wire protocol. Those concerns live
//! behind the traits in [`collab`]; callers supply concrete adapters (see
//! [`infra`] for the ones this crate ships) and drive everything else through
//! [`core`].

pub mod app;
pub mod collab;
pub mod core;
pub mod domain;
pub mod infra;
