//! Plain data types shared across the CORE: sessions, agent model
//! selection, and permission/plan state.

pub mod agent;
pub mod permission;
pub mod plan;
pub mod session;
