//! Concrete adapters. Everything here either persists state (`db`,
//! `config_service`), shells out to `git`/`gh` (`git`, `git_service`), reads
//! the desktop clipboard (`clipboard`), or guards the single-instance
//! process lock (`lock`). Collaborator trait objects used by `core/` are
//! constructed from these in the composition root (`app/`).

pub mod clipboard;
pub mod config_service;
pub mod db;
pub mod git;
pub mod git_service;
pub mod lock;
