//! Coordination core of the jarvis assistant shell.
//!
//! Independent processes (desktop or web front ends, the command backend, the
//! image worker) share state through file-backed channels in [`channel`] and
//! turn captured utterances into concurrent capability calls via [`intent`]
//! and [`dispatch`].

pub mod bridge;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod intent;
pub mod services;
pub mod text_processing;
pub mod web;
