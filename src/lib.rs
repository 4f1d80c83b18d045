//! Keyboard navigation, sequential loading and URL state for a Review Board
//! diff viewer.

pub mod action;
pub mod anchor;
pub mod auth;
pub mod config;
pub mod document;
pub mod error;
pub mod fragment;
pub mod keymap;
pub mod queue;
pub mod reviewboard;
pub mod route;
pub mod source;
pub mod viewer;
