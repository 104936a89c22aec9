//! Business rules layered over repositories and panel handles.

pub mod billing;
pub mod bot_log;
pub mod event;
pub mod lifecycle;
pub mod panel;
