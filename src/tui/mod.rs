//! TUI module for terminal user interfaces

mod validator_view;

pub use validator_view::ValidatorApp;
