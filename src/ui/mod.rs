//! UI module for consistent CLI output
//!
//! Plain, colored output on terminals and workflow-command aware output
//! (`::group::`, `GITHUB_OUTPUT`) when running as a GitHub Actions step.

mod actions;
mod context;
mod output;

pub use actions::{set_output, LogGroup};
pub use context::UiContext;
pub use output::{
    key_value, outro_success, section, step_info, step_ok, step_ok_detail, step_warn_hint,
};
