//! Building libraries from source

pub mod hooks;
pub mod pipeline;

pub use hooks::{BuildHooks, HookSet, NoHooks, PythonWheel, SystemPrerequisites};
pub use pipeline::{BuildPipeline, BuildRequest, BuildStage, InstallPrefix};
