// Public API
pub mod cli;
pub mod commands;
pub mod script;

// Core domain types
mod bootstrap;
mod config;
mod environment;
mod tool;
mod ui;

// Re-export main types
pub use bootstrap::{
    fallback_temp_path, resolve_tool_root, Bootstrap, BootstrapError, BootstrapState,
    Bootstrapper, Degradation, TOOL_ROOT_VAR,
};
pub use config::{
    BootstrapConfiguration, ConfigFile, Overrides, PackageSection, ToolSection, CONFIG_ENV,
    DEFAULT_TOOL_ROOT,
};
pub use environment::{Assignment, Environment, EnvironmentDelta, Shell};
pub use tool::{CmtExecutable, CmtTool, Mode, ToolError, ToolRequest};
