/// Device and renderer configuration

/// Which validation messages are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Where validation messages are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    /// Through the engine logger
    Console,
    /// Appended to a file
    File(String),
    /// Both the engine logger and a file
    Both(String),
}

/// Validation message categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Counters collected by the validation callback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

/// Presentation mode preference
///
/// Unsupported preferences fall back to `Fifo`, which every surface supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentMode {
    Fifo,
    Mailbox,
    Immediate,
}

/// Configuration for device creation and the frame loop
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Enable validation layers (requires the backend's validation feature)
    pub enable_validation: bool,
    pub debug_severity: DebugSeverity,
    pub debug_output: DebugOutput,
    pub debug_message_filter: DebugMessageFilter,
    /// Trigger a debugger break on validation errors
    pub break_on_validation_error: bool,
    /// Panic on the first validation error
    pub panic_on_error: bool,
    /// Count validation messages (see `ValidationStats`)
    pub enable_validation_stats: bool,
    pub present_mode: PresentMode,
    /// Bytes reserved up front for the deferred command queue
    pub command_queue_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Flare Application".to_string(),
            app_version: (1, 0, 0),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_output: DebugOutput::Console,
            debug_message_filter: DebugMessageFilter::default(),
            break_on_validation_error: false,
            panic_on_error: false,
            enable_validation_stats: false,
            present_mode: PresentMode::Mailbox,
            command_queue_bytes: 5 * 1024 * 1024,
        }
    }
}
