/// Vulkan debug messenger - routes validation layer messages
///
/// Messages are filtered by severity and category, counted, grouped by
/// text, and forwarded to the engine logger and/or appended to a file.

use ash::vk;
use colored::*;
use flare_render::flare::log::LogSeverity;
use flare_render::flare::render::{Config, DebugMessageFilter, DebugOutput, DebugSeverity, ValidationStats};
use flare_render::flare::{Engine, Error, Result};
use flare_render::engine_error;
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

const SOURCE: &str = "flare::vulkan::validation";

/// Callback settings, taken from the engine config at device creation
static DEBUG_SETTINGS: Mutex<Option<DebugSettings>> = Mutex::new(None);

static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrences per message text
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

#[derive(Clone)]
struct DebugSettings {
    severity: DebugSeverity,
    output: DebugOutput,
    message_filter: DebugMessageFilter,
    break_on_error: bool,
    panic_on_error: bool,
    enable_stats: bool,
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn record(&self, severity: LogSeverity) {
        let counter = match severity {
            LogSeverity::Error => &self.errors,
            LogSeverity::Warn => &self.warnings,
            LogSeverity::Info => &self.info,
            LogSeverity::Debug | LogSeverity::Trace => &self.verbose,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Install the callback settings and clear previous statistics
pub(crate) fn init_debug_config(config: &Config) {
    VALIDATION_STATS.reset();

    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = Some(FxHashMap::default());
    }

    if let Ok(mut settings) = DEBUG_SETTINGS.lock() {
        *settings = Some(DebugSettings {
            severity: config.debug_severity,
            output: config.debug_output.clone(),
            message_filter: config.debug_message_filter,
            break_on_error: config.break_on_validation_error,
            panic_on_error: config.panic_on_error,
            enable_stats: config.enable_validation_stats,
        });
    }
}

/// Drop the callback settings; later messages are ignored
pub(crate) fn cleanup_debug_config() {
    if let Ok(mut settings) = DEBUG_SETTINGS.lock() {
        *settings = None;
    }
    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = None;
    }
}

/// Create the debug messenger for `instance`
pub(crate) unsafe fn create_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
    config: &Config,
) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    init_debug_config(config);

    let loader = ash::ext::debug_utils::Instance::new(entry, instance);
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(severity_flags(config.debug_severity))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback));

    let messenger = loader
        .create_debug_utils_messenger(&create_info, None)
        .map_err(|e| {
            engine_error!("flare::vulkan", "Failed to create debug messenger: {:?}", e);
            Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
        })?;

    Ok((loader, messenger))
}

/// Counters of the messages received since device creation
pub fn validation_stats() -> ValidationStats {
    VALIDATION_STATS.snapshot()
}

/// Print the validation statistics to stdout
pub fn print_validation_stats_report() {
    let stats = validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "✓ No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());

    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }

    println!("  {} {}", "Total:".white().bold(), stats.total());

    if let Ok(tracker) = MESSAGE_TRACKER.lock() {
        let repeated = tracker
            .as_ref()
            .map(|messages| messages.values().filter(|&&count| count > 1).count())
            .unwrap_or(0);
        if repeated > 0 {
            println!("\n  {} {} message(s) appeared multiple times", "ℹ".cyan(), repeated);
        }
    }

    println!("{}\n", "====================================".bright_blue().bold());
}

// ===== FILTERING =====

/// Severities the messenger is registered for
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    use vk::DebugUtilsMessageSeverityFlagsEXT as S;
    match severity {
        DebugSeverity::ErrorsOnly => S::ERROR,
        DebugSeverity::ErrorsAndWarnings => S::ERROR | S::WARNING,
        DebugSeverity::All => S::ERROR | S::WARNING | S::INFO | S::VERBOSE,
    }
}

pub(crate) fn passes_severity(severity: DebugSeverity, flags: vk::DebugUtilsMessageSeverityFlagsEXT) -> bool {
    severity_flags(severity).intersects(flags)
}

pub(crate) fn passes_category(filter: &DebugMessageFilter, message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> bool {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        filter.show_validation
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        filter.show_performance
    } else {
        filter.show_general
    }
}

pub(crate) fn category_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

/// Engine log severity for the most severe bit of `flags`
pub(crate) fn log_severity(flags: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Info
    } else {
        LogSeverity::Debug
    }
}

fn track_message(message: &str) -> u32 {
    let Ok(mut tracker) = MESSAGE_TRACKER.lock() else {
        return 1;
    };
    let count = tracker
        .get_or_insert_with(FxHashMap::default)
        .entry(message.to_string())
        .or_insert(0);
    *count += 1;
    *count
}

// ===== CALLBACK =====

unsafe fn c_str_or<'a>(ptr: *const std::os::raw::c_char, fallback: &'a str) -> &'a str {
    if ptr.is_null() {
        fallback
    } else {
        CStr::from_ptr(ptr).to_str().unwrap_or("Invalid UTF-8")
    }
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = &*p_callback_data;
    let message_id_name = c_str_or(callback_data.p_message_id_name, "Unknown");
    let message = c_str_or(callback_data.p_message, "No message");

    let settings = match DEBUG_SETTINGS.lock() {
        Ok(guard) => match guard.as_ref() {
            Some(settings) => settings.clone(),
            None => return vk::FALSE,
        },
        Err(_) => return vk::FALSE,
    };

    if !passes_severity(settings.severity, message_severity)
        || !passes_category(&settings.message_filter, message_type)
    {
        return vk::FALSE;
    }

    let severity = log_severity(message_severity);
    let category = category_label(message_type);

    let occurrences = if settings.enable_stats {
        VALIDATION_STATS.record(severity);
        track_message(message)
    } else {
        1
    };
    let repeat = if occurrences > 1 {
        format!(" [×{}]", occurrences)
    } else {
        String::new()
    };

    let text = format!("[{}]{} {}: {}", category, repeat, message_id_name, message);
    match &settings.output {
        DebugOutput::Console => Engine::log(severity, SOURCE, text),
        DebugOutput::File(path) => write_to_file(path, severity, &text),
        DebugOutput::Both(path) => {
            write_to_file(path, severity, &text);
            Engine::log(severity, SOURCE, text);
        }
    }

    if severity == LogSeverity::Error {
        if settings.panic_on_error {
            panic!(
                "Validation error (panic_on_error)\n  Message ID: {}\n  Type: {}\n  Message: {}",
                message_id_name, category, message
            );
        }
        if settings.break_on_error {
            eprintln!(
                "\n{}\n  Context: {} [{}]\n  Message: {}\n",
                "BREAK ON VALIDATION ERROR - aborting".red().bold(),
                message_id_name.yellow(),
                category.cyan(),
                message.white()
            );
            std::process::abort();
        }
    }

    vk::FALSE
}

fn write_to_file(path: &str, severity: LogSeverity, text: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "[VULKAN {:?}] {}", severity, text);
    }
}
