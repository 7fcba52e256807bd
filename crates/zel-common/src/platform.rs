/// Id of the current process.
pub fn process_id() -> u32 {
    std::process::id()
}

/// Platform file name for a versioned shared library,
/// e.g. `libze_intel_gpu.so.1` or `ze_intel_gpu1.dll`.
pub fn library_file_name(stem: &str, major: u32) -> String {
    #[cfg(windows)]
    {
        format!("{}{}.dll", stem, major)
    }
    #[cfg(target_os = "macos")]
    {
        format!("lib{}.{}.dylib", stem, major)
    }
    #[cfg(not(any(windows, target_os = "macos")))]
    {
        format!("lib{}.so.{}", stem, major)
    }
}

/// Interpret an environment value as a boolean switch.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// True when the named variable is set to a truthy value.
pub fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| parse_flag(&v)).unwrap_or(false)
}
