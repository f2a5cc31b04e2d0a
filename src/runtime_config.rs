//! Environment-driven runtime configuration.
//!
//! `CASCADE_STACK_SIZE` sets the stack size for connection coroutines,
//! in decimal (`16384`) or hex (`0x4000`). Default: `0x4000` (16 KB).
//! Larger stacks support deeper middleware chains; smaller stacks reduce
//! memory per concurrent connection.

use std::env;

/// Runtime configuration loaded from environment variables, applied to the
/// `may` runtime when an application binds its transport.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for connection coroutines in bytes.
    pub stack_size: usize,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let stack_size = match env::var("CASCADE_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(0x4000)
                } else {
                    val.parse().unwrap_or(0x4000)
                }
            }
            Err(_) => 0x4000,
        };
        RuntimeConfig { stack_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stack_size() {
        env::remove_var("CASCADE_STACK_SIZE");
        assert_eq!(RuntimeConfig::from_env().stack_size, 0x4000);
    }
}
