// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunables with environment overrides.

use std::time::Duration;

fn duration_ms(name: &str, default_ms: u64) -> Duration {
    let ms = std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default_ms);
    Duration::from_millis(ms)
}

/// Deadline for a worker's ready announcement after spawn.
pub fn ready_timeout() -> Duration {
    duration_ms("CLERK_READY_TIMEOUT_MS", 10_000)
}

/// Deadline for a worker's reply to one command.
pub fn request_timeout() -> Duration {
    duration_ms("CLERK_REQUEST_TIMEOUT_MS", 30_000)
}

/// Grace period between `SHUTDOWN` and a forced kill.
pub fn shutdown_grace() -> Duration {
    duration_ms("CLERK_SHUTDOWN_GRACE_MS", 10_000)
}

/// Scheduler queue capacity.
pub fn queue_capacity() -> usize {
    std::env::var("CLERK_QUEUE_CAPACITY").ok().and_then(|v| v.parse().ok()).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_apply_without_env() {
        std::env::remove_var("CLERK_READY_TIMEOUT_MS");
        std::env::remove_var("CLERK_QUEUE_CAPACITY");
        assert_eq!(ready_timeout(), Duration::from_secs(10));
        assert_eq!(request_timeout(), Duration::from_secs(30));
        assert_eq!(shutdown_grace(), Duration::from_secs(10));
        assert_eq!(queue_capacity(), 100);
    }

    #[test]
    #[serial]
    fn env_overrides_win() {
        std::env::set_var("CLERK_READY_TIMEOUT_MS", "250");
        std::env::set_var("CLERK_QUEUE_CAPACITY", "7");
        assert_eq!(ready_timeout(), Duration::from_millis(250));
        assert_eq!(queue_capacity(), 7);
        std::env::remove_var("CLERK_READY_TIMEOUT_MS");
        std::env::remove_var("CLERK_QUEUE_CAPACITY");
    }

    #[test]
    #[serial]
    fn garbage_env_falls_back_to_default() {
        std::env::set_var("CLERK_REQUEST_TIMEOUT_MS", "soon");
        assert_eq!(request_timeout(), Duration::from_secs(30));
        std::env::remove_var("CLERK_REQUEST_TIMEOUT_MS");
    }
}
