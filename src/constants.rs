//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Centralized configuration constants for Cacheron.
//!
//! This module provides well-documented constants used throughout the library.
//! All magic numbers are defined here with their purpose and usage context.

// ============================================================================
// Memory Store Constants
// ============================================================================

/// Default capacity for the in-process memory store when not specified.
///
/// Represents 10,000 cache entries. Once full, the least recently used
/// entry is evicted on insert.
pub const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

/// Default cleanup interval for expired memory entries (1 minute).
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

// ============================================================================
// Circuit Breaker Constants
// ============================================================================

/// Default failure threshold for circuit breaker.
///
/// The circuit breaker transitions to open state after this many consecutive failures.
pub const DEFAULT_CIRCUIT_BREAKER_FAILURE_THRESHOLD: u64 = 5;

/// Default open timeout for circuit breaker (60 seconds).
///
/// How long the circuit breaker remains open after the last failure before a
/// single trial call is let through.
pub const DEFAULT_CIRCUIT_BREAKER_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Retry Constants
// ============================================================================

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry (100 milliseconds).
pub const DEFAULT_BASE_DELAY_MS: u64 = 100;

/// Default exponential backoff multiplier.
///
/// Each retry waits `base_delay * multiplier^(attempt - 1)`.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Relative jitter applied to every computed retry delay.
///
/// The actual delay is drawn uniformly from `[delay * 0.75, delay * 1.25]`.
pub const RETRY_JITTER_FACTOR: f64 = 0.25;

// ============================================================================
// Redis Store Constants
// ============================================================================

/// Default key prefix for the Redis store.
///
/// `clear()` only removes keys under this prefix so sibling tenants of the
/// same Redis database are never touched.
pub const DEFAULT_REDIS_KEY_PREFIX: &str = "cacheron:";

/// Batch size used when scanning keys for `clear()`.
pub const REDIS_SCAN_BATCH_SIZE: usize = 500;

// ============================================================================
// Key Validation Constants
// ============================================================================

/// Maximum key length accepted by any store (bytes).
pub const MAX_KEY_LENGTH: usize = 1024;
