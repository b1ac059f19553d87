//! Fixed test IDs and data for deterministic tests

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

// Identity IDs that are never registered (1-99)
pub const TEST_UNKNOWN_ID: Uuid = Uuid::from_u128(1);
pub const TEST_UNKNOWN_ID_2: Uuid = Uuid::from_u128(2);

// Emails
pub const TEST_EMAIL_ALICE: &str = "alice@example.com";
pub const TEST_EMAIL_BOB: &str = "bob@example.com";
pub const TEST_EMAIL_CHARLIE: &str = "charlie@example.com";

/// Lowest accepted bcrypt cost; keeps hashing fast in tests.
pub const TEST_BCRYPT_COST: u32 = 10;

/// Fixed starting instant for clocks that need reproducible timestamps.
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
