/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a Snowflake-style i64 for use as resource ID.
///
/// Layout (53 bits, fits in JavaScript's Number.MAX_SAFE_INTEGER):
///   - 41 bits: milliseconds since 2024-01-01 UTC (~69 years)
///   - 12 bits: random (4096 values per ms, collision-free at office scale)
pub fn snowflake_id() -> i64 {
    use rand::Rng;
    // Custom epoch: 2024-01-01 00:00:00 UTC
    const EPOCH_MS: i64 = 1_704_067_200_000;
    let now = now_millis();
    let ts = (now - EPOCH_MS) & 0x1FF_FFFF_FFFF; // 41 bits
    let rand_bits: i64 = rand::thread_rng().gen_range(0..0x1000); // 12 bits
    (ts << 12) | rand_bits
}

/// Calendar year of a millisecond UTC timestamp
pub fn year_of(millis: i64) -> u32 {
    use chrono::Datelike;
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.year() as u32)
        .unwrap_or(1970)
}

/// (year, month 1-12) of a millisecond UTC timestamp
pub fn year_month_of(millis: i64) -> (u32, u32) {
    use chrono::Datelike;
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| (dt.year() as u32, dt.month()))
        .unwrap_or((1970, 1))
}
