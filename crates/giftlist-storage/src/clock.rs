//! Every stored timestamp is Unix epoch milliseconds.

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
