// Two timestamp forms: 7-byte binary (directory records) and 17-byte ASCII
// (volume descriptors). Always UTC with a zero GMT offset.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// 7-byte directory record datetime.
///
/// Years outside 1900..=2155 do not fit the one-byte field and are clamped.
pub fn record_datetime(time: &DateTime<Utc>) -> [u8; 7] {
    let year = time.year().clamp(1900, 2155);
    if year != time.year() {
        return if year == 1900 {
            [0, 1, 1, 0, 0, 0, 0]
        } else {
            [255, 12, 31, 23, 59, 59, 0]
        };
    }
    [
        (year - 1900) as u8,
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        // Leap seconds show up as second 59 + 1s of nanos
        time.second().min(59) as u8,
        0, // GMT offset in 15-minute intervals
    ]
}

/// 17-byte volume descriptor datetime: `YYYYMMDDHHMMSScc` + GMT offset byte.
pub fn volume_datetime(time: &DateTime<Utc>) -> [u8; 17] {
    let year = time.year().clamp(1, 9999);
    let hundredths = (time.nanosecond() % 1_000_000_000) / 10_000_000;
    let text = format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}{:02}",
        year,
        time.month(),
        time.day(),
        time.hour(),
        time.minute(),
        time.second().min(59),
        hundredths
    );

    let mut out = [0u8; 17];
    out[..16].copy_from_slice(text.as_bytes());
    out[16] = 0;
    out
}
