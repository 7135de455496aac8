//! Parser for v1 duration literals such as `30d`, `1h30m` or `24h0m0s`.

const SECOND: i64 = 1;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

fn unit_seconds(unit: char) -> Option<i64> {
    match unit {
        's' => Some(SECOND),
        'm' => Some(MINUTE),
        'h' => Some(HOUR),
        'd' => Some(DAY),
        'w' => Some(WEEK),
        _ => None,
    }
}

/// Convert a duration literal into seconds.
///
/// The literal is a sequence of `(-?digits)(unit)` tokens without separators.
/// The unit is the last character of the non-digit run after the number, so
/// `5ms` counts as five seconds. Tokens with an unknown unit, a number that
/// does not fit in `i64`, or no unit at all contribute nothing. This never
/// fails; garbled legacy values simply shrink towards zero.
pub fn parse_duration(literal: &str) -> i64 {
    let chars: Vec<char> = literal.chars().collect();
    let mut total: i64 = 0;
    let mut pos = 0;

    while pos < chars.len() {
        let mut cursor = pos;
        if chars[cursor] == '-' {
            cursor += 1;
        }
        let digits_start = cursor;
        while cursor < chars.len() && chars[cursor].is_ascii_digit() {
            cursor += 1;
        }
        if cursor == digits_start {
            pos += 1;
            continue;
        }
        let number: String = chars[pos..cursor].iter().collect();

        let unit_start = cursor;
        while cursor < chars.len() && chars[cursor] != '-' && !chars[cursor].is_ascii_digit() {
            cursor += 1;
        }
        if cursor == unit_start {
            // number without a unit, rescan from where it ended
            pos = cursor;
            continue;
        }

        let unit = chars[cursor - 1];
        if let (Ok(value), Some(seconds)) = (number.parse::<i64>(), unit_seconds(unit)) {
            total = total.saturating_add(value.saturating_mul(seconds));
        }
        pos = cursor;
    }

    total
}
