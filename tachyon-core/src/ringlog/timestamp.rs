//! Local-time timestamps for log entries: `YYYY-MM-DD HH:MM:SS.nnnnnnnnn`
//!
//! Formatting the calendar part is the expensive piece, so each producer
//! thread caches it and only re-renders when the wall-clock second changes.

use chrono::{DateTime, Local};
use std::cell::RefCell;
use std::fmt::Write as _;

const SECONDS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

struct Cache {
    second: i64,
    prefix_len: usize,
    buf: String,
}

thread_local! {
    static CACHE: RefCell<Cache> = RefCell::new(Cache {
        second: i64::MIN,
        prefix_len: 0,
        buf: String::with_capacity(32),
    });
}

/// Render `ts` and hand the text to `f` without allocating
pub fn with_formatted<R>(ts: &DateTime<Local>, f: impl FnOnce(&str) -> R) -> R {
    CACHE.with(|cell| {
        let mut cache = cell.borrow_mut();
        let second = ts.timestamp();

        if cache.second != second {
            cache.buf.clear();
            let _ = write!(cache.buf, "{}", ts.format(SECONDS_FORMAT));
            cache.prefix_len = cache.buf.len();
            cache.second = second;
        }

        let prefix_len = cache.prefix_len;
        cache.buf.truncate(prefix_len);
        // Leap seconds report nanos >= 1e9
        let nanos = ts.timestamp_subsec_nanos().min(999_999_999);
        let _ = write!(cache.buf, ".{:09}", nanos);

        f(&cache.buf)
    })
}

/// Owned rendering of `ts`
pub fn format(ts: &DateTime<Local>) -> String {
    with_formatted(ts, str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64, nanos: u32) -> DateTime<Local> {
        Local.timestamp_opt(secs, nanos).unwrap()
    }

    #[test]
    fn test_layout() {
        let text = format(&at(1_700_000_000, 5));
        assert_eq!(text.len(), "2023-11-14 22:13:20.000000005".len());
        assert!(text.ends_with(".000000005"));
        assert_eq!(&text[4..5], "-");
        assert_eq!(&text[10..11], " ");
        assert_eq!(&text[19..20], ".");
    }

    #[test]
    fn test_cache_matches_chrono_across_seconds() {
        for (secs, nanos) in [
            (1_700_000_000, 1),
            (1_700_000_000, 999_999_999),
            (1_700_000_001, 0),
            (1_700_000_000, 42),
        ] {
            let ts = at(secs, nanos);
            let expected = ts.format("%Y-%m-%d %H:%M:%S%.9f").to_string();
            assert_eq!(format(&ts), expected);
        }
    }
}
