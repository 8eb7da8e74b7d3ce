use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

/// Combined-style access log line:
/// `ADDRESS - - [TIMESTAMP] "METHOD PATH PROTOCOL" STATUS SIZE`
static LOG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\S+) - - \[([^\]]+)\] "([^"]*)" (\d+) (\d+)"#)
        .expect("log line pattern is valid")
});

const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S";

/// One successfully parsed access-log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub addr: String,
    pub timestamp: NaiveDateTime,
    pub request: String,
    pub status: u16,
    pub size: u64,
}

impl LogRecord {
    /// Daily aggregation key, `YYYY-MM-DD`.
    pub fn date_key(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }

    /// Hour-of-day aggregation key, `"00".."23"`.
    pub fn hour_key(&self) -> String {
        self.timestamp.format("%H").to_string()
    }
}

/// Parse a single log line.
///
/// Returns `None` for lines that do not match the expected pattern or whose
/// timestamp fails to parse. Log files routinely contain partial lines (for
/// example a truncated last line after a crash), so a non-match is a skip,
/// never an error. The timezone offset in the timestamp is ignored; the
/// derived keys use the local time as written.
pub fn parse_line(line: &str) -> Option<LogRecord> {
    let caps = LOG_LINE.captures(line)?;

    // "10/Mar/2024:14:22:05 +0000" - drop the zone offset before parsing
    let raw_timestamp = caps[2].split_whitespace().next()?;
    let timestamp = NaiveDateTime::parse_from_str(raw_timestamp, TIMESTAMP_FORMAT).ok()?;

    Some(LogRecord {
        addr: caps[1].to_string(),
        timestamp,
        request: caps[3].to_string(),
        status: caps[4].parse().ok()?,
        size: caps[5].parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_line() {
        let line = r#"203.0.113.7 - - [10/Mar/2024:14:22:05 +0000] "GET /index.html HTTP/1.1" 200 512"#;
        let record = parse_line(line).expect("line should parse");

        assert_eq!(record.addr, "203.0.113.7");
        assert_eq!(record.request, "GET /index.html HTTP/1.1");
        assert_eq!(record.status, 200);
        assert_eq!(record.size, 512);
        assert_eq!(record.date_key(), "2024-03-10");
        assert_eq!(record.hour_key(), "14");
    }

    #[test]
    fn parses_line_without_zone_offset() {
        let line = r#"10.0.0.1 - - [01/Jan/2025:00:05:00] "GET / HTTP/1.1" 301 0"#;
        let record = parse_line(line).expect("line should parse");
        assert_eq!(record.date_key(), "2025-01-01");
        assert_eq!(record.hour_key(), "00");
    }

    #[test]
    fn skips_malformed_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("not a log line").is_none());
        // Truncated tail after a crash
        assert!(parse_line(r#"203.0.113.7 - - [10/Mar/2024:14:2"#).is_none());
    }

    #[test]
    fn skips_unparsable_timestamp() {
        let line = r#"203.0.113.7 - - [banana] "GET / HTTP/1.1" 200 512"#;
        assert!(parse_line(line).is_none());
    }

    #[test]
    fn ipv6_addresses_are_accepted() {
        let line = r#"2001:db8::1 - - [10/Mar/2024:09:00:00 +0200] "POST /api/upload HTTP/1.1" 200 0"#;
        let record = parse_line(line).expect("line should parse");
        assert_eq!(record.addr, "2001:db8::1");
        assert_eq!(record.hour_key(), "09");
    }
}
