use crate::errors::ServiceError;
use crate::logparse::parse_line;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Visit statistics folded from an access log.
///
/// Field names are fixed for wire compatibility with existing consumers.
/// `daily` and `hourly` are sorted ascending by key; `ips` is the top-N
/// ranking sorted descending by count and serialized as an ordered JSON map.
///
/// The hourly view deliberately collapses across days: hour "14" counts all
/// 2pm traffic regardless of date (an activity-by-hour-of-day view).
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub daily: BTreeMap<String, u64>,
    pub hourly: BTreeMap<String, u64>,
    #[serde(serialize_with = "ordered_counts")]
    pub ips: Vec<(String, u64)>,
    pub total_visits: u64,
    pub unique_ips: u64,
    pub last_updated: String,
}

fn ordered_counts<S>(pairs: &[(String, u64)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (ip, count) in pairs {
        map.serialize_entry(ip, count)?;
    }
    map.end()
}

/// Fold a sequence of raw log lines into an aggregate report.
///
/// Unparsable lines are skipped, never fatal. Deterministic apart from
/// `last_updated`; top-IP ties are broken by first appearance in the input.
pub fn aggregate_lines<I, S>(lines: I, top_limit: usize) -> AggregateReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut daily: BTreeMap<String, u64> = BTreeMap::new();
    let mut hourly: BTreeMap<String, u64> = BTreeMap::new();
    let mut ip_counts: HashMap<String, u64> = HashMap::new();
    let mut ip_order: Vec<String> = Vec::new();
    let mut total_visits = 0u64;

    for line in lines {
        let Some(record) = parse_line(line.as_ref()) else {
            continue;
        };

        *daily.entry(record.date_key()).or_insert(0) += 1;
        *hourly.entry(record.hour_key()).or_insert(0) += 1;
        if !ip_counts.contains_key(&record.addr) {
            ip_order.push(record.addr.clone());
        }
        *ip_counts.entry(record.addr).or_insert(0) += 1;
        total_visits += 1;
    }

    let unique_ips = ip_counts.len() as u64;

    // Rank in first-seen order so the stable sort gives deterministic ties
    let mut ips: Vec<(String, u64)> = ip_order
        .into_iter()
        .map(|ip| {
            let count = ip_counts[&ip];
            (ip, count)
        })
        .collect();
    ips.sort_by(|a, b| b.1.cmp(&a.1));
    ips.truncate(top_limit);

    AggregateReport {
        daily,
        hourly,
        ips,
        total_visits,
        unique_ips,
        last_updated: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

/// Read an access log from disk and aggregate it.
///
/// The file may be appended to concurrently by the logging middleware; an
/// incomplete trailing line simply fails to parse and is skipped. A missing
/// or unreadable file is a single structured error, no partial report.
pub fn aggregate_file<P: AsRef<Path>>(
    path: P,
    top_limit: usize,
) -> Result<AggregateReport, ServiceError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| ServiceError::LogSource(format!("{}: {}", path.display(), e)))?;

    // Lazily read line by line; lines with invalid UTF-8 are skipped
    let lines = BufReader::new(file).lines().filter_map(|line| line.ok());
    Ok(aggregate_lines(lines, top_limit))
}
