//! Statistics report DTO

use serde::Serialize;

use crate::cache::CacheStats;

/// Timestamped snapshot of one cache's statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// Which cache the snapshot belongs to
    pub cache: String,
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub max_size: usize,
    /// Ratio of hits to all counted requests
    pub hit_rate: f64,
    /// Same counters as a one-line summary
    pub summary: String,
    /// Snapshot time in ISO 8601 format
    pub timestamp: String,
}

impl StatsReport {
    /// Builds a report stamped with the current UTC time.
    pub fn new(cache: impl Into<String>, stats: &CacheStats) -> Self {
        Self {
            cache: cache.into(),
            hits: stats.hits,
            misses: stats.misses,
            size: stats.size,
            max_size: stats.max_size,
            hit_rate: stats.hit_rate(),
            summary: stats.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_from_stats() {
        let stats = CacheStats {
            hits: 8,
            misses: 2,
            size: 2,
            max_size: 16,
        };
        let report = StatsReport::new("lookups", &stats);

        assert_eq!(report.cache, "lookups");
        assert!((report.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(report.summary, "hits=8, misses=2, maxsize=16, currsize=2");
        assert!(chrono::DateTime::parse_from_rfc3339(&report.timestamp).is_ok());
    }

    #[test]
    fn test_report_serialize() {
        let report = StatsReport::new("empty", &CacheStats::default());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["cache"], "empty");
        assert_eq!(json["hit_rate"], 0.0);
        assert!(json.get("timestamp").is_some());
    }
}
