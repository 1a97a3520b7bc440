//! Date-based filters: top-level item date windows and communication year.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Datelike;
use tracing::debug;

use crate::config::{CommunicationYearConfig, DateRange, DateRangesConfig};
use crate::effects::{Effect, WorkerItem};
use crate::models::Item;
use crate::traits::Policy;

/// Set of inclusive date windows plus the answer for undated items.
#[derive(Debug, Clone)]
pub struct DateWindows {
    ranges: Vec<DateRange>,
    include_if_date_missing: bool,
}

impl DateWindows {
    pub fn new(ranges: Vec<DateRange>, include_if_date_missing: bool) -> Self {
        Self {
            ranges,
            include_if_date_missing,
        }
    }

    /// `None` for items that are not top level (no decision), otherwise
    /// whether the item's date falls inside any window.
    pub fn decide(&self, item: &Item) -> Option<bool> {
        if !item.top_level {
            return None;
        }
        let decision = match item.date {
            None => self.include_if_date_missing,
            Some(date) => self.ranges.iter().any(|range| range.contains(&date)),
        };
        Some(decision)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Keeps top-level items whose date falls inside a configured window.
pub struct DateRangeFilter {
    windows: DateWindows,
}

impl DateRangeFilter {
    pub fn from_config(cfg: &DateRangesConfig) -> Self {
        Self {
            windows: DateWindows::new(cfg.ranges.clone(), cfg.include_if_date_missing),
        }
    }
}

#[async_trait]
impl Policy for DateRangeFilter {
    fn name(&self) -> &str {
        "date_ranges"
    }

    fn description(&self) -> String {
        format!("keep top-level items dated within {} range(s)", self.windows.len())
    }

    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>> {
        match self.windows.decide(item.source_item()) {
            Some(process) => {
                debug!(item = %item.source_item().guid, process, "Date range decision");
                Ok(vec![Effect::SetProcess(process)])
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Drops communications dated outside `[min_year, max_year]`.
///
/// The year is taken in the communication's own offset.
pub struct CommunicationYearFilter {
    min_year: i32,
    max_year: i32,
}

impl CommunicationYearFilter {
    pub fn from_config(cfg: &CommunicationYearConfig) -> Self {
        Self {
            min_year: cfg.min_year,
            max_year: cfg.max_year,
        }
    }
}

#[async_trait]
impl Policy for CommunicationYearFilter {
    fn name(&self) -> &str {
        "communication_year"
    }

    fn description(&self) -> String {
        format!(
            "drop communications dated outside {}..={}",
            self.min_year, self.max_year
        )
    }

    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>> {
        let Some(date) = item.communication().and_then(|c| c.date_time()) else {
            return Ok(Vec::new());
        };
        let year = date.year();
        if year < self.min_year || year > self.max_year {
            return Ok(vec![Effect::SetProcess(false)]);
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Communication;
    use chrono::{DateTime, FixedOffset};

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn filter(include_if_date_missing: bool) -> DateRangeFilter {
        DateRangeFilter::from_config(&DateRangesConfig {
            ranges: vec![
                DateRange {
                    start: ts("2017-01-01T00:00:00-07:00"),
                    end: ts("2017-01-10T23:59:59-07:00"),
                },
                DateRange {
                    start: ts("2017-01-05T00:00:00-07:00"),
                    end: ts("2017-02-10T23:59:59-07:00"),
                },
            ],
            include_if_date_missing,
        })
    }

    fn top_level(date: Option<&str>) -> WorkerItem {
        let mut item = Item::new("g", "mail.eml", "message/rfc822");
        item.top_level = true;
        item.date = date.map(ts);
        WorkerItem::new(item)
    }

    #[tokio::test]
    async fn bounds_are_inclusive() {
        let policy = filter(false);
        for date in [
            "2017-01-01T00:00:00-07:00",
            "2017-01-01T07:00:00Z",
            "2017-02-10T23:59:59-07:00",
        ] {
            assert_eq!(
                policy.evaluate(&top_level(Some(date))).await.unwrap(),
                vec![Effect::SetProcess(true)],
                "{} should be inside",
                date
            );
        }
    }

    #[tokio::test]
    async fn outside_every_range_is_rejected() {
        let policy = filter(true);
        for date in ["2016-12-31T23:59:59-07:00", "2017-02-11T00:00:00-07:00"] {
            assert_eq!(
                policy.evaluate(&top_level(Some(date))).await.unwrap(),
                vec![Effect::SetProcess(false)]
            );
        }
    }

    #[tokio::test]
    async fn missing_date_uses_configured_default() {
        assert_eq!(
            filter(true).evaluate(&top_level(None)).await.unwrap(),
            vec![Effect::SetProcess(true)]
        );
        assert_eq!(
            filter(false).evaluate(&top_level(None)).await.unwrap(),
            vec![Effect::SetProcess(false)]
        );
    }

    #[tokio::test]
    async fn non_top_level_items_are_untouched() {
        let policy = filter(false);
        for date in [Some("2017-01-03T00:00:00Z"), Some("1999-01-01T00:00:00Z"), None] {
            let mut item = top_level(date);
            let mut inner = item.source_item().clone();
            inner.top_level = false;
            item = WorkerItem::new(inner);
            assert!(policy.evaluate(&item).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn communication_year_window() {
        let policy = CommunicationYearFilter::from_config(&CommunicationYearConfig {
            min_year: 2001,
            max_year: 2001,
        });

        let with_date = |date: &str| {
            let mut item = Item::new("g", "m.eml", "message/rfc822");
            item.communication = Some(Communication {
                date_time: Some(ts(date)),
                from: vec![],
                to: vec![],
                cc: vec![],
                bcc: vec![],
            });
            WorkerItem::new(item)
        };

        assert!(policy
            .evaluate(&with_date("2001-06-01T00:00:00Z"))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            policy.evaluate(&with_date("2002-01-01T00:00:00Z")).await.unwrap(),
            vec![Effect::SetProcess(false)]
        );
        let no_comm = WorkerItem::new(Item::new("g", "a.txt", "text/plain"));
        assert!(policy.evaluate(&no_comm).await.unwrap().is_empty());
    }
}
