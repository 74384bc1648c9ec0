use chrono::{NaiveDate, NaiveDateTime};

use crate::error::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Granularity {
    Day,
    Week,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
        }
    }

    pub(crate) fn title(self) -> &'static str {
        match self {
            Granularity::Day => "Reporte diario de citas",
            Granularity::Week => "Reporte semanal de citas",
        }
    }
}

impl std::str::FromStr for Granularity {
    type Err = Error;

    /// Only the exact lowercase wire values are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            other => Err(Error::InvalidRequest(format!(
                "type must be \"day\" or \"week\", got {other:?}"
            ))),
        }
    }
}

/// A validated request for one appointment report. Both dates are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub granularity: Granularity,
}

impl ReportRequest {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, granularity: Granularity) -> Result<Self, Error> {
        if start_date > end_date {
            return Err(Error::InvalidRequest(format!(
                "startDate {start_date} is after endDate {end_date}"
            )));
        }
        Ok(Self {
            start_date,
            end_date,
            granularity,
        })
    }

    /// Validate raw request fields as they arrive from the outer layer.
    pub fn parse(start: Option<&str>, end: Option<&str>, kind: Option<&str>) -> Result<Self, Error> {
        let kind = kind
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::InvalidRequest("type is required".into()))?;
        let granularity: Granularity = kind.parse()?;
        let start_date = parse_date("startDate", start)?;
        let end_date = parse_date("endDate", end)?;
        Self::new(start_date, end_date, granularity)
    }

    pub fn contains(&self, start_time: &NaiveDateTime) -> bool {
        let day = start_time.date();
        day >= self.start_date && day <= self.end_date
    }

    pub fn filename(&self) -> String {
        format!(
            "reporte-citas-{}-{}.pdf",
            self.granularity.as_str(),
            self.start_date.format(DATE_FORMAT)
        )
    }

    pub(crate) fn range_label(&self) -> String {
        if self.start_date == self.end_date {
            self.start_date.format("%d/%m/%Y").to_string()
        } else {
            format!(
                "{} al {}",
                self.start_date.format("%d/%m/%Y"),
                self.end_date.format("%d/%m/%Y")
            )
        }
    }
}

fn parse_date(field: &str, value: Option<&str>) -> Result<NaiveDate, Error> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidRequest(format!("{field} is required")))?;
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| Error::InvalidRequest(format!("{field} {raw:?} is not a YYYY-MM-DD date: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_week_request() {
        let req = ReportRequest::parse(Some("2026-10-12"), Some("2026-10-18"), Some("week")).unwrap();
        assert_eq!(req.granularity, Granularity::Week);
        assert_eq!(req.start_date, NaiveDate::from_ymd_opt(2026, 10, 12).unwrap());
        assert_eq!(req.filename(), "reporte-citas-week-2026-10-12.pdf");
    }

    #[test]
    fn type_must_match_exactly() {
        for bad in ["Day", "month", " ", "weekly"] {
            let err = ReportRequest::parse(Some("2026-10-12"), Some("2026-10-12"), Some(bad)).unwrap_err();
            assert!(err.is_client_error(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn both_dates_are_required() {
        assert!(ReportRequest::parse(None, Some("2026-10-12"), Some("day")).is_err());
        assert!(ReportRequest::parse(Some("2026-10-12"), None, Some("day")).is_err());
        assert!(ReportRequest::parse(Some("2026-10-12"), Some(""), Some("day")).is_err());
    }

    #[test]
    fn rejects_malformed_and_inverted_dates() {
        assert!(ReportRequest::parse(Some("12/10/2026"), Some("2026-10-12"), Some("day")).is_err());
        assert!(ReportRequest::parse(Some("2026-10-13"), Some("2026-10-12"), Some("day")).is_err());
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let req = ReportRequest::parse(Some("2026-10-12"), Some("2026-10-13"), Some("day")).unwrap();
        let at = |d: u32, h: u32| {
            NaiveDate::from_ymd_opt(2026, 10, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        assert!(req.contains(&at(12, 0)));
        assert!(req.contains(&at(13, 23)));
        assert!(!req.contains(&at(14, 0)));
        assert!(!req.contains(&at(11, 23)));
    }
}
