//! Per-read options

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use tessera_core::{Crs, Error, Result};

/// Options for one read
///
/// Immutable and passed per call; there is no global read configuration.
///
/// ```
/// use tessera_raster::ReadOptions;
/// use tessera_core::Crs;
///
/// let options = ReadOptions::default()
///     .with_crs(Crs::WEB_MERCATOR)
///     .with_time_tag("ACQUIRED")
///     .with_time_format("%Y-%m-%dT%H:%M:%S%z");
/// assert_eq!(options.time_tag, "ACQUIRED");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// CRS to report instead of the one embedded in the raster
    pub crs: Option<Crs>,
    /// Header tag holding the acquisition time
    pub time_tag: String,
    /// chrono format pattern of the acquisition time
    pub time_format: String,
}

impl ReadOptions {
    /// Tag read by default for the acquisition time
    pub const DEFAULT_TIME_TAG: &'static str = "TIFFTAG_DATETIME";
    /// Default acquisition time pattern
    pub const DEFAULT_TIME_FORMAT: &'static str = "%Y:%m:%d %H:%M:%S";

    /// Override the reported CRS
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    /// Read the acquisition time from `tag`
    pub fn with_time_tag(mut self, tag: impl Into<String>) -> Self {
        self.time_tag = tag.into();
        self
    }

    /// Parse the acquisition time with `pattern`
    pub fn with_time_format(mut self, pattern: impl Into<String>) -> Self {
        self.time_format = pattern.into();
        self
    }

    /// CRS to report for a raster whose embedded CRS is `embedded`
    pub fn resolve_crs(&self, embedded: &Crs) -> Crs {
        self.crs.clone().unwrap_or_else(|| embedded.clone())
    }

    /// Acquisition time from header `tags`
    ///
    /// Patterns carrying an offset (`%z`, `%:z`, `%#z`, `%+`) are parsed as
    /// zoned times; anything else is read as UTC. Date-only patterns give
    /// midnight.
    ///
    /// # Errors
    /// `MissingTag` if the tag is absent, `Parse` if its value does not
    /// match the pattern
    pub fn parse_time(&self, tags: &BTreeMap<String, String>) -> Result<DateTime<Utc>> {
        let value = tags.get(&self.time_tag).ok_or_else(|| Error::MissingTag {
            tag: self.time_tag.clone(),
        })?;
        let value = value.trim();
        let pattern = self.time_format.as_str();

        let parsed = if is_zoned(pattern) {
            DateTime::parse_from_str(value, pattern)
                .ok()
                .map(|t| t.with_timezone(&Utc))
        } else {
            NaiveDateTime::parse_from_str(value, pattern)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(value, pattern)
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(|naive| Utc.from_utc_datetime(&naive))
        };

        parsed.ok_or_else(|| Error::Parse {
            value: value.to_string(),
            pattern: pattern.to_string(),
        })
    }
}

fn is_zoned(pattern: &str) -> bool {
    ["%z", "%:z", "%::z", "%#z", "%+"]
        .iter()
        .any(|spec| pattern.contains(spec))
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            crs: None,
            time_tag: Self::DEFAULT_TIME_TAG.to_string(),
            time_format: Self::DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}
