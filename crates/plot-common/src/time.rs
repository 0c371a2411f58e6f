//! Date-token handling for flight rasters.
//!
//! Raster files are named `<dateToken>_<anything>.tif`; the token is kept as
//! an opaque string in tables and stores and only parsed when day offsets are
//! needed.

use chrono::NaiveDate;
use std::path::Path;

use crate::error::{PlotError, PlotResult};

/// Format of a date token.
pub const DATE_TOKEN_FORMAT: &str = "%Y%m%d";

/// Extract the date token from a raster file name.
///
/// The token is everything before the first underscore of the file name.
/// A name without an underscore carries no date.
pub fn date_token(path: impl AsRef<Path>) -> Option<String> {
    let name = path.as_ref().file_name()?.to_str()?;
    let (token, _) = name.split_once('_')?;
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Parse a `YYYYMMDD` date token.
pub fn parse_date_token(token: &str) -> PlotResult<NaiveDate> {
    NaiveDate::parse_from_str(token, DATE_TOKEN_FORMAT).map_err(|_| {
        PlotError::usage(format!(
            "date token '{}' is not in YYYYMMDD form",
            token
        ))
    })
}

/// Day offsets of each token relative to the earliest token in the slice.
pub fn day_offsets(tokens: &[&str]) -> PlotResult<Vec<i64>> {
    let parsed = tokens
        .iter()
        .map(|t| parse_date_token(t))
        .collect::<PlotResult<Vec<_>>>()?;

    let Some(start) = parsed.iter().min().copied() else {
        return Ok(Vec::new());
    };

    Ok(parsed
        .iter()
        .map(|d| d.signed_duration_since(start).num_days())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_token_from_file_name() {
        assert_eq!(date_token("20200101_ortho.tif").as_deref(), Some("20200101"));
        assert_eq!(
            date_token("/data/flights/20180815_field_a_rgb.tif").as_deref(),
            Some("20180815")
        );
    }

    #[test]
    fn test_date_token_missing_underscore() {
        assert_eq!(date_token("ortho.tif"), None);
        assert_eq!(date_token("_ortho.tif"), None);
    }

    #[test]
    fn test_day_offsets_relative_to_earliest() {
        let days = day_offsets(&["20180917", "20180815", "20180822"]).unwrap();
        assert_eq!(days, vec![33, 0, 7]);
    }

    #[test]
    fn test_day_offsets_rejects_bad_token() {
        let err = day_offsets(&["20180815", "flight3"]).unwrap_err();
        assert!(err.to_string().contains("flight3"));
    }
}
