//! Coordinate Reference System helpers.
//!
//! CRS identifiers are passed through untouched; the only interpretation done
//! here is pulling an EPSG code out of the common spellings so a raster and a
//! grid can be compared.

/// Extract the EPSG code from a CRS identifier.
///
/// Accepts formats like:
/// - "EPSG:32720"
/// - "epsg:4326"
/// - "urn:ogc:def:crs:EPSG::32720"
/// - "urn:ogc:def:crs:EPSG:6.6:4326"
pub fn epsg_code(s: &str) -> Option<u32> {
    let upper = s.trim().to_uppercase();
    let pos = upper.find("EPSG")?;
    upper[pos + 4..]
        .rsplit(':')
        .next()
        .and_then(|code| code.trim().parse().ok())
}

/// Whether two CRS identifiers name the same EPSG code.
///
/// Returns `None` when either side has no recognizable code.
pub fn same_epsg(a: &str, b: &str) -> Option<bool> {
    Some(epsg_code(a)? == epsg_code(b)?)
}
