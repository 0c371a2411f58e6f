//! GeoKeyDirectory parsing.
//!
//! The directory is a flat `u16` array: a 4-value header
//! `[version, revision, minor, key_count]` followed by `key_count` entries of
//! `[key_id, tag_location, count, value]`. Keys stored inline have
//! `tag_location == 0`.

/// GeographicTypeGeoKey
pub const GEOGRAPHIC_TYPE: u16 = 2048;
/// ProjectedCSTypeGeoKey
pub const PROJECTED_CS_TYPE: u16 = 3072;

/// Codes 0 and 32767 mean "undefined" and "user-defined".
fn is_real_code(code: u16) -> bool {
    code != 0 && code != 32767
}

/// Look up an inline key value.
pub fn inline_key(directory: &[u16], key: u16) -> Option<u16> {
    let count = *directory.get(3)? as usize;
    directory
        .get(4..4 + count * 4)?
        .chunks_exact(4)
        .find(|entry| entry[0] == key && entry[1] == 0)
        .map(|entry| entry[3])
}

/// CRS identifier (`EPSG:<code>`) declared by a GeoKeyDirectory.
///
/// A projected CRS wins over the geographic one.
pub fn crs_from_directory(directory: &[u16]) -> Option<String> {
    [PROJECTED_CS_TYPE, GEOGRAPHIC_TYPE]
        .iter()
        .filter_map(|key| inline_key(directory, *key))
        .find(|code| is_real_code(*code))
        .map(|code| format!("EPSG:{}", code))
}
