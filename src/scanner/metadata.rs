use chrono::NaiveDateTime;
use std::fmt;
use std::io::Cursor;

/// Format of EXIF `DateTimeOriginal`.
pub const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMetadata {
    pub capture_date: Option<NaiveDateTime>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    /// Only set when both latitude and longitude were found.
    pub location: Option<GeoLocation>,
    /// Raw EXIF orientation (1-8).
    pub orientation: Option<u8>,
}

/// Decimal-degree coordinates; negative for south / west.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    /// Human-readable degrees/minutes/seconds form.
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GeoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lat_hemisphere = if self.latitude < 0.0 { 'S' } else { 'N' };
        let lon_hemisphere = if self.longitude < 0.0 { 'W' } else { 'E' };
        write!(f, "{} ", lat_hemisphere)?;
        write_dms(f, self.latitude.abs())?;
        write!(f, " {} ", lon_hemisphere)?;
        write_dms(f, self.longitude.abs())
    }
}

fn write_dms(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    // Work in thousandths of a second so rounding never yields 60.000"
    let total = (value * 3_600_000.0).round() as u64;
    let degrees = total / 3_600_000;
    let minutes = (total / 60_000) % 60;
    let millis = total % 60_000;
    write!(
        f,
        "{}º {}' {}.{:03}\"",
        degrees,
        minutes,
        millis / 1000,
        millis % 1000
    )
}

/// Read capture metadata from the raw bytes of an image.
///
/// Files without EXIF data yield an empty [`ImageMetadata`]; individual
/// fields that are missing or malformed are left unset.
pub fn extract_metadata(bytes: &[u8]) -> ImageMetadata {
    let mut metadata = ImageMetadata::default();

    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(_) => return metadata,
    };

    metadata.capture_date = ascii_field(&exif, exif::Tag::DateTimeOriginal)
        .and_then(|value| NaiveDateTime::parse_from_str(&value, EXIF_DATE_FORMAT).ok());
    metadata.camera_make = ascii_field(&exif, exif::Tag::Make);
    metadata.camera_model = ascii_field(&exif, exif::Tag::Model);
    metadata.location = read_location(&exif);
    metadata.orientation = read_orientation(&exif);

    metadata
}

/// First ASCII value of `tag`, trimmed; empty strings count as absent.
fn ascii_field(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match field.value {
        exif::Value::Ascii(ref values) => {
            let raw = values.first()?;
            let text = String::from_utf8_lossy(raw);
            let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => None,
    }
}

fn read_orientation(exif: &exif::Exif) -> Option<u8> {
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    match field.value.get_uint(0) {
        Some(v @ 1..=8) => Some(v as u8),
        _ => None,
    }
}

fn read_location(exif: &exif::Exif) -> Option<GeoLocation> {
    let latitude = read_coordinate(exif, exif::Tag::GPSLatitude, exif::Tag::GPSLatitudeRef, 'S')?;
    let longitude = read_coordinate(exif, exif::Tag::GPSLongitude, exif::Tag::GPSLongitudeRef, 'W')?;
    Some(GeoLocation { latitude, longitude })
}

fn read_coordinate(
    exif: &exif::Exif,
    value_tag: exif::Tag,
    ref_tag: exif::Tag,
    negative_ref: char,
) -> Option<f64> {
    let value = exif.get_field(value_tag, exif::In::PRIMARY)?;
    let reference = ascii_field(exif, ref_tag)?;

    let exif::Value::Rational(ref parts) = value.value else {
        return None;
    };
    if parts.len() < 3 || parts.iter().take(3).any(|r| r.denom == 0) {
        return None;
    }

    let decimal = dms_to_decimal(parts[0].to_f64(), parts[1].to_f64(), parts[2].to_f64());
    if reference.contains(negative_ref) {
        Some(-decimal)
    } else {
        Some(decimal)
    }
}

fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}
