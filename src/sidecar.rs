use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::error::SidecarError;

/// Date format understood by exiftool for all date tags
pub const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// The subset of sidecar metadata this tool writes into media files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub taken: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub gps: Option<GpsCoordinates>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
    /// Metres above sea level; `None` when the export recorded zero
    pub altitude: Option<f64>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self.taken.is_none() && self.description.is_none() && self.gps.is_none()
    }

    /// Capture time formatted for exiftool
    pub fn exif_date(&self) -> Option<String> {
        self.taken.map(|t| t.format(EXIF_DATE_FORMAT).to_string())
    }
}

/// Sidecar document as exported. Every field is lenient: a value of the
/// wrong shape is dropped instead of failing the whole document.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSidecar {
    #[serde(default, deserialize_with = "lenient")]
    photo_taken_time: Option<RawTime>,
    #[serde(default, deserialize_with = "lenient")]
    creation_time: Option<RawTime>,
    #[serde(default, deserialize_with = "lenient")]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    geo_data: Option<RawGeo>,
    #[serde(default, deserialize_with = "lenient")]
    geo_data_exif: Option<RawGeo>,
}

#[derive(Debug, Deserialize)]
struct RawTime {
    timestamp: RawTimestamp,
}

/// Exports write epoch seconds as a string, but numbers show up too
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawGeo {
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<f64>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Read and parse a sidecar file
pub fn read_sidecar(path: &Path) -> Result<ExtractedFields, SidecarError> {
    let text = fs::read_to_string(path).map_err(|source| SidecarError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_sidecar(path, &text)
}

/// Parse sidecar text. `path` is only used for error reporting.
///
/// The document must be a JSON object; anything else (an array, a bare
/// number) is a parse error rather than an empty set of fields.
pub fn parse_sidecar(path: &Path, text: &str) -> Result<ExtractedFields, SidecarError> {
    let parse_error = |source: serde_json::Error| SidecarError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let value: Value = serde_json::from_str(text).map_err(parse_error)?;
    if !value.is_object() {
        return Err(parse_error(serde::de::Error::custom(
            "sidecar document is not a JSON object",
        )));
    }

    let raw: RawSidecar = serde_json::from_value(value).map_err(parse_error)?;
    Ok(extract(raw))
}

fn extract(raw: RawSidecar) -> ExtractedFields {
    let taken = [raw.photo_taken_time.as_ref(), raw.creation_time.as_ref()]
        .into_iter()
        .flatten()
        .find_map(|t| t.timestamp.to_datetime());

    let description = raw
        .description
        .filter(|d| !d.trim().is_empty());

    let gps = [raw.geo_data.as_ref(), raw.geo_data_exif.as_ref()]
        .into_iter()
        .flatten()
        .find_map(RawGeo::to_coordinates);

    ExtractedFields {
        taken,
        description,
        gps,
    }
}

impl RawTimestamp {
    fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let seconds = match self {
            RawTimestamp::Int(i) => *i,
            RawTimestamp::Float(f) if f.is_finite() => f.trunc() as i64,
            RawTimestamp::Float(_) => return None,
            RawTimestamp::Text(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(i) => i,
                    Err(_) => {
                        let f = s.parse::<f64>().ok().filter(|f| f.is_finite())?;
                        f.trunc() as i64
                    }
                }
            }
        };

        // Zero is what the export writes when it has no date
        if seconds == 0 {
            return None;
        }

        Utc.timestamp_opt(seconds, 0).single()
    }
}

impl RawGeo {
    fn to_coordinates(&self) -> Option<GpsCoordinates> {
        let latitude = self.latitude.filter(|v| v.is_finite())?;
        let longitude = self.longitude.filter(|v| v.is_finite())?;

        // (0, 0) marks "no location" in the export format
        if latitude == 0.0 && longitude == 0.0 {
            return None;
        }

        let altitude = self.altitude.filter(|a| a.is_finite() && *a != 0.0);

        Some(GpsCoordinates {
            latitude,
            longitude,
            altitude,
        })
    }
}
