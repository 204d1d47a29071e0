use anyhow::{Context, Result};
use exiftool::ExifTool;
use std::path::Path;
use tracing::debug;

use crate::error::WriteError;
use crate::sidecar::{ExtractedFields, GpsCoordinates};

/// Formats that carry EXIF date tags
const EXIF_EXTENSIONS: &[&str] = &["jpg", "jpeg", "heic", "heif", "tif", "tiff", "png", "dng", "webp"];

/// QuickTime-based video containers
const QUICKTIME_EXTENSIONS: &[&str] = &["mov", "mp4", "m4v", "3gp"];

/// Applies extracted fields to a media file in place.
pub trait MetadataWriter {
    fn apply(&mut self, media: &Path, fields: &ExtractedFields) -> Result<(), WriteError>;
}

/// Writes through one long-lived exiftool process for the whole run
pub struct ExifToolWriter {
    exiftool: ExifTool,
}

impl ExifToolWriter {
    /// Start exiftool. Fails when it is not installed.
    pub fn new() -> Result<Self> {
        let exiftool = ExifTool::new().context(
            "Failed to start exiftool. Install it and make sure it is on PATH \
             (macOS: brew install exiftool, Debian/Ubuntu: apt install libimage-exiftool-perl)",
        )?;
        Ok(ExifToolWriter { exiftool })
    }
}

impl MetadataWriter for ExifToolWriter {
    fn apply(&mut self, media: &Path, fields: &ExtractedFields) -> Result<(), WriteError> {
        let args = build_args(media, fields)?;
        debug!("exiftool {}", args.join(" "));

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let lines = self
            .exiftool
            .execute_lines(&arg_refs)
            .map_err(|e| WriteError::Tool {
                path: media.to_path_buf(),
                message: e.to_string(),
            })?;

        if reports_success(&lines) {
            Ok(())
        } else {
            Err(WriteError::Unexpected {
                path: media.to_path_buf(),
                output: lines.join("\n"),
            })
        }
    }
}

/// exiftool command line for writing `fields` into `media`. Only fields
/// that are present produce arguments; the media path comes last.
pub fn build_args(media: &Path, fields: &ExtractedFields) -> Result<Vec<String>, WriteError> {
    let media_str = media
        .to_str()
        .ok_or_else(|| WriteError::NonUtf8Path(media.to_path_buf()))?;

    let ext = media
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let mut args: Vec<String> = vec!["-overwrite_original".into(), "-ignoreMinorErrors".into()];

    if let Some(date) = fields.exif_date() {
        if EXIF_EXTENSIONS.contains(&ext.as_str()) {
            args.push(format!("-AllDates={}", date));
        } else if QUICKTIME_EXTENSIONS.contains(&ext.as_str()) {
            // dates are written as UTC, QuickTime stores them as UTC
            args.push("-api".into());
            args.push("QuickTimeUTC".into());
            args.push(format!("-QuickTime:CreateDate={}", date));
            args.push(format!("-QuickTime:ModifyDate={}", date));
        }
        args.push(format!("-FileModifyDate={}", date));
        args.push(format!("-FileCreateDate={}", date));
    }

    if let Some(description) = &fields.description {
        // exiftool reads its arguments one per line
        let single_line = description.replace(['\r', '\n'], " ");
        args.push(format!("-Description={}", single_line));
    }

    if let Some(gps) = &fields.gps {
        push_gps_args(&mut args, gps);
    }

    args.push(media_str.to_string());
    Ok(args)
}

fn push_gps_args(args: &mut Vec<String>, gps: &GpsCoordinates) {
    let lat_ref = if gps.latitude < 0.0 { "S" } else { "N" };
    let lon_ref = if gps.longitude < 0.0 { "W" } else { "E" };

    args.push(format!("-GPSLatitude={}", gps.latitude.abs()));
    args.push(format!("-GPSLatitudeRef={}", lat_ref));
    args.push(format!("-GPSLongitude={}", gps.longitude.abs()));
    args.push(format!("-GPSLongitudeRef={}", lon_ref));

    if let Some(altitude) = gps.altitude {
        // 0 = above sea level, 1 = below
        let alt_ref = if altitude < 0.0 { "1" } else { "0" };
        args.push(format!("-GPSAltitude={}", altitude.abs()));
        args.push(format!("-GPSAltitudeRef={}", alt_ref));
    }
}

/// exiftool's summary lines look like `    1 image files updated`
pub fn reports_success(lines: &[String]) -> bool {
    let mut ok = false;
    for line in lines {
        let mut words = line.split_whitespace();
        let Some(count) = words.next().and_then(|w| w.parse::<usize>().ok()) else {
            continue;
        };
        let rest: Vec<&str> = words.collect();
        let rest = rest.join(" ");

        if rest.contains("weren't updated") || rest.contains("weren't created") {
            if count > 0 {
                return false;
            }
        } else if (rest == "image files updated" || rest == "image files unchanged") && count > 0 {
            ok = true;
        }
    }
    ok
}
