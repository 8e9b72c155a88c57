//! Reads GPS coordinates and capture time from embedded EXIF metadata.

use crate::structs::GeoCoordinate;
use crate::time::parsing::parse_naive;
use chrono::NaiveDateTime;
use exif::{Exif, Field, In, Rational, Reader, Tag, Value};
use std::io::{BufRead, Cursor, Seek};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Could not parse EXIF container: {0}")]
    Exif(#[from] exif::Error),

    #[error("I/O error while reading image: {0}")]
    Io(#[from] std::io::Error),
}

/// A seekable byte stream holding an image.
pub trait ImageSource: BufRead + Seek {}

impl<T: BufRead + Seek + ?Sized> ImageSource for T {}

pub trait MetadataReader: Send + Sync {
    /// Returns `None` when the image carries no usable coordinate pair.
    fn read_coordinates(
        &self,
        image: &mut dyn ImageSource,
    ) -> Result<Option<GeoCoordinate>, MetadataError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExifReader;

impl ExifReader {
    pub fn new() -> Self {
        Self
    }

    /// Parses the EXIF block, treating "no EXIF present" as an empty result.
    fn read_exif(image: &mut dyn ImageSource) -> Result<Option<Exif>, MetadataError> {
        let mut image = image;
        match Reader::new().read_from_container(&mut image) {
            Ok(exif) => Ok(Some(exif)),
            Err(exif::Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads `DateTimeOriginal` (falling back to `DateTime`) as camera-local wall clock time.
    pub fn read_capture_time(
        &self,
        image: &mut dyn ImageSource,
    ) -> Result<Option<NaiveDateTime>, MetadataError> {
        let Some(exif) = Self::read_exif(image)? else {
            return Ok(None);
        };
        let capture_time = [Tag::DateTimeOriginal, Tag::DateTime]
            .into_iter()
            .filter_map(|tag| exif.get_field(tag, In::PRIMARY))
            .find_map(|field| match &field.value {
                Value::Ascii(parts) => parts
                    .first()
                    .and_then(|raw| std::str::from_utf8(raw).ok())
                    .and_then(parse_naive),
                _ => None,
            });
        Ok(capture_time)
    }
}

impl MetadataReader for ExifReader {
    fn read_coordinates(
        &self,
        image: &mut dyn ImageSource,
    ) -> Result<Option<GeoCoordinate>, MetadataError> {
        let Some(exif) = Self::read_exif(image)? else {
            return Ok(None);
        };
        let (Some(latitude), Some(longitude)) = (
            gps_decimal(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S'),
            gps_decimal(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W'),
        ) else {
            return Ok(None);
        };
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Ok(None);
        }
        Ok(Some(GeoCoordinate {
            latitude,
            longitude,
        }))
    }
}

/// Converts a degrees/minutes/seconds rational triple into signed decimal degrees.
fn gps_decimal(exif: &Exif, value_tag: Tag, ref_tag: Tag, negative_ref: u8) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    if parts.len() < 3 {
        return None;
    }
    let decimal = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;
    if !decimal.is_finite() {
        return None;
    }

    let negative = exif
        .get_field(ref_tag, In::PRIMARY)
        .is_some_and(|reference| match &reference.value {
            Value::Ascii(parts) => parts
                .first()
                .and_then(|raw| raw.first())
                .is_some_and(|c| c.eq_ignore_ascii_case(&negative_ref)),
            _ => false,
        });
    Some(if negative { -decimal } else { decimal })
}

fn dms(value: f64) -> Vec<Rational> {
    let value = value.abs();
    let degrees = value.trunc();
    let minutes_full = (value - degrees) * 60.0;
    let minutes = minutes_full.trunc();
    let seconds = (minutes_full - minutes) * 60.0;
    vec![
        Rational::from((degrees as u32, 1)),
        Rational::from((minutes as u32, 1)),
        Rational::from(((seconds * 10_000.0).round() as u32, 10_000)),
    ]
}

fn ascii(value: &str) -> Value {
    Value::Ascii(vec![value.as_bytes().to_vec()])
}

/// Builds a minimal JPEG container carrying the given GPS position and capture time.
///
/// The image has no pixel data; it only exists so the index and the metadata reader
/// have something real to work with (test fixtures, demo libraries).
pub fn jpeg_with_metadata(
    coordinates: Option<GeoCoordinate>,
    taken: Option<NaiveDateTime>,
) -> Result<Vec<u8>, MetadataError> {
    let mut fields = Vec::new();
    if let Some(coord) = coordinates {
        let lat_ref = if coord.latitude < 0.0 { "S" } else { "N" };
        let lon_ref = if coord.longitude < 0.0 { "W" } else { "E" };
        fields.push(Field {
            tag: Tag::GPSLatitudeRef,
            ifd_num: In::PRIMARY,
            value: ascii(lat_ref),
        });
        fields.push(Field {
            tag: Tag::GPSLatitude,
            ifd_num: In::PRIMARY,
            value: Value::Rational(dms(coord.latitude)),
        });
        fields.push(Field {
            tag: Tag::GPSLongitudeRef,
            ifd_num: In::PRIMARY,
            value: ascii(lon_ref),
        });
        fields.push(Field {
            tag: Tag::GPSLongitude,
            ifd_num: In::PRIMARY,
            value: Value::Rational(dms(coord.longitude)),
        });
    }
    if let Some(taken) = taken {
        fields.push(Field {
            tag: Tag::DateTimeOriginal,
            ifd_num: In::PRIMARY,
            value: ascii(&taken.format("%Y:%m:%d %H:%M:%S").to_string()),
        });
    }

    let mut jpeg = vec![0xFF, 0xD8];
    if !fields.is_empty() {
        let mut writer = exif::experimental::Writer::new();
        for field in &fields {
            writer.push_field(field);
        }
        let mut tiff = Cursor::new(Vec::new());
        writer.write(&mut tiff, false)?;
        let tiff = tiff.into_inner();

        let segment_len = u16::try_from(2 + 6 + tiff.len()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "EXIF block too large")
        })?;
        jpeg.extend_from_slice(&[0xFF, 0xE1]);
        jpeg.extend_from_slice(&segment_len.to_be_bytes());
        jpeg.extend_from_slice(b"Exif\0\0");
        jpeg.extend_from_slice(&tiff);
    }
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    Ok(jpeg)
}
