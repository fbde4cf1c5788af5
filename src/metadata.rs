use std::fs;
use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use exif::experimental::Writer;
use exif::{Exif, Field, In, Reader, Tag, Value};
use img_parts::{Bytes, DynImage, ImageEXIF};

use crate::runlog::RunLog;

/// EXIF datetime fields carry this fixed layout.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Decoded EXIF block plus the timestamp fields the sync pass compares.
pub struct ExifTimestamps {
    exif: Exif,
    pub date_time: Option<NaiveDateTime>,
    pub date_time_original: Option<NaiveDateTime>,
    pub date_time_digitized: Option<NaiveDateTime>,
}

impl ExifTimestamps {
    /// Timestamp used for the in-sync check: DateTimeOriginal wins,
    /// DateTime is the fallback.
    pub fn primary(&self) -> Option<NaiveDateTime> {
        self.date_time_original.or(self.date_time)
    }
}

/// Outcome of the update path.
#[derive(Debug, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The primary timestamp already equals the target; nothing written.
    AlreadyInSync,
    /// The block was re-encoded and the file rewritten in place.
    Updated,
}

/// Decode the EXIF block of an image. Any decode failure is logged and
/// treated the same as "no metadata".
pub fn read_exif(path: &Path, log: &mut RunLog) -> Option<ExifTimestamps> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            log.line(&format!(
                "Failed to read EXIF data for {}: {}",
                path.display(),
                err
            ));
            return None;
        }
    };

    match Reader::new().read_from_container(&mut Cursor::new(&bytes)) {
        Ok(exif) => Some(ExifTimestamps {
            date_time: field_datetime(&exif, Tag::DateTime),
            date_time_original: field_datetime(&exif, Tag::DateTimeOriginal),
            date_time_digitized: field_datetime(&exif, Tag::DateTimeDigitized),
            exif,
        }),
        Err(exif::Error::NotFound(_)) => {
            log.line(&format!("No EXIF data found for {}", path.display()));
            None
        }
        Err(err) => {
            log.line(&format!(
                "Failed to read EXIF data for {}: {}",
                path.display(),
                err
            ));
            None
        }
    }
}

fn field_datetime(exif: &Exif, tag: Tag) -> Option<NaiveDateTime> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    parse_exif_datetime(&field.display_value().to_string())
}

/// Cameras (and the display layer) render the separator differently;
/// normalize to colons before parsing.
fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s.replace(['-', '/', '\\', '.'], ":");
    NaiveDateTime::parse_from_str(&cleaned, EXIF_DATETIME_FORMAT).ok()
}

/// Rewrite an existing EXIF block with `target` in the timestamp
/// fields, keeping every other primary-IFD field. The digitized field
/// is only written when it was already present. A target equal to the
/// current primary timestamp is a no-op.
pub fn update_exif(
    path: &Path,
    existing: &ExifTimestamps,
    target: NaiveDateTime,
) -> Result<UpdateStatus> {
    if existing.primary() == Some(target) {
        return Ok(UpdateStatus::AlreadyInSync);
    }

    let stamp = target.format(EXIF_DATETIME_FORMAT).to_string();
    let date_time = datetime_field(Tag::DateTime, &stamp);
    let original = datetime_field(Tag::DateTimeOriginal, &stamp);
    let digitized = datetime_field(Tag::DateTimeDigitized, &stamp);

    let mut writer = Writer::new();
    for field in existing.exif.fields() {
        if field.ifd_num != In::PRIMARY {
            continue;
        }
        if field.tag == Tag::DateTime
            || field.tag == Tag::DateTimeOriginal
            || field.tag == Tag::DateTimeDigitized
        {
            continue;
        }
        writer.push_field(field);
    }
    writer.push_field(&date_time);
    writer.push_field(&original);
    if existing.date_time_digitized.is_some() {
        writer.push_field(&digitized);
    }

    let payload = encode(&mut writer)?;
    splice_exif(path, payload)?;
    Ok(UpdateStatus::Updated)
}

/// Build a minimal EXIF block holding only the three timestamp fields
/// and rewrite the image with it.
pub fn create_exif(path: &Path, target: NaiveDateTime) -> Result<()> {
    let stamp = target.format(EXIF_DATETIME_FORMAT).to_string();
    let date_time = datetime_field(Tag::DateTime, &stamp);
    let original = datetime_field(Tag::DateTimeOriginal, &stamp);
    let digitized = datetime_field(Tag::DateTimeDigitized, &stamp);

    let mut writer = Writer::new();
    writer.push_field(&date_time);
    writer.push_field(&original);
    writer.push_field(&digitized);

    let payload = encode(&mut writer)?;
    splice_exif(path, payload)
}

fn datetime_field(tag: Tag, stamp: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![stamp.as_bytes().to_vec()]),
    }
}

fn encode(writer: &mut Writer) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, false)?;
    Ok(buf.into_inner())
}

/// Splice an EXIF payload into the image container and rewrite the
/// file in place (JPEG APP1 segment or PNG eXIf chunk).
fn splice_exif(path: &Path, payload: Vec<u8>) -> Result<()> {
    let input = fs::read(path)?;
    let mut image = DynImage::from_bytes(Bytes::from(input))?
        .ok_or_else(|| anyhow!("unrecognized image container"))?;
    image.set_exif(Some(Bytes::from(payload)));

    let mut output = Vec::new();
    image.encoder().write_to(&mut output)?;
    fs::write(path, output)?;
    Ok(())
}

/// Structurally valid JPEG with no metadata segments. img-parts and the
/// EXIF reader only walk segment markers, so no decodable image data is
/// needed.
#[cfg(test)]
pub(crate) fn minimal_jpeg() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8]; // SOI
    // img-parts splices a new EXIF (APP1) segment in at a fixed segment
    // index, so the container must already carry several leading segments
    // before the scan header for the insert to land ahead of it.
    bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x02]); // APP0, empty
    bytes.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x02]); // COM, empty
    bytes.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x02]); // COM, empty
    // SOS with a non-empty scan header (6 bytes). img-parts re-emits a
    // segment's trailing entropy only when its contents are non-empty, so
    // a zero-length scan header would drop the entropy on rewrite.
    bytes.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08]); // SOS, 6-byte header
    bytes.extend_from_slice(&[0x01, 0x00, 0x00, 0x3F, 0x00, 0x00]); // scan header
    bytes.extend_from_slice(&[0x12, 0x34, 0x56, 0x78]); // entropy-coded data
    bytes.extend_from_slice(&[0xFF, 0xD9]); // EOI
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn quiet_log() -> RunLog {
        RunLog::from_writer(Box::new(Vec::new()))
    }

    fn target(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, EXIF_DATETIME_FORMAT).unwrap()
    }

    fn write_jpeg(dir: &TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&minimal_jpeg()).unwrap();
        path
    }

    #[test]
    fn datetime_parsing_tolerates_separator_variants() {
        let expected = Some(target("2023:06:15 10:30:00"));
        assert_eq!(parse_exif_datetime("2023:06:15 10:30:00"), expected);
        assert_eq!(parse_exif_datetime("2023-06-15 10:30:00"), expected);
        assert_eq!(parse_exif_datetime("2023/06/15 10:30:00"), expected);
        assert!(parse_exif_datetime("last tuesday").is_none());
    }

    #[test]
    fn bare_jpeg_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = write_jpeg(&dir, "a.jpg");
        assert!(read_exif(&path, &mut quiet_log()).is_none());
    }

    #[test]
    fn create_then_read_round_trips_all_three_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_jpeg(&dir, "a.jpg");
        let when = target("2023:06:15 10:30:00");

        create_exif(&path, when).unwrap();

        let read = read_exif(&path, &mut quiet_log()).unwrap();
        assert_eq!(read.date_time, Some(when));
        assert_eq!(read.date_time_original, Some(when));
        assert_eq!(read.date_time_digitized, Some(when));
        assert_eq!(read.primary(), Some(when));
    }

    #[test]
    fn update_is_a_noop_when_primary_matches() {
        let dir = TempDir::new().unwrap();
        let path = write_jpeg(&dir, "a.jpg");
        let when = target("2023:06:15 10:30:00");
        create_exif(&path, when).unwrap();
        let before = fs::read(&path).unwrap();

        let read = read_exif(&path, &mut quiet_log()).unwrap();
        let status = update_exif(&path, &read, when).unwrap();

        assert_eq!(status, UpdateStatus::AlreadyInSync);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn update_overwrites_a_different_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = write_jpeg(&dir, "a.jpg");
        create_exif(&path, target("2020:01:01 00:00:00")).unwrap();

        let read = read_exif(&path, &mut quiet_log()).unwrap();
        let when = target("2023:06:15 10:30:00");
        let status = update_exif(&path, &read, when).unwrap();
        assert_eq!(status, UpdateStatus::Updated);

        let read = read_exif(&path, &mut quiet_log()).unwrap();
        assert_eq!(read.date_time, Some(when));
        assert_eq!(read.date_time_original, Some(when));
        // digitized existed before the update, so it is rewritten too
        assert_eq!(read.date_time_digitized, Some(when));
    }

    #[test]
    fn update_keeps_unrelated_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_jpeg(&dir, "a.jpg");

        // Seed a block that carries a camera model next to the timestamps.
        let model = Field {
            tag: Tag::Model,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![b"ACME 9000".to_vec()]),
        };
        let stamp = datetime_field(Tag::DateTime, "2020:01:01 00:00:00");
        let mut writer = Writer::new();
        writer.push_field(&model);
        writer.push_field(&stamp);
        let payload = encode(&mut writer).unwrap();
        splice_exif(&path, payload).unwrap();

        let read = read_exif(&path, &mut quiet_log()).unwrap();
        update_exif(&path, &read, target("2023:06:15 10:30:00")).unwrap();

        let read = read_exif(&path, &mut quiet_log()).unwrap();
        let model = read.exif.get_field(Tag::Model, In::PRIMARY).unwrap();
        assert!(model.display_value().to_string().contains("ACME 9000"));
    }

    #[test]
    fn non_image_bytes_fail_to_splice() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jpg");
        fs::write(&path, b"not an image").unwrap();

        let before = fs::read(&path).unwrap();
        assert!(create_exif(&path, target("2023:06:15 10:30:00")).is_err());
        assert_eq!(fs::read(&path).unwrap(), before);
    }
}
