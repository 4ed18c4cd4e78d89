//! Map overlays: KML markup, and KMZ (KML plus the photos, zipped).
//!
//! Both share [`placemarks_kml`] and [`bubble_html`], so a placemark looks the
//! same in either file apart from the embedded photo.

use anyhow::{Context, Result};
use quick_xml::Writer;
use quick_xml::escape::escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::{ExportFormat, ItemFailure, Rendered, Renderer, sanitize_filename};
use crate::record::ImageRecord;
use crate::thumbnail::prepare_thumbnail;
use crate::title;

const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
// Capture times carry no zone, so `when` is written without one (local time in KML)
const KML_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const BUBBLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What goes below the text in a placemark bubble.
#[derive(Debug, Clone, Copy)]
pub enum BubbleImage<'a> {
    /// KML without imagery: nothing.
    None,
    /// KMZ: the archive path of the embedded photo, and its display width.
    Embedded { href: &'a str, width: u32 },
    /// KMZ, but the photo could not be prepared.
    Unavailable,
}

/// Placemark bubble HTML. Values are escaped; description newlines become `<br/>`.
pub fn bubble_html(record: &ImageRecord, image: BubbleImage) -> String {
    let mut parts = vec![format!("<b>{}</b>", escape(title::resolve(record)))];

    let custom_name = record.custom_name_or_empty().trim();
    if !custom_name.is_empty() {
        parts.push(format!("<b>Nome Personalizado:</b> {}", escape(custom_name)));
    }
    let description = record.description_or_empty().trim();
    if !description.is_empty() {
        let lines: Vec<_> = description.lines().map(|l| escape(l).into_owned()).collect();
        parts.push(format!("<b>Descrição:</b> {}", lines.join("<br/>")));
    }
    parts.push(format!("<b>Arquivo:</b> {}", escape(record.filename.as_str())));
    parts.push(format!(
        "<b>Data:</b> {}",
        record
            .capture_timestamp
            .map(|ts| ts.format(BUBBLE_TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| "N/A".into())
    ));
    if let Some((lat, lon)) = record.coordinates() {
        parts.push(format!("<b>Lat/Lon:</b> {lat:.7}, {lon:.7}"));
    }
    if let Some(p) = record.projected {
        parts.push(format!(
            "<b>UTM:</b> Zona {}{}, E: {:.2}, N: {:.2}",
            p.zone, p.hemisphere, p.easting, p.northing
        ));
    }

    let mut html = parts.join("<br/>");
    match image {
        BubbleImage::None => {}
        BubbleImage::Embedded { href, width } => {
            html.push_str(&format!(
                "<hr/><img src=\"{}\" alt=\"Foto\" width=\"{width}\" />",
                escape(href)
            ));
        }
        BubbleImage::Unavailable => html.push_str("<hr/><i>Imagem não disponível.</i>"),
    }
    html
}

/// A complete KML document with one placemark per placeable record.
///
/// `images` maps a file name to the archive path of its embedded photo; a
/// `Some` map marks a KMZ document, so records missing from it get the
/// "unavailable" note.
pub fn placemarks_kml(
    document_name: &str,
    records: &[ImageRecord],
    images: Option<(&HashMap<String, String>, u32)>,
) -> Result<(Vec<u8>, usize)> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("kml").with_attributes([("xmlns", KML_NAMESPACE)]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("Document")))?;
    text_element(&mut writer, "name", document_name)?;

    let mut written = 0;
    for record in records {
        let (Some((lat, lon)), Some(_)) = (record.coordinates(), record.projected) else {
            continue;
        };

        let image = match images {
            None => BubbleImage::None,
            Some((hrefs, width)) => match hrefs.get(&record.filename) {
                Some(href) => BubbleImage::Embedded { href, width },
                None => BubbleImage::Unavailable,
            },
        };

        writer.write_event(Event::Start(BytesStart::new("Placemark")))?;
        text_element(&mut writer, "name", title::resolve(record))?;
        if let Some(ts) = record.capture_timestamp {
            writer.write_event(Event::Start(BytesStart::new("TimeStamp")))?;
            text_element(&mut writer, "when", &ts.format(KML_TIMESTAMP_FORMAT).to_string())?;
            writer.write_event(Event::End(BytesEnd::new("TimeStamp")))?;
        }
        writer.write_event(Event::Start(BytesStart::new("description")))?;
        writer.write_event(Event::CData(BytesCData::new(bubble_html(record, image))))?;
        writer.write_event(Event::End(BytesEnd::new("description")))?;
        writer.write_event(Event::Start(BytesStart::new("Point")))?;
        text_element(&mut writer, "coordinates", &format!("{lon:.7},{lat:.7},0"))?;
        writer.write_event(Event::End(BytesEnd::new("Point")))?;
        writer.write_event(Event::End(BytesEnd::new("Placemark")))?;
        written += 1;
    }

    writer.write_event(Event::End(BytesEnd::new("Document")))?;
    writer.write_event(Event::End(BytesEnd::new("kml")))?;

    let omitted = records.len() - written;
    if omitted > 0 {
        log::info!("{omitted} records without projected coordinates left off the map");
    }
    Ok((writer.into_inner(), written))
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// KML file without embedded imagery.
pub struct KmlRenderer {
    pub document_name: String,
}

impl Renderer for KmlRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Kml
    }

    fn render(&self, records: &[ImageRecord]) -> Result<Rendered> {
        let (bytes, entries) = placemarks_kml(&self.document_name, records, None)?;
        Ok(Rendered {
            bytes,
            entries,
            failures: Vec::new(),
        })
    }
}

/// KMZ archive: `doc.kml` plus an oriented, resized copy of every placed photo
/// under `files/`.
pub struct KmzRenderer {
    pub document_name: String,
    pub image_width: u32,
    pub image_quality: u8,
}

impl Renderer for KmzRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Kmz
    }

    fn render(&self, records: &[ImageRecord]) -> Result<Rendered> {
        let mut failures = Vec::new();
        let mut hrefs = HashMap::new();
        let mut used = HashSet::new();
        let mut assets = Vec::new();

        for record in records.iter().filter(|r| r.is_placeable()) {
            match prepare_thumbnail(&record.path, record.orientation, self.image_width, self.image_quality) {
                Ok(thumb) => {
                    let href = unique_asset_path(&record.filename, &mut used);
                    hrefs.insert(record.filename.clone(), href.clone());
                    assets.push((href, thumb.bytes));
                }
                Err(e) => failures.push(ItemFailure {
                    format: ExportFormat::Kmz,
                    filename: record.filename.clone(),
                    reason: format!("{e:#}"),
                }),
            }
        }

        let (kml, entries) =
            placemarks_kml(&self.document_name, records, Some((&hrefs, self.image_width)))?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        zip.start_file("doc.kml", options).context("Failed to add doc.kml")?;
        zip.write_all(&kml)?;
        // JPEG data does not compress further
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (href, bytes) in &assets {
            zip.start_file(href.as_str(), stored)
                .with_context(|| format!("Failed to add {href}"))?;
            zip.write_all(bytes)?;
        }
        let bytes = zip.finish().context("Failed to finish KMZ archive")?.into_inner();

        Ok(Rendered { bytes, entries, failures })
    }
}

/// `files/<stem>.jpg`, with a numeric suffix when two photos share a stem.
fn unique_asset_path(filename: &str, used: &mut HashSet<String>) -> String {
    let stem = std::path::Path::new(filename)
        .file_stem()
        .map(|s| sanitize_filename(&s.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "foto".to_string());

    let mut candidate = format!("files/{stem}.jpg");
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("files/{stem}_{n}.jpg");
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use crate::record::{Hemisphere, ProjectedCoord};
    use crate::test_utils::{write_geotagged, write_jpeg};
    use std::io::Read;
    use tempfile::TempDir;

    fn placed(filename: &str) -> ImageRecord {
        let mut record = ImageRecord::new(filename, format!("/nonexistent/{filename}"));
        record.latitude = Some(45.0);
        record.longitude = Some(-93.0);
        record.projected = Some(ProjectedCoord {
            easting: 500_000.0,
            northing: 4_982_950.4,
            zone: 15,
            hemisphere: Hemisphere::North,
        });
        record
    }

    fn kml_text(records: &[ImageRecord]) -> String {
        let rendered = KmlRenderer { document_name: "Coords test".into() }.render(records).unwrap();
        String::from_utf8(rendered.bytes).unwrap()
    }

    #[test]
    fn bubble_contents() {
        let mut record = placed("IMG_01.jpg");
        record.description = Some("Bridge\nbuilt <1920> & more".into());
        let html = bubble_html(&record, BubbleImage::None);

        assert!(html.starts_with("<b>Bridge</b>"));
        assert!(html.contains("<b>Descrição:</b> Bridge<br/>built &lt;1920&gt; &amp; more"));
        assert!(html.contains("<b>Arquivo:</b> IMG_01.jpg"));
        assert!(html.contains("<b>Data:</b> N/A"));
        assert!(html.contains("<b>Lat/Lon:</b> 45.0000000, -93.0000000"));
        assert!(html.contains("<b>UTM:</b> Zona 15N, E: 500000.00, N: 4982950.40"));
        assert!(!html.contains("Nome Personalizado"));
        assert!(!html.contains("<hr/>"));
    }

    #[test]
    fn bubble_image_slots() {
        let record = placed("a.jpg");
        let embedded = bubble_html(&record, BubbleImage::Embedded { href: "files/a.jpg", width: 400 });
        assert!(embedded.ends_with("<hr/><img src=\"files/a.jpg\" alt=\"Foto\" width=\"400\" />"));
        let missing = bubble_html(&record, BubbleImage::Unavailable);
        assert!(missing.ends_with("<hr/><i>Imagem não disponível.</i>"));
    }

    #[test]
    fn kml_skips_unplaced_records_and_keeps_order() {
        let mut b = placed("b.jpg");
        b.custom_name = Some("Second".into());
        let records = vec![placed("a.jpg"), ImageRecord::new("nogps.jpg", "nogps.jpg"), b];

        let text = kml_text(&records);
        assert_eq!(text.matches("<Placemark>").count(), 2);
        assert!(!text.contains("nogps.jpg"));
        let first = text.find("<name>a.jpg</name>").unwrap();
        let second = text.find("<name>Second</name>").unwrap();
        assert!(first < second);
        assert!(text.contains("<coordinates>-93.0000000,45.0000000,0</coordinates>"));
        assert!(text.contains("<name>Coords test</name>"));
        assert!(text.contains(KML_NAMESPACE));
    }

    #[test]
    fn kml_timestamp_and_cdata() {
        let mut record = placed("a.jpg");
        record.capture_timestamp =
            chrono::NaiveDate::from_ymd_opt(2023, 5, 1).and_then(|d| d.and_hms_opt(10, 20, 30));
        let text = kml_text(&[record]);
        assert!(text.contains("<when>2023-05-01T10:20:30</when>"));
        assert!(!text.contains("10:20:30Z"));
        assert!(text.contains("<![CDATA[<b>a.jpg</b>"));
    }

    #[test]
    fn kml_escapes_names() {
        let mut record = placed("a.jpg");
        record.custom_name = Some("Tom & Jerry <3".into());
        let text = kml_text(&[record]);
        assert!(text.contains("<name>Tom &amp; Jerry &lt;3</name>"));
    }

    #[test]
    fn kmz_packages_photos() {
        let dir = TempDir::new().unwrap();
        let good = write_geotagged(dir.path(), "IMG_01.jpg", Some("North Bridge"), None, (45, 'N'), (93, 'W'), "2023:05:01 10:20:30");
        let plain = write_jpeg(dir.path(), "plain.jpg", 8, 8, None);
        let mut records = vec![extract(&good).unwrap(), extract(&plain).unwrap()];
        // Placed, but the photo vanished before rendering
        records.push(placed("gone.jpg"));

        let renderer = KmzRenderer {
            document_name: "Coords test".into(),
            image_width: 16,
            image_quality: 85,
        };
        let rendered = renderer.render(&records).unwrap();
        assert_eq!(rendered.entries, 2);
        assert_eq!(rendered.failures.len(), 1);
        assert_eq!(rendered.failures[0].filename, "gone.jpg");

        let mut archive = zip::ZipArchive::new(Cursor::new(rendered.bytes)).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert!(names.contains(&"doc.kml".to_string()));
        assert!(names.contains(&"files/IMG_01.jpg".to_string()));
        assert_eq!(names.len(), 2);

        let mut doc = String::new();
        archive.by_name("doc.kml").unwrap().read_to_string(&mut doc).unwrap();
        assert!(doc.contains("<img src=\"files/IMG_01.jpg\""));
        assert!(doc.contains("<name>North Bridge</name>"));
        assert!(doc.contains("Imagem não disponível"));
        assert!(!doc.contains("plain.jpg"));

        let mut photo = Vec::new();
        archive.by_name("files/IMG_01.jpg").unwrap().read_to_end(&mut photo).unwrap();
        assert_eq!(image::load_from_memory(&photo).unwrap().width(), 16);
    }

    #[test]
    fn asset_paths_are_unique() {
        let mut used = HashSet::new();
        assert_eq!(unique_asset_path("a.jpg", &mut used), "files/a.jpg");
        assert_eq!(unique_asset_path("a.png", &mut used), "files/a_2.jpg");
        assert_eq!(unique_asset_path("my photo.jpg", &mut used), "files/my_photo.jpg");
    }
}
