//! PDF assembly with `lopdf`. CPU-bound: call from `spawn_blocking`.

use std::io::Cursor;

use bytes::Bytes;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::warn;

use super::ExportError;
use crate::layout::{layout_page, PageGeometry, PageLayout, PlacedLine, HELVETICA};

const FONT_RESOURCE: &str = "F1";
const IMAGE_RESOURCE: &str = "Im0";
const JPEG_QUALITY: u8 = 90;

/// Body text grey (#333) and footer grey (#666).
const BODY_GREY: f32 = 0.2;
const FOOTER_GREY: f32 = 0.4;

/// One page of the document before layout. `image` holds the raw fetched
/// bytes; anything that fails to decode is dropped and the page goes out
/// text-only.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub text: String,
    pub footer: String,
    pub image: Option<Bytes>,
}

struct EmbeddedImage {
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
}

/// Decodes any supported format and re-encodes it as baseline RGB JPEG.
fn to_jpeg(raw: &[u8]) -> Result<EmbeddedImage, image::ImageError> {
    let decoded = image::load_from_memory(raw)?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut jpeg = Vec::new();
    {
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
            Cursor::new(&mut jpeg),
            JPEG_QUALITY,
        );
        encoder.encode_image(&rgb)?;
    }
    Ok(EmbeddedImage {
        jpeg,
        width,
        height,
    })
}

/// Maps text to WinAnsi bytes for the standard Helvetica encoding.
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2026}' => 0x85,
            '\t' => b' ',
            _ => b'?',
        })
        .collect()
}

fn text_ops(ops: &mut Vec<Operation>, line: &PlacedLine, size: f32, grey: f32) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![Object::Name(FONT_RESOURCE.into()), Object::Real(size)],
    ));
    ops.push(Operation::new("g", vec![Object::Real(grey)]));
    ops.push(Operation::new(
        "Td",
        vec![Object::Real(line.x), Object::Real(line.y)],
    ));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(win_ansi(&line.text), StringFormat::Literal)],
    ));
    ops.push(Operation::new("ET", vec![]));
}

fn page_operations(layout: &PageLayout) -> Vec<Operation> {
    let mut ops = Vec::new();
    if let Some(image) = layout.image {
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                Object::Real(image.width),
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(image.height),
                Object::Real(image.x),
                Object::Real(image.y),
            ],
        ));
        ops.push(Operation::new(
            "Do",
            vec![Object::Name(IMAGE_RESOURCE.into())],
        ));
        ops.push(Operation::new("Q", vec![]));
    }
    for line in &layout.body {
        text_ops(&mut ops, line, layout.body_size, BODY_GREY);
    }
    text_ops(&mut ops, &layout.footer, layout.footer_size, FOOTER_GREY);
    ops
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    geometry: &PageGeometry,
    index: usize,
    sheet: &Sheet,
) -> Result<ObjectId, ExportError> {
    let embedded = sheet.image.as_ref().and_then(|raw| match to_jpeg(raw) {
        Ok(img) => Some(img),
        Err(e) => {
            warn!(page = index, error = %e, "Page image could not be decoded; rendering text only");
            None
        }
    });

    let layout = layout_page(
        geometry,
        &HELVETICA,
        &sheet.text,
        embedded.as_ref().map(|img| (img.width, img.height)),
        &sheet.footer,
    );
    if layout.clipped_lines > 0 {
        warn!(
            page = index,
            clipped = layout.clipped_lines,
            "Page text overflowed the export page"
        );
    }

    let mut resources = dictionary! {
        "Font" => dictionary! { FONT_RESOURCE => font_id },
    };
    if let (Some(img), Some(_)) = (embedded, layout.image) {
        let xobject = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(i64::from(img.width)),
                "Height" => Object::Integer(i64::from(img.height)),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => "DCTDecode",
            },
            img.jpeg,
        )
        .with_compression(false);
        let image_id = doc.add_object(xobject);
        resources.set("XObject", dictionary! { IMAGE_RESOURCE => image_id });
    }

    let content = Content {
        operations: page_operations(&layout),
    };
    let encoded = content
        .encode()
        .map_err(|e| ExportError::Render(format!("page {index}: {e}")))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources,
    }))
}

/// Renders every sheet to one page of `geometry` size and returns the PDF bytes.
pub fn render_document(geometry: &PageGeometry, sheets: &[Sheet]) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => HELVETICA.base_font,
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids = Vec::with_capacity(sheets.len());
    for (index, sheet) in sheets.iter().enumerate() {
        let page_id = add_page(&mut doc, pages_id, font_id, geometry, index, sheet)?;
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(sheets.len() as i64),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(geometry.width),
                Object::Real(geometry.height),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ExportError::Render(e.to_string()))?;
    Ok(out)
}
