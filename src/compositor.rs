use crate::config::ReadingDirection;
use crate::error::{MangaBindError, Result};
use crate::models::{image_path, CompositePage, Document};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const PAGE_WIDTH_MM: f32 = 279.4;
pub const PAGE_HEIGHT_MM: f32 = 215.9;

pub fn mm_to_pt(mm: f32) -> f32 {
    mm * 72.0 / 25.4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn of(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Lay out images (given by orientation, index 1 first) onto pages.
///
/// The image following a portrait one always completes its spread, even when
/// it is landscape.
pub fn plan_pages(orientations: &[Orientation]) -> Vec<CompositePage> {
    let count = orientations.len();
    let mut pages = Vec::new();
    let mut i = 1;
    while i <= count {
        match orientations[i - 1] {
            Orientation::Landscape => {
                pages.push(CompositePage::Full { index: i });
                i += 1;
            }
            Orientation::Portrait => {
                let second = (i < count).then_some(i + 1);
                pages.push(CompositePage::Spread { first: i, second });
                i += if second.is_some() { 2 } else { 1 };
            }
        }
    }
    pages
}

/// Placement of one image on a page, in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub fn slots(page: &CompositePage, direction: ReadingDirection) -> Vec<Slot> {
    let width = mm_to_pt(PAGE_WIDTH_MM);
    let height = mm_to_pt(PAGE_HEIGHT_MM);
    let half = width / 2.0;

    match *page {
        CompositePage::Full { index } => vec![Slot {
            index,
            x: 0.0,
            y: 0.0,
            width,
            height,
        }],
        CompositePage::Spread { first, second } => {
            let (first_x, second_x) = match direction {
                ReadingDirection::LeftToRight => (0.0, half),
                ReadingDirection::RightToLeft => (half, 0.0),
            };
            let mut out = vec![Slot {
                index: first,
                x: first_x,
                y: 0.0,
                width: half,
                height,
            }];
            if let Some(index) = second {
                out.push(Slot {
                    index,
                    x: second_x,
                    y: 0.0,
                    width: half,
                    height,
                });
            }
            out
        }
    }
}

/// Image data ready to be placed in the PDF as an XObject.
struct PageImage {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
}

impl PageImage {
    fn load(directory: &Path, index: usize) -> Result<Self> {
        let path = image_path(directory, index);
        let bytes =
            std::fs::read(&path).map_err(|e| MangaBindError::missing_resource(index, &path, e))?;
        Self::from_bytes(bytes).map_err(|e| MangaBindError::missing_resource(index, &path, e))
    }

    fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let (width, height) = image::io::Reader::new(Cursor::new(&bytes))
            .with_guessed_format()?
            .into_dimensions()?;

        // Baseline/progressive 8-bit JPEG goes in untouched.
        let passthrough = match jpeg_components(&bytes) {
            Some(1) => Some("DeviceGray"),
            Some(3) => Some("DeviceRGB"),
            _ => None,
        };
        if let Some(color_space) = passthrough {
            return Ok(Self {
                width,
                height,
                color_space,
                filter: "DCTDecode",
                data: bytes,
            });
        }

        let rgb = image::load_from_memory(&bytes)?.to_rgb8();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(rgb.as_raw())?;
        Ok(Self {
            width: rgb.width(),
            height: rgb.height(),
            color_space: "DeviceRGB",
            filter: "FlateDecode",
            data: encoder.finish()?,
        })
    }

    fn orientation(&self) -> Orientation {
        Orientation::of(self.width, self.height)
    }

    fn into_stream(self) -> Stream {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "ColorSpace" => self.color_space,
            "BitsPerComponent" => 8,
            "Filter" => self.filter,
        };
        Stream::new(dict, self.data).with_compression(false)
    }
}

/// Component count of an 8-bit baseline, extended or progressive JPEG, read
/// from its SOF segment. Other JPEG processes are not DCTDecode-compatible.
fn jpeg_components(data: &[u8]) -> Option<u8> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        match marker {
            0xFF => {
                pos += 1;
                continue;
            }
            0x01 | 0xD0..=0xD8 => {
                pos += 2;
                continue;
            }
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let precision = *data.get(pos + 4)?;
            return if matches!(marker, 0xC0..=0xC2) && precision == 8 {
                data.get(pos + 9).copied()
            } else {
                None
            };
        }
        pos += 2 + len;
    }
    None
}

/// Compose `1.jpg ..= expected_count.jpg` from `directory` into a PDF at
/// `output`.
///
/// Every image is loaded before anything is written, so a missing or
/// unreadable file leaves no document behind.
pub fn compose(
    directory: &Path,
    expected_count: usize,
    direction: ReadingDirection,
    output: &Path,
) -> Result<Document> {
    if expected_count == 0 {
        return Err(MangaBindError::invalid_input(
            "refusing to create a document without pages",
        ));
    }

    let images = (1..=expected_count)
        .map(|index| PageImage::load(directory, index))
        .collect::<Result<Vec<_>>>()?;
    let orientations: Vec<Orientation> = images.iter().map(PageImage::orientation).collect();
    let pages = plan_pages(&orientations);
    debug!("Planned {} pages for {} images", pages.len(), expected_count);

    let mut pdf = build_pdf(images, &pages, direction)?;

    let part = part_path(output);
    if let Err(e) = save_and_rename(&mut pdf, &part, output) {
        let _ = std::fs::remove_file(&part);
        return Err(e);
    }
    debug!("Wrote {:?} ({} pages)", output, pages.len());

    Ok(Document {
        path: output.to_path_buf(),
        pages,
    })
}

fn save_and_rename(pdf: &mut lopdf::Document, part: &Path, output: &Path) -> Result<()> {
    pdf.save(part)?;
    std::fs::rename(part, output)?;
    Ok(())
}

fn part_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn build_pdf(
    images: Vec<PageImage>,
    pages: &[CompositePage],
    direction: ReadingDirection,
) -> Result<lopdf::Document> {
    let mut pdf = lopdf::Document::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let image_ids: Vec<ObjectId> = images
        .into_iter()
        .map(|image| pdf.add_object(image.into_stream()))
        .collect();

    let media_box: Vec<Object> = vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Real(mm_to_pt(PAGE_WIDTH_MM)),
        Object::Real(mm_to_pt(PAGE_HEIGHT_MM)),
    ];

    let mut kids = Vec::with_capacity(pages.len());
    for page in pages {
        let mut xobjects = Dictionary::new();
        let mut operations = Vec::new();
        for slot in slots(page, direction) {
            let name = format!("Im{}", slot.index);
            xobjects.set(name.clone(), Object::Reference(image_ids[slot.index - 1]));
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                vec![
                    Object::Real(slot.width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(slot.height),
                    Object::Real(slot.x),
                    Object::Real(slot.y),
                ],
            ));
            operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
            operations.push(Operation::new("Q", vec![]));
        }

        let content = Content { operations };
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box.clone(),
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => xobjects,
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    pdf.trailer.set("Root", catalog_id);

    Ok(pdf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, RgbImage};

    use super::Orientation::{Landscape as L, Portrait as P};

    fn write_jpeg(dir: &Path, index: usize, width: u32, height: u32) {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30])));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageOutputFormat::Jpeg(80)).unwrap();
        std::fs::write(image_path(dir, index), bytes.into_inner()).unwrap();
    }

    fn write_png_as_jpg(dir: &Path, index: usize, width: u32, height: u32) {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([0, 90, 0])));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageOutputFormat::Png).unwrap();
        std::fs::write(image_path(dir, index), bytes.into_inner()).unwrap();
    }

    #[test]
    fn mixed_orientations_pack_into_expected_pages() {
        let pages = plan_pages(&[L, P, P, L, P]);
        assert_eq!(
            pages,
            vec![
                CompositePage::Full { index: 1 },
                CompositePage::Spread { first: 2, second: Some(3) },
                CompositePage::Full { index: 4 },
                CompositePage::Spread { first: 5, second: None },
            ]
        );
    }

    #[test]
    fn image_after_portrait_is_paired_without_orientation_check() {
        let pages = plan_pages(&[P, L, L]);
        assert_eq!(
            pages,
            vec![
                CompositePage::Spread { first: 1, second: Some(2) },
                CompositePage::Full { index: 3 },
            ]
        );
    }

    #[test]
    fn square_images_count_as_portrait() {
        assert_eq!(Orientation::of(500, 500), P);
        assert_eq!(Orientation::of(501, 500), L);
    }

    #[test]
    fn reading_direction_swaps_spread_halves() {
        let page = CompositePage::Spread { first: 1, second: Some(2) };
        let half = mm_to_pt(PAGE_WIDTH_MM) / 2.0;

        let ltr = slots(&page, ReadingDirection::LeftToRight);
        assert_eq!((ltr[0].index, ltr[0].x), (1, 0.0));
        assert_eq!((ltr[1].index, ltr[1].x), (2, half));

        let rtl = slots(&page, ReadingDirection::RightToLeft);
        assert_eq!((rtl[0].index, rtl[0].x), (1, half));
        assert_eq!((rtl[1].index, rtl[1].x), (2, 0.0));
    }

    #[test]
    fn letter_landscape_in_points() {
        assert!((mm_to_pt(PAGE_WIDTH_MM) - 792.0).abs() < 0.01);
        assert!((mm_to_pt(PAGE_HEIGHT_MM) - 612.0).abs() < 0.01);
    }

    #[test]
    fn compose_writes_one_pdf_page_per_composite_page() {
        let dir = tempfile::tempdir().unwrap();
        let chapter = dir.path().join("chapter-1");
        std::fs::create_dir(&chapter).unwrap();
        write_jpeg(&chapter, 1, 120, 80);
        write_jpeg(&chapter, 2, 60, 90);
        write_png_as_jpg(&chapter, 3, 60, 90);
        write_jpeg(&chapter, 4, 120, 80);
        write_jpeg(&chapter, 5, 60, 90);

        let output = dir.path().join("chapter-1.pdf");
        let document = compose(&chapter, 5, ReadingDirection::LeftToRight, &output).unwrap();

        assert_eq!(document.page_count(), 4);
        let pdf = lopdf::Document::load(&output).unwrap();
        assert_eq!(pdf.get_pages().len(), 4);
        assert!(!part_path(&output).exists());
    }

    #[test]
    fn missing_index_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        write_jpeg(dir.path(), 1, 60, 90);
        write_jpeg(dir.path(), 3, 60, 90);

        let output = dir.path().join("out.pdf");
        let result = compose(dir.path(), 3, ReadingDirection::LeftToRight, &output);

        match result {
            Err(MangaBindError::MissingResource { index, .. }) => assert_eq!(index, 2),
            other => panic!("expected MissingResource, got {:?}", other),
        }
        assert!(!output.exists());
    }

    #[test]
    fn unreadable_image_is_a_missing_resource() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(image_path(dir.path(), 1), b"<html>403</html>").unwrap();

        let result = compose(
            dir.path(),
            1,
            ReadingDirection::LeftToRight,
            &dir.path().join("out.pdf"),
        );
        assert!(matches!(
            result,
            Err(MangaBindError::MissingResource { index: 1, .. })
        ));
    }

    #[test]
    fn zero_images_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("empty.pdf");
        assert!(compose(dir.path(), 0, ReadingDirection::LeftToRight, &output).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn jpeg_components_reads_sof() {
        let dir = tempfile::tempdir().unwrap();
        write_jpeg(dir.path(), 1, 10, 10);
        let bytes = std::fs::read(image_path(dir.path(), 1)).unwrap();
        assert_eq!(jpeg_components(&bytes), Some(3));
        assert_eq!(jpeg_components(b"\x89PNG\r\n\x1a\n"), None);
    }

    fn sof_header(marker: u8) -> Vec<u8> {
        vec![
            0xFF, 0xD8, // SOI
            0xFF, marker, 0x00, 0x11, // SOFn, length 17
            0x08, 0x00, 0x10, 0x00, 0x10, 0x03, // precision, 16x16, 3 components
            0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01,
        ]
    }

    #[test]
    fn only_dct_compatible_sof_markers_pass_through() {
        assert_eq!(jpeg_components(&sof_header(0xC0)), Some(3));
        assert_eq!(jpeg_components(&sof_header(0xC1)), Some(3));
        assert_eq!(jpeg_components(&sof_header(0xC2)), Some(3));
        assert_eq!(jpeg_components(&sof_header(0xC3)), None);
        assert_eq!(jpeg_components(&sof_header(0xC7)), None);
        assert_eq!(jpeg_components(&sof_header(0xC9)), None);
    }

    #[test]
    fn failed_write_leaves_no_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let chapter = dir.path().join("chapter-2");
        std::fs::create_dir(&chapter).unwrap();
        write_jpeg(&chapter, 1, 120, 80);

        // A directory already sitting at the output path makes the rename fail.
        let output = dir.path().join("chapter-2.pdf");
        std::fs::create_dir(&output).unwrap();
        std::fs::write(output.join("keep"), b"x").unwrap();

        let result = compose(&chapter, 1, ReadingDirection::LeftToRight, &output);

        assert!(result.is_err());
        assert!(!part_path(&output).exists());
        assert!(output.join("keep").exists());
    }
}
