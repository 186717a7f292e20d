use std::path::Path;

use anyhow::{Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, xobject, Document, Object, ObjectId};

/// Incrementally built PDF where every page carries exactly one image
/// at a 1:1 pixel-to-unit scale.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Append one `width` x `height` page with the PNG drawn from the
    /// origin over the full page. No scaling, no margins.
    pub fn add_page(&mut self, png: &[u8], width: u32, height: u32) -> Result<()> {
        let image = xobject::image_from(png.to_vec()).context("failed to embed image")?;
        let image_id = self.doc.add_object(image);
        let image_name = format!("Im{}", self.page_ids.len() + 1);

        // Scale the unit-square image XObject up to the page size.
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        (width as i64).into(),
                        0.into(),
                        0.into(),
                        (height as i64).into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(image_name.clone().into_bytes())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self.doc.add_object(lopdf::Stream::new(
            dictionary! {},
            content.encode().context("failed to encode page content")?,
        ));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                (width as i64).into(),
                (height as i64).into(),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { image_name => image_id },
            },
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    /// Finalize the page tree and write the document, replacing any
    /// prior file at `path`.
    pub fn save(mut self, path: &Path) -> Result<()> {
        let kids: Vec<Object> = self.page_ids.iter().map(|&id| id.into()).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();
        self.doc
            .save(path)
            .with_context(|| format!("failed to save {}", path.display()))?;
        Ok(())
    }
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}
