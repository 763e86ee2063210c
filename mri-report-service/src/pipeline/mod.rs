pub mod archive;
pub mod caption;
pub mod compose;
pub mod extract;

pub use archive::ReportArchiver;
pub use caption::CaptionService;
pub use compose::{ComposedReport, REPORT_TEMPLATE_ID, ReportComposer};
pub use extract::extract_text;

#[cfg(test)]
pub(crate) mod test_support {
    /// Builds a minimal valid PDF with one text line per page, so extraction
    /// tests run against real document bytes.
    pub fn make_test_pdf(pages: &[&str]) -> Vec<u8> {
        use lopdf::dictionary;
        use lopdf::{Document, Object, Stream};

        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();

        for text in pages {
            let escaped = text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)");
            let content = format!("BT /F1 12 Tf 100 700 Td ({escaped}) Tj ET");
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("failed to serialize test PDF");
        bytes
    }
}
