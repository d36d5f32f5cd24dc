//! Shared fixtures for integration tests.
#![allow(dead_code)]

use pdf_forge::Document;

/// Assemble a PDF file from object bodies. Object `i + 1` is `objects[i]`
/// and object 1 must be the catalog.
pub fn build_pdf(objects: &[String]) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    out
}

/// An unfiltered stream object body.
pub fn stream(content: &str) -> String {
    format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content)
}

/// Content drawing `label` at the top left of a Letter page.
pub fn label_content(label: &str) -> String {
    format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", label)
}

/// `n` Letter pages labelled "Page 1" .. "Page n". MediaBox and Resources
/// are inherited from the root.
pub fn labelled_pdf(n: usize) -> Vec<u8> {
    let first_page = 4;
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", first_page + 2 * i)).collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> >>",
            kids.join(" "),
            n
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];
    for i in 0..n {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>",
            first_page + 2 * i + 1
        ));
        objects.push(stream(&label_content(&format!("Page {}", i + 1))));
    }
    build_pdf(&objects)
}

/// Three pages under a two-level tree. Pages 1 and 2 sit in an
/// intermediate node carrying `/Rotate 90` and an A5 MediaBox.
pub fn nested_pdf() -> Vec<u8> {
    build_pdf(&[
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [4 0 R 9 0 R] /Count 3 /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 3 0 R >> >> >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        "<< /Type /Pages /Parent 2 0 R /Kids [5 0 R 7 0 R] /Count 2 /Rotate 90 \
         /MediaBox [0 0 420 595] >>"
            .to_string(),
        "<< /Type /Page /Parent 4 0 R /Contents 6 0 R >>".to_string(),
        stream(&label_content("Page 1")),
        "<< /Type /Page /Parent 4 0 R /Contents 8 0 R >>".to_string(),
        stream(&label_content("Page 2")),
        "<< /Type /Page /Parent 2 0 R /Contents 10 0 R >>".to_string(),
        stream(&label_content("Page 3")),
    ])
}

/// Route library logs through the test harness; `RUST_LOG` picks the level.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Open an in-memory fixture.
pub fn open(bytes: &[u8]) -> Document {
    init_logging();
    Document::open(bytes).expect("fixture should parse")
}

/// Page labels in page order, read back through text extraction.
pub fn labels(doc: &Document) -> Vec<String> {
    (1..=doc.page_count())
        .map(|p| pdf_forge::content::extract_page_text(doc, p).unwrap())
        .collect()
}

/// `["Page 1", ..]` for the given 1-based numbers.
pub fn expected(numbers: &[usize]) -> Vec<String> {
    numbers.iter().map(|n| format!("Page {}", n)).collect()
}
