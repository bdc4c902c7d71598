//! Recovery behavior on damaged files.

mod common;

use common::{one_page_pdf, simple_font_dict, PdfBuilder};
use pdf_sift::{extract_pages, Document, Error, ExtractOptions};

#[test]
fn corrupted_xref_falls_back_to_object_scan() {
    let mut pdf = one_page_pdf(b"BT /F1 12 Tf 72 720 Td (still readable) Tj ET");
    // Break the xref table keyword; the object headers stay intact.
    let pos = pdf.windows(5).rposition(|w| w == b"xref\n").unwrap();
    pdf[pos..pos + 4].copy_from_slice(b"xrff");

    let doc = Document::new(pdf).unwrap();
    let obj = doc.get_object(1);
    assert_eq!(
        obj.as_dict()
            .and_then(|d| d.get("Type"))
            .and_then(|o| o.as_name()),
        Some("Catalog")
    );
}

#[test]
fn corrupted_xref_still_extracts_text() {
    let mut pdf = one_page_pdf(b"BT /F1 12 Tf 72 720 Td (still readable) Tj ET");
    let pos = pdf.windows(9).rposition(|w| w == b"startxref").unwrap();
    // Point startxref at garbage.
    pdf[pos + 10] = b'1';
    pdf[pos + 11] = b'1';

    let pages = extract_pages(pdf, &ExtractOptions::default()).unwrap();
    assert_eq!(pages[0].get_text(), "still readable\n");
}

#[test]
fn missing_footer_is_recovered_by_scan() {
    // A body with no xref, no trailer pointer, but a trailer keyword.
    let mut b = PdfBuilder::new();
    b.object(1, b"<< /Type /Catalog /Pages 2 0 R >>");
    b.object(
        2,
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
    );
    b.object(
        3,
        b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>",
    );
    b.stream_object(4, "", b"BT /F1 12 Tf 72 720 Td (salvaged) Tj ET");
    b.object(5, simple_font_dict().as_bytes());
    b.raw(b"trailer\n<< /Root 1 0 R >>\n");
    let pdf = b.into_body();

    let pages = extract_pages(pdf, &ExtractOptions::default()).unwrap();
    assert_eq!(pages[0].get_text(), "salvaged\n");
}

#[test]
fn hopeless_garbage_is_a_fatal_error() {
    let garbage = b"this is not a pdf at all, nothing to salvage".to_vec();
    match Document::new(garbage) {
        Err(Error::NoValidXref(_)) => {},
        other => panic!("expected NoValidXref, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn wrong_stream_length_is_recovered() {
    // /Length lies; the endstream search finds the real boundary.
    let mut b = PdfBuilder::new();
    b.object(1, b"<< /Type /Catalog /Pages 2 0 R >>");
    b.object(
        2,
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
    );
    b.object(
        3,
        b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>",
    );
    let content = b"BT /F1 12 Tf 72 720 Td (length lied) Tj ET";
    let mut stream = b"<< /Length 7 >>\nstream\n".to_vec();
    stream.extend_from_slice(content);
    stream.extend_from_slice(b"\nendstream");
    b.object(4, &stream);
    b.object(5, simple_font_dict().as_bytes());
    let pdf = b.finish("/Root 1 0 R");

    let pages = extract_pages(pdf, &ExtractOptions::default()).unwrap();
    assert_eq!(pages[0].get_text(), "length lied\n");
}

#[test]
fn header_mismatch_tolerated() {
    // The xref points at object 4, but the header there says `9 0 obj`;
    // the reader scans forward for the obj keyword and parses anyway.
    let mut b = PdfBuilder::new();
    b.object(1, b"<< /Type /Catalog /Pages 2 0 R >>");
    b.object(
        2,
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
    );
    b.object(
        3,
        b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>",
    );
    b.stream_object(4, "", b"BT /F1 12 Tf 72 720 Td (mislabeled) Tj ET");
    b.object(5, simple_font_dict().as_bytes());
    let mut pdf = b.finish("/Root 1 0 R");
    let pos = pdf.windows(7).position(|w| w == b"4 0 obj").unwrap();
    pdf.splice(pos..pos + 7, b"9 0 obj".iter().copied());

    let pages = extract_pages(pdf, &ExtractOptions::default()).unwrap();
    assert_eq!(pages[0].get_text(), "mislabeled\n");
}
