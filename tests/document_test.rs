//! Document model: page trees, outlines, named destinations, metadata.

mod common;

use common::PdfBuilder;
use pdf_sift::xref::XrefEntry;
use pdf_sift::Document;

/// A three-page document with a nested page tree and outlines.
fn structured_pdf() -> Vec<u8> {
    let mut b = PdfBuilder::new();
    b.object(
        1,
        b"<< /Type /Catalog /Pages 2 0 R /Outlines 10 0 R /Names << /Dests 14 0 R >> >>",
    );
    // Root Pages node: an inner Pages node plus a direct page.
    b.object(
        2,
        b"<< /Type /Pages /Kids [6 0 R 5 0 R] /Count 3 /MediaBox [0 0 612 792] /Resources << >> >>",
    );
    b.object(3, b"<< /Type /Page /Parent 6 0 R /Contents 8 0 R >>");
    b.object(
        4,
        b"<< /Type /Page /Parent 6 0 R /MediaBox [0 0 300 300] /Rotate 90 /Contents 8 0 R >>",
    );
    b.object(5, b"<< /Type /Page /Parent 2 0 R /Contents 8 0 R >>");
    b.object(6, b"<< /Type /Pages /Parent 2 0 R /Kids [3 0 R 4 0 R] /Count 2 >>");
    b.stream_object(8, "", b"BT ET");
    // Outlines: two top-level entries, the first with one child.
    b.object(10, b"<< /Type /Outlines /First 11 0 R /Last 12 0 R /Count 3 >>");
    b.object(
        11,
        b"<< /Title (Chapter One) /Dest [3 0 R /Fit] /Next 12 0 R /First 13 0 R /Last 13 0 R >>",
    );
    b.object(12, b"<< /Title (Chapter Two) /Dest [4 0 R /Fit] >>");
    b.object(
        13,
        b"<< /Title (Section 1.1) /Dest [4 0 R /XYZ 0 700 null] >>",
    );
    // Name tree: root with one kid leaf.
    b.object(14, b"<< /Kids [15 0 R] >>");
    b.object(
        15,
        b"<< /Limits [(aaa) (zzz)] /Names [(intro) [3 0 R /Fit] (second) [4 0 R /Fit]] >>",
    );
    b.object(16, b"<< /Title (Structured fixture) /Producer (pdf_sift tests) >>");
    b.finish("/Root 1 0 R /Info 16 0 R")
}

#[test]
fn pages_iterate_in_catalog_order() {
    let doc = Document::new(structured_pdf()).unwrap();
    let pages: Vec<_> = doc.pages().collect();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[0].id, 3);
    assert_eq!(pages[1].id, 4);
    assert_eq!(pages[2].id, 5);
}

#[test]
fn page_attributes_inherit_and_override() {
    let doc = Document::new(structured_pdf()).unwrap();
    let pages: Vec<_> = doc.pages().collect();
    // Page 3 inherits the root MediaBox; page 4 overrides it.
    assert_eq!(pages[0].mediabox, (0.0, 0.0, 612.0, 792.0));
    assert_eq!(pages[1].mediabox, (0.0, 0.0, 300.0, 300.0));
    assert_eq!(pages[0].rotate, 0);
    assert_eq!(pages[1].rotate, 90);
    // CropBox defaults to the mediabox.
    assert_eq!(pages[1].cropbox, pages[1].mediabox);
    assert_eq!(pages[0].contents.len(), 1);
}

#[test]
fn outlines_walk_depth_first() {
    let doc = Document::new(structured_pdf()).unwrap();
    let items: Vec<_> = doc.outlines().unwrap().collect();
    let titles: Vec<(usize, String)> =
        items.iter().map(|i| (i.level, i.title.clone())).collect();
    assert_eq!(titles, vec![
        (1, "Chapter One".to_string()),
        (2, "Section 1.1".to_string()),
        (1, "Chapter Two".to_string()),
    ]);
    assert!(items[0].dest.is_some());
}

#[test]
fn named_destination_lookup_through_name_tree() {
    let doc = Document::new(structured_pdf()).unwrap();
    let dest = doc.get_dest(b"intro").unwrap();
    let arr = dest.as_array().unwrap();
    assert_eq!(arr[0].as_reference().map(|r| r.id), Some(3));
    assert!(doc.get_dest(b"nonexistent").is_err());
}

#[test]
fn legacy_dests_dictionary_lookup() {
    let mut b = PdfBuilder::new();
    b.object(
        1,
        b"<< /Type /Catalog /Pages 2 0 R /Dests << /intro [3 0 R /Fit] >> >>",
    );
    b.object(
        2,
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
    );
    b.object(3, b"<< /Type /Page /Parent 2 0 R >>");
    let doc = Document::new(b.finish("/Root 1 0 R")).unwrap();
    let dest = doc.get_dest(b"intro").unwrap();
    assert!(dest.as_array().is_some());
}

#[test]
fn xref_entries_enumerate_objects() {
    let doc = Document::new(structured_pdf()).unwrap();
    let entries: Vec<(u32, XrefEntry)> = doc.xref_entries().collect();
    assert!(entries.iter().any(|(id, e)| {
        *id == 1 && matches!(e, XrefEntry::InUse { .. })
    }));
    assert!(entries.iter().any(|(id, e)| *id == 0 && matches!(e, XrefEntry::Free)));
}

#[test]
fn document_without_outlines_reports_it() {
    let mut b = PdfBuilder::new();
    b.object(1, b"<< /Type /Catalog /Pages 2 0 R >>");
    b.object(
        2,
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
    );
    b.object(3, b"<< /Type /Page /Parent 2 0 R >>");
    let doc = Document::new(b.finish("/Root 1 0 R")).unwrap();
    assert!(doc.outlines().is_err());
}

#[test]
fn info_dictionary_collected() {
    let doc = Document::new(structured_pdf()).unwrap();
    assert_eq!(doc.info().len(), 1);
    assert_eq!(
        doc.info()[0].get("Title").and_then(|o| o.as_string()),
        Some(&b"Structured fixture"[..])
    );
}

#[test]
fn resolution_is_stable_across_calls() {
    let doc = Document::new(structured_pdf()).unwrap();
    let first = doc.get_object(6);
    for _ in 0..3 {
        assert_eq!(doc.get_object(6), first);
    }
}
