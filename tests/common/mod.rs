//! Shared fixture builders for the integration tests.
//!
//! Every test works on PDFs assembled in memory so the suite carries no
//! binary sample files.
#![allow(dead_code)]

/// Incrementally builds a PDF file, tracking object offsets.
pub struct PdfBuilder {
    body: Vec<u8>,
    offsets: Vec<(usize, usize)>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            body: b"%PDF-1.4\n".to_vec(),
            offsets: Vec::new(),
        }
    }

    /// Append `id 0 obj <body> endobj`, remembering its offset.
    pub fn object(&mut self, id: usize, body: &[u8]) -> &mut Self {
        self.offsets.push((id, self.body.len()));
        self.body
            .extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
        self.body.extend_from_slice(body);
        self.body.extend_from_slice(b"\nendobj\n");
        self
    }

    /// Append a stream object with a correct `/Length` entry.
    pub fn stream_object(&mut self, id: usize, dict_extra: &str, data: &[u8]) -> &mut Self {
        let mut body = format!("<< /Length {} {} >>\nstream\n", data.len(), dict_extra).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.object(id, &body)
    }

    pub fn current_offset(&self) -> usize {
        self.body.len()
    }

    pub fn raw(&mut self, data: &[u8]) -> &mut Self {
        self.body.extend_from_slice(data);
        self
    }

    /// Emit a classic xref table plus trailer and footer.
    pub fn finish(mut self, trailer_extra: &str) -> Vec<u8> {
        let max_id = self.offsets.iter().map(|(id, _)| *id).max().unwrap_or(0);
        let xref_pos = self.body.len();
        self.body
            .extend_from_slice(format!("xref\n0 {}\n", max_id + 1).as_bytes());
        self.body
            .extend_from_slice(b"0000000000 65535 f \n");
        for id in 1..=max_id {
            match self.offsets.iter().find(|(oid, _)| *oid == id) {
                Some((_, offset)) => {
                    self.body
                        .extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
                },
                None => self.body.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        self.body.extend_from_slice(
            format!("trailer\n<< /Size {} {} >>\n", max_id + 1, trailer_extra).as_bytes(),
        );
        self.body
            .extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_pos).as_bytes());
        self.body
    }

    /// The body without any xref (for fallback-recovery fixtures).
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

/// A Type1 font dictionary that declares all of its own metrics: every
/// code 32..=126 is 500 units wide, with the descriptor supplying the
/// vertical metrics and `MissingWidth`.
pub fn simple_font_dict() -> String {
    let widths = vec!["500"; 95].join(" ");
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /TestSans \
         /FirstChar 32 /LastChar 126 /Widths [{}] \
         /FontDescriptor << /Type /FontDescriptor /FontName /TestSans \
         /Flags 32 /Ascent 700 /Descent -200 /CapHeight 700 /StemV 80 \
         /ItalicAngle 0 /FontBBox [0 -200 1000 900] /MissingWidth 500 >> >>",
        widths
    )
}

/// A complete one-page document showing `content` with the test font
/// as /F1.
pub fn one_page_pdf(content: &[u8]) -> Vec<u8> {
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
    b.stream_object(4, "", content);
    b.object(5, simple_font_dict().as_bytes());
    b.finish("/Root 1 0 R")
}
