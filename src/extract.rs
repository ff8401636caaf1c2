//! PDF text extraction for uploaded study material.
//!
//! Uploads arrive base64-encoded in JSON. Only `.pdf` files up to the
//! configured size are accepted. Parsing is CPU-bound, so the async entry
//! point runs it on the blocking pool.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use lopdf::Document;
use tracing::{debug, instrument, warn};

use crate::error::ExtractionError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedText {
  pub text: String,
  pub page_count: usize,
}

/// Reject anything that is not a `.pdf` or exceeds `max_mb`.
pub fn check_upload(file_name: &str, size_bytes: usize, max_mb: usize) -> Result<(), ExtractionError> {
  if !file_name.to_ascii_lowercase().ends_with(".pdf") {
    return Err(ExtractionError::NotPdf);
  }
  if size_bytes > max_mb.saturating_mul(1024 * 1024) {
    return Err(ExtractionError::TooLarge { max_mb });
  }
  Ok(())
}

/// Decode a base64 payload. A `data:...;base64,` prefix is tolerated.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, ExtractionError> {
  let payload = match data.split_once(";base64,") {
    Some((_, rest)) => rest,
    None => data,
  };
  STANDARD
    .decode(payload.trim())
    .map_err(|e| ExtractionError::InvalidBase64(e.to_string()))
}

fn is_encrypted(doc: &Document) -> bool {
  doc.trailer.get(b"Encrypt").is_ok()
}

/// Pull the text of every page, in page order.
pub fn extract_pdf(bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
  if !bytes.starts_with(b"%PDF") {
    return Err(ExtractionError::Unparsable("missing %PDF header".into()));
  }
  let doc = Document::load_mem(bytes).map_err(|e| {
    let msg = e.to_string();
    if msg.to_ascii_lowercase().contains("encrypt") {
      ExtractionError::Encrypted
    } else {
      ExtractionError::Unparsable(msg)
    }
  })?;
  if is_encrypted(&doc) {
    return Err(ExtractionError::Encrypted);
  }

  let pages = doc.get_pages();
  let mut text = String::new();
  for page_num in pages.keys() {
    match doc.extract_text(&[*page_num]) {
      Ok(content) => {
        let content = content.trim();
        if !content.is_empty() {
          if !text.is_empty() {
            text.push('\n');
          }
          text.push_str(content);
        }
      }
      Err(e) => warn!(target: "study_assistant", page = page_num, error = %e, "Page text extraction failed; skipping page"),
    }
  }

  if text.trim().is_empty() {
    return Err(ExtractionError::NoText);
  }
  debug!(target: "study_assistant", pages = pages.len(), text_len = text.len(), "PDF text extracted");
  Ok(ExtractedText { text, page_count: pages.len() })
}

#[instrument(level = "info", skip(bytes), fields(size = bytes.len()))]
pub async fn extract_pdf_blocking(bytes: Vec<u8>) -> Result<ExtractedText, ExtractionError> {
  tokio::task::spawn_blocking(move || extract_pdf(&bytes))
    .await
    .map_err(|e| ExtractionError::Unparsable(format!("extraction task failed: {e}")))?
}

#[cfg(test)]
pub(crate) mod fixtures {
  use lopdf::content::{Content, Operation};
  use lopdf::{dictionary, Document, Object, Stream};

  /// One-page PDF whose page shows `line` (or nothing, if None).
  pub fn pdf_with_text(line: Option<&str>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
      "Type" => "Font",
      "Subtype" => "Type1",
      "BaseFont" => "Courier",
      "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
      "Font" => dictionary! { "F1" => font_id },
    });
    let mut operations = Vec::new();
    if let Some(line) = line {
      operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![72.into(), 720.into()]),
        Operation::new("Tj", vec![Object::string_literal(line)]),
        Operation::new("ET", vec![]),
      ];
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().expect("content encodes")));
    let page_id = doc.add_object(dictionary! {
      "Type" => "Page",
      "Parent" => pages_id,
      "Contents" => content_id,
      "Resources" => resources_id,
    });
    doc.objects.insert(
      pages_id,
      Object::Dictionary(dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
      }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("pdf saves");
    buf
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use lopdf::dictionary;

  #[test]
  fn upload_checks() {
    assert_eq!(check_upload("notes.PDF", 1024, 10), Ok(()));
    assert_eq!(check_upload("notes.docx", 1024, 10), Err(ExtractionError::NotPdf));
    assert_eq!(check_upload("big.pdf", 11 * 1024 * 1024, 10), Err(ExtractionError::TooLarge { max_mb: 10 }));
    assert_eq!(check_upload("huge-limit.pdf", usize::MAX, usize::MAX), Ok(()));
  }

  #[test]
  fn base64_with_and_without_data_url_prefix() {
    assert_eq!(decode_base64("aGVsbG8=").unwrap(), b"hello");
    assert_eq!(decode_base64("data:application/pdf;base64,aGVsbG8=").unwrap(), b"hello");
    assert!(matches!(decode_base64("***"), Err(ExtractionError::InvalidBase64(_))));
  }

  #[test]
  fn garbage_is_unparsable() {
    assert!(matches!(extract_pdf(b"definitely not a pdf"), Err(ExtractionError::Unparsable(_))));
    assert!(matches!(extract_pdf(b"%PDF-1.4\ntruncated"), Err(ExtractionError::Unparsable(_))));
  }

  #[test]
  fn text_is_extracted_with_page_count() {
    let bytes = fixtures::pdf_with_text(Some("Hello study notes"));
    let out = extract_pdf(&bytes).expect("text extracted");
    assert_eq!(out.page_count, 1);
    assert!(out.text.contains("Hello study notes"), "got {:?}", out.text);
  }

  #[test]
  fn image_only_pdf_has_no_text() {
    let bytes = fixtures::pdf_with_text(None);
    assert_eq!(extract_pdf(&bytes), Err(ExtractionError::NoText));
  }

  #[test]
  fn encrypt_entry_marks_document_encrypted() {
    let mut doc = Document::with_version("1.5");
    assert!(!is_encrypted(&doc));
    let encrypt_id = doc.add_object(dictionary! { "Filter" => "Standard", "V" => 1, "R" => 2 });
    doc.trailer.set("Encrypt", encrypt_id);
    assert!(is_encrypted(&doc));
  }

  #[tokio::test]
  async fn blocking_wrapper_returns_same_result() {
    let bytes = fixtures::pdf_with_text(Some("Async path"));
    let out = extract_pdf_blocking(bytes).await.expect("text extracted");
    assert!(out.text.contains("Async path"));
  }
}
