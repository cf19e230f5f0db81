//! Splits story text into pages: one page per blank-line-separated paragraph.

use serde::Serialize;

/// Paragraph break convention used by stored story content.
const PARAGRAPH_BREAK: &str = "\n\n";

/// One derived page. Never persisted; rebuilt from `content` + `page_images`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    pub text: String,
    pub image_url: Option<String>,
}

/// Splits `text` on blank lines, trims each segment and drops empty ones.
///
/// Pure: the same content always yields the same boundaries, which is what
/// keeps `page_images[i]` aligned with paragraph `i` across reloads.
pub fn paginate(text: &str) -> Vec<String> {
    // Normalise CRLF so a Windows-authored blank line still splits.
    let normalised = text.replace("\r\n", "\n");
    normalised
        .split(PARAGRAPH_BREAK)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pairs each paragraph with the image stored at the same position, if any.
pub fn build_pages(content: &str, page_images: &[Option<String>]) -> Vec<Page> {
    paginate(content)
        .into_iter()
        .enumerate()
        .map(|(i, text)| Page {
            number: i + 1,
            text,
            image_url: page_images.get(i).cloned().flatten(),
        })
        .collect()
}
