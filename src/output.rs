//! Output types: the per-page results returned to the caller.

use serde::{Deserialize, Serialize};

/// The result of converting a single page. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 0-based page index within the source document.
    pub page_index: usize,
    /// Markdown content of the page. Empty when the analysis pass found no
    /// text on the page.
    pub markdown: String,
    /// Images extracted from the page, already referenced at the end of
    /// `markdown`. Empty unless an image mode was configured and the
    /// analysis pass detected images.
    pub images: Vec<ExtractedImage>,
}

impl PageResult {
    /// An empty result for a page with no detected text.
    pub(crate) fn empty(page_index: usize) -> Self {
        Self {
            page_index,
            markdown: String::new(),
            images: Vec::new(),
        }
    }

    /// 1-based page number, as used at the outward boundary.
    pub fn page_number(&self) -> usize {
        self.page_index + 1
    }
}

/// An image pulled out of a rendered page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedImage {
    /// 0-based index of the page the image came from.
    pub page_index: usize,
    /// Stable display name, unique within the page.
    pub name: String,
    /// How the image is referenced from the markdown.
    pub reference: ImageRef,
}

/// Reference target for an extracted image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRef {
    /// A deterministic per-page, per-image locator.
    Url { locator: String },
    /// The PNG bytes inlined as a `data:` URI.
    Inline { data_uri: String },
}

impl ImageRef {
    /// The string placed in the markdown reference target.
    pub fn target(&self) -> &str {
        match self {
            ImageRef::Url { locator } => locator,
            ImageRef::Inline { data_uri } => data_uri,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_number_is_one_based() {
        assert_eq!(PageResult::empty(0).page_number(), 1);
        assert_eq!(PageResult::empty(9).page_number(), 10);
    }

    #[test]
    fn page_result_serialises() {
        let result = PageResult {
            page_index: 2,
            markdown: "# Title\n".into(),
            images: vec![ExtractedImage {
                page_index: 2,
                name: "page_3_image_1.png".into(),
                reference: ImageRef::Url {
                    locator: "page_3_image_1.png".into(),
                },
            }],
        };
        let json = serde_json::to_string(&result).expect("serialise");
        let back: PageResult = serde_json::from_str(&json).expect("round-trip");
        assert_eq!(back.page_index, 2);
        assert_eq!(back.images.len(), 1);
    }
}
