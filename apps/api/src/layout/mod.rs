// Fixed-size page layout for exported storybooks.
// Positions are computed top-down like a flowing document, then converted to
// PDF user space (origin bottom-left) for the renderer.

pub mod font_metrics;

pub use font_metrics::{FontMetricTable, HELVETICA};

/// Canonical export page: 800 x 1131 units, 40 padding, 600 x 600 image box.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub padding: f32,
    pub image_max: f32,
    /// Gap below the image box.
    pub image_margin: f32,
    /// Gap above the body text and above the footer.
    pub block_margin: f32,
    pub body_size: f32,
    pub line_height: f32,
    pub footer_size: f32,
}

pub const EXPORT_PAGE: PageGeometry = PageGeometry {
    width: 800.0,
    height: 1131.0,
    padding: 40.0,
    image_max: 600.0,
    image_margin: 40.0,
    block_margin: 20.0,
    body_size: 18.0,
    line_height: 1.6,
    footer_size: 14.0,
};

impl PageGeometry {
    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.padding
    }
}

/// Rectangle in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placed {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One line of text; `y` is the baseline in PDF user space.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct PageLayout {
    pub image: Option<Placed>,
    pub body: Vec<PlacedLine>,
    pub body_size: f32,
    pub footer: PlacedLine,
    pub footer_size: f32,
    /// Body lines that did not fit on the page and were dropped.
    pub clipped_lines: usize,
}

/// Scales `(w, h)` to fit inside a `max` x `max` box without upscaling.
pub fn fit_image(w: u32, h: u32, max: f32) -> (f32, f32) {
    if w == 0 || h == 0 {
        return (0.0, 0.0);
    }
    let (w, h) = (w as f32, h as f32);
    let scale = (max / w).min(max / h).min(1.0);
    (w * scale, h * scale)
}

/// Lays out one page: optional image centred at the top, wrapped body text,
/// then a centred footer. The footer always fits; body lines that would run
/// into its band are dropped.
pub fn layout_page(
    geometry: &PageGeometry,
    font: &FontMetricTable,
    text: &str,
    image_size: Option<(u32, u32)>,
    footer: &str,
) -> PageLayout {
    let content_width = geometry.content_width();
    let bottom = geometry.height - geometry.padding;
    let footer_leading = geometry.footer_size * geometry.line_height;
    let body_bottom = bottom - geometry.block_margin - footer_leading;
    // Distance from the top edge.
    let mut cursor = geometry.padding;

    let image = image_size
        .map(|(w, h)| fit_image(w, h, geometry.image_max.min(content_width)))
        .filter(|(w, h)| *w > 0.0 && *h > 0.0)
        .map(|(w, h)| {
            let placed = Placed {
                x: (geometry.width - w) / 2.0,
                y: geometry.height - cursor - h,
                width: w,
                height: h,
            };
            cursor += h + geometry.image_margin;
            placed
        });

    cursor += geometry.block_margin;
    let leading = geometry.body_size * geometry.line_height;
    let wrapped = font.wrap(text, content_width, geometry.body_size);
    let mut body = Vec::with_capacity(wrapped.len());
    let mut clipped_lines = 0;
    for line in wrapped {
        if cursor + leading > body_bottom {
            clipped_lines += 1;
            continue;
        }
        // Baseline sits where CSS would put it for a line box of `leading`.
        let baseline = cursor + (leading + geometry.body_size) / 2.0 - geometry.body_size * 0.2;
        body.push(PlacedLine {
            x: geometry.padding,
            y: geometry.height - baseline,
            text: line,
        });
        cursor += leading;
    }

    // An image taller than the page can push the cursor past the band.
    cursor = cursor.min(body_bottom) + geometry.block_margin;
    let w = font.measure_str(footer, geometry.footer_size);
    let baseline = cursor + footer_leading - geometry.footer_size * 0.4;
    let footer = PlacedLine {
        x: (geometry.width - w) / 2.0,
        y: geometry.height - baseline,
        text: footer.to_string(),
    };

    PageLayout {
        image,
        body,
        body_size: geometry.body_size,
        footer,
        footer_size: geometry.footer_size,
        clipped_lines,
    }
}
