use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MM_PER_PT: f32 = 25.4 / 72.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub title: String,
    pub body: String,
    /// Final file name, used as the document title when `title` is blank.
    pub target_name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("nothing to render for {0}")]
    EmptyBody(String),
    #[error("renderer produced no bytes for {0}")]
    EmptyOutput(String),
}

/// Turns extracted text into artifact bytes.
pub trait Renderer: Send + Sync {
    /// File extension of produced artifacts, without the dot.
    fn extension(&self) -> &str;

    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError>;

    /// Format-level sanity check of bytes read back from disk.
    fn is_valid_artifact(&self, bytes: &[u8]) -> bool;
}

/// Page geometry, in the units the layout was authored in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfLayout {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub margin_mm: f32,
    pub text_width_mm: f32,
    pub title_size_pt: f32,
    pub body_size_pt: f32,
    pub line_height: f32,
    /// Average glyph advance as a fraction of the font size, for wrapping.
    pub avg_char_width_em: f32,
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 20.0,
            text_width_mm: 170.0,
            title_size_pt: 18.0,
            body_size_pt: 11.0,
            line_height: 1.4,
            avg_char_width_em: 0.5,
        }
    }
}

impl PdfLayout {
    fn chars_per_line(&self, size_pt: f32) -> usize {
        let glyph_mm = size_pt * self.avg_char_width_em * MM_PER_PT;
        ((self.text_width_mm / glyph_mm).floor() as usize).max(10)
    }

    fn line_advance_mm(&self, size_pt: f32) -> f32 {
        size_pt * self.line_height * MM_PER_PT
    }

    fn usable_height_mm(&self) -> f32 {
        self.page_height_mm - 2.0 * self.margin_mm
    }
}

/// A4 text-only PDFs set in the built-in Helvetica faces.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    layout: PdfLayout,
}

impl PdfRenderer {
    pub fn new(layout: PdfLayout) -> Self {
        Self { layout }
    }

    fn paginate(&self, title: &str, body: &str) -> Vec<Vec<Line>> {
        let layout = &self.layout;
        let title_lines = wrap(title, layout.chars_per_line(layout.title_size_pt));
        let body_lines = body
            .lines()
            .flat_map(|paragraph| wrap(paragraph, layout.chars_per_line(layout.body_size_pt)));

        let title_advance = layout.line_advance_mm(layout.title_size_pt);
        let body_advance = layout.line_advance_mm(layout.body_size_pt);
        let usable = layout.usable_height_mm();

        let mut pages = Vec::new();
        let mut page: Vec<Line> = title_lines
            .into_iter()
            .map(|text| Line { text, heading: true })
            .collect();
        let mut used = page.len() as f32 * title_advance + body_advance;

        for text in body_lines {
            if used + body_advance > usable && !page.is_empty() {
                pages.push(std::mem::take(&mut page));
                used = 0.0;
            }
            page.push(Line {
                text,
                heading: false,
            });
            used += body_advance;
        }
        if !page.is_empty() {
            pages.push(page);
        }
        pages
    }

    fn page_ops(&self, lines: &[Line]) -> Vec<Op> {
        let layout = &self.layout;
        let top = layout.page_height_mm - layout.margin_mm;
        let mut ops = vec![
            Op::StartTextSection,
            Op::SetTextCursor {
                pos: Point::new(Mm(layout.margin_mm), Mm(top)),
            },
        ];
        let mut heading = None;
        for line in lines {
            if heading != Some(line.heading) {
                let (font, size) = if line.heading {
                    (BuiltinFont::HelveticaBold, layout.title_size_pt)
                } else {
                    (BuiltinFont::Helvetica, layout.body_size_pt)
                };
                ops.push(Op::SetFontSizeBuiltinFont {
                    size: Pt(size),
                    font,
                });
                ops.push(Op::SetLineHeight {
                    lh: Pt(size * layout.line_height),
                });
                if heading == Some(true) {
                    ops.push(Op::AddLineBreak);
                }
                heading = Some(line.heading);
            }
            let font = if line.heading {
                BuiltinFont::HelveticaBold
            } else {
                BuiltinFont::Helvetica
            };
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(line.text.clone())],
                font,
            });
            ops.push(Op::AddLineBreak);
        }
        ops.push(Op::EndTextSection);
        ops
    }
}

struct Line {
    text: String,
    heading: bool,
}

impl Renderer for PdfRenderer {
    fn extension(&self) -> &str {
        "pdf"
    }

    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        let body = to_win_ansi(request.body.trim());
        if body.is_empty() {
            return Err(RenderError::EmptyBody(request.target_name.clone()));
        }
        let title = match to_win_ansi(request.title.trim()) {
            t if t.is_empty() => request.target_name.clone(),
            t => t,
        };

        let pages = self
            .paginate(&title, &body)
            .iter()
            .map(|lines| {
                PdfPage::new(
                    Mm(self.layout.page_width_mm),
                    Mm(self.layout.page_height_mm),
                    self.page_ops(lines),
                )
            })
            .collect::<Vec<_>>();

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = PdfDocument::new(&title)
            .with_pages(pages)
            .save(&PdfSaveOptions::default(), &mut warnings);
        if bytes.is_empty() {
            return Err(RenderError::EmptyOutput(request.target_name.clone()));
        }
        Ok(bytes)
    }

    fn is_valid_artifact(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(b"%PDF-")
    }
}

/// Greedy word wrap on char counts. Words longer than a line are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current_len == 0 {
            word.len()
        } else {
            current_len + 1 + word.len()
        };
        if needed > width && current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Built-in PDF fonts only cover a Latin-1-like repertoire.
fn to_win_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{a0}' | '\t' => out.push(' '),
            '\n' => out.push('\n'),
            c if c.is_control() => {}
            c if (c as u32) <= 0xFF => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}
