use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::email::blocks::{
    Block, BlockContent, ButtonContent, HeaderContent, ImageContent, LayoutDocument, SpacerContent,
    TextContent,
};
use crate::email::tokens::substitute;
use crate::email::variables::VariableMap;

/// Compiled output of one render invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedEmail {
    pub html: String,
    pub text: String,
}

/// Compile a layout plus a resolved variable snapshot into HTML and plain
/// text. Pure function: no I/O, no hidden state, byte-identical output for
/// identical inputs. Unknown block kinds (legacy revisions) are skipped with a
/// warning rather than failing the whole render.
pub fn render(layout: &LayoutDocument, variables: &VariableMap) -> RenderedEmail {
    let mut body = String::new();

    for block in layout.blocks() {
        match &block.content {
            BlockContent::Header(content) => html_header(&mut body, content, variables),
            BlockContent::Text(content) => html_text(&mut body, content, variables),
            BlockContent::Button(content) => html_button(&mut body, content, variables),
            BlockContent::Image(content) => html_image(&mut body, content, variables),
            BlockContent::Divider => body.push_str("<hr class=\"divider\">\n"),
            BlockContent::Spacer(content) => html_spacer(&mut body, content),
            BlockContent::Unknown { kind, .. } => {
                warn!(%kind, block_id = block.id, "skipping unrecognized block during render");
            }
        }
    }

    RenderedEmail {
        html: wrap_document(&body),
        text: render_text(layout, variables),
    }
}

fn wrap_document(body: &str) -> String {
    let mut html = String::with_capacity(body.len() + 256);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("</head>\n<body style=\"margin:0;padding:0;background-color:#f4f4f4;\">\n");
    html.push_str("<div class=\"email-body\" style=\"max-width:600px;margin:0 auto;background-color:#ffffff;padding:24px;\">\n");
    html.push_str(body);
    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn resolve(raw: &str, variables: &VariableMap) -> String {
    escape_html(&substitute(raw, variables))
}

fn html_header(body: &mut String, content: &HeaderContent, variables: &VariableMap) {
    writeln!(body, "<h1>{}</h1>", resolve(&content.heading, variables)).expect("header fragment");
    if let Some(subheading) = &content.subheading {
        writeln!(body, "<h2>{}</h2>", resolve(subheading, variables)).expect("subheading fragment");
    }
}

fn html_text(body: &mut String, content: &TextContent, variables: &VariableMap) {
    for paragraph in content.text.split('\n').filter(|line| !line.trim().is_empty()) {
        writeln!(body, "<p>{}</p>", resolve(paragraph.trim(), variables)).expect("text fragment");
    }
}

fn html_button(body: &mut String, content: &ButtonContent, variables: &VariableMap) {
    let button = &content.button;
    writeln!(
        body,
        "<p><a href=\"{}\" style=\"display:inline-block;padding:12px 24px;background-color:{};color:{};text-decoration:none;border-radius:4px;\">{}</a></p>",
        resolve(&button.url, variables),
        resolve(&button.background_color, variables),
        resolve(&button.text_color, variables),
        resolve(&button.text, variables),
    )
    .expect("button fragment");
}

fn html_image(body: &mut String, content: &ImageContent, variables: &VariableMap) {
    match content.width {
        Some(width) => writeln!(
            body,
            "<img src=\"{}\" alt=\"{}\" width=\"{}\" style=\"max-width:100%;\">",
            resolve(&content.url, variables),
            resolve(&content.alt, variables),
            width,
        )
        .expect("image fragment"),
        None => writeln!(
            body,
            "<img src=\"{}\" alt=\"{}\" style=\"max-width:100%;\">",
            resolve(&content.url, variables),
            resolve(&content.alt, variables),
        )
        .expect("image fragment"),
    }
}

fn html_spacer(body: &mut String, content: &SpacerContent) {
    writeln!(body, "<div style=\"height:{}px;\"></div>", content.height).expect("spacer fragment");
}

/// Independent plain-text pass: each block's primary textual field in document
/// order, non-textual blocks omitted, blocks separated by blank lines.
fn render_text(layout: &LayoutDocument, variables: &VariableMap) -> String {
    let mut lines: Vec<String> = Vec::new();

    for block in layout.blocks() {
        if let Some(line) = text_fragment(block, variables) {
            lines.push(line);
        }
    }

    lines.join("\n\n")
}

fn text_fragment(block: &Block, variables: &VariableMap) -> Option<String> {
    match &block.content {
        BlockContent::Header(content) => {
            let mut fragment = substitute(&content.heading, variables);
            if let Some(subheading) = &content.subheading {
                fragment.push('\n');
                fragment.push_str(&substitute(subheading, variables));
            }
            Some(fragment)
        }
        BlockContent::Text(content) => Some(substitute(&content.text, variables)),
        BlockContent::Button(content) => Some(format!(
            "{}: {}",
            substitute(&content.button.text, variables),
            substitute(&content.button.url, variables),
        )),
        BlockContent::Image(content) => {
            let alt = substitute(&content.alt, variables);
            if alt.trim().is_empty() {
                None
            } else {
                Some(alt)
            }
        }
        BlockContent::Divider | BlockContent::Spacer(_) | BlockContent::Unknown { .. } => None,
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::blocks::BlockKind;

    #[test]
    fn escapes_markup_in_variable_values() {
        let layout = LayoutDocument::new(vec![Block::new(
            1,
            BlockContent::Text(TextContent {
                text: "Visit {{COMPANY_NAME}}".to_string(),
            }),
        )]);
        let variables = VariableMap::from_pairs([("COMPANY_NAME", "<b>Acme</b>")]);

        let output = render(&layout, &variables);
        assert!(output.html.contains("&lt;b&gt;Acme&lt;/b&gt;"));
        assert!(!output.html.contains("<b>Acme</b>"));
    }

    #[test]
    fn divider_and_spacer_are_absent_from_text_output() {
        let layout = LayoutDocument::new(vec![
            Block::new(1, BlockKind::Divider.default_content()),
            Block::new(2, BlockKind::Spacer.default_content()),
            Block::new(
                3,
                BlockContent::Text(TextContent {
                    text: "Only line".to_string(),
                }),
            ),
        ]);

        let output = render(&layout, &VariableMap::default());
        assert_eq!(output.text, "Only line");
    }
}
