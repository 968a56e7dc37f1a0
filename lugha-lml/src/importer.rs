//! Edited HTML → LML text.
//!
//! The rendered chat surface tags every element with a `data-lml` marker
//! naming the construct it came from. When a user edits that surface in
//! place, this module walks the captured markup and rebuilds LML source from
//! the markers. Recovery is heuristic: anything the markers do not describe
//! (buttons, inputs, images, attributes other than code attributes) is
//! flattened to text, so the result reparses but is not byte-equal to the
//! source that produced the HTML.

use regex::Regex;
use roxmltree::Node as DomNode;
use std::sync::OnceLock;

use crate::error::{LmlError, LmlResult};
use crate::serializer::{quote_code, quote_string};

/// Synthetic root tag wrapping the captured fragment (it may have several top-level siblings).
const WRAPPER: &str = "__lml_root__";

fn wrap(html: &str) -> String {
    format!("<{0}>{1}</{0}>", WRAPPER, html)
}

/// Browser HTML is not XML: close void tags and replace entities XML lacks.
fn normalize(html: &str) -> String {
    static VOID_TAGS: OnceLock<Regex> = OnceLock::new();
    let re = VOID_TAGS.get_or_init(|| {
        Regex::new(r"(?i)<(br|hr|img|input|wbr)(\s[^>]*?)?\s*/?>").unwrap()
    });
    let closed = re.replace_all(html, "<$1$2/>");
    closed.replace("&nbsp;", "&#160;")
}

#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Keep runs of whitespace in text nodes instead of collapsing them.
    pub preserve_whitespace: bool,
    /// Emit `link` elements for anchors; when false only the anchor text survives.
    pub include_links: bool,
    /// Language given to code blocks whose container lost its `data-attr`.
    pub code_language: String,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            preserve_whitespace: false,
            include_links: true,
            code_language: "lugha".to_string(),
        }
    }
}

/// Convert an edited HTML fragment with the default options.
pub fn import_html(html: &str) -> LmlResult<String> {
    Importer::new(ConversionOptions::default()).convert(html)
}

pub struct Importer {
    options: ConversionOptions,
}

impl Importer {
    pub fn new(options: ConversionOptions) -> Self {
        Self { options }
    }

    pub fn convert(&self, html: &str) -> LmlResult<String> {
        let wrapped = wrap(&normalize(html));
        let doc = roxmltree::Document::parse(&wrapped)?;
        let out = self.children(doc.root_element())?;
        Ok(out.trim().to_string())
    }

    fn children(&self, node: DomNode) -> LmlResult<String> {
        let mut parts = Vec::new();
        for child in node.children() {
            let part = self.node(child)?;
            if !part.is_empty() {
                parts.push(part);
            }
        }
        Ok(parts.join("\n"))
    }

    fn children_except_divs(&self, node: DomNode) -> LmlResult<String> {
        let mut parts = Vec::new();
        for child in node.children() {
            if child.is_element() && child.tag_name().name().eq_ignore_ascii_case("div") {
                continue;
            }
            let part = self.node(child)?;
            if !part.is_empty() {
                parts.push(part);
            }
        }
        Ok(parts.join("\n"))
    }

    fn node(&self, node: DomNode) -> LmlResult<String> {
        if node.is_text() {
            return Ok(self.text(node.text().unwrap_or_default()));
        }
        if !node.is_element() {
            return Ok(String::new());
        }

        let tag = node.tag_name().name().to_ascii_lowercase();
        let marker = node.attribute("data-lml").unwrap_or_default();

        match tag.as_str() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let content = self.children(node)?;
                if matches!(marker, "h1" | "h2" | "h3" | "h4" | "h5" | "h6") {
                    Ok(format!("{} {{ {} }}\n", marker, content))
                } else {
                    Ok(content)
                }
            }
            "p" => {
                let content = self.children(node)?;
                if marker == "p" {
                    Ok(format!("p {{ {} }}\n", content))
                } else {
                    Ok(format!("{}\n\n", content))
                }
            }
            "strong" | "b" => self.marked(node, marker, "b"),
            "em" | "i" => self.marked(node, marker, "i"),
            "code" => self.marked(node, marker, "c"),
            "pre" => {
                if marker == "code_block" {
                    Ok(quote_code(&code_text(node)?))
                } else {
                    self.children(node)
                }
            }
            "ul" | "ol" => {
                let content = self.children(node)?;
                if marker == tag {
                    Ok(format!("{} {{\n{}\n}}", tag, content))
                } else {
                    Ok(content)
                }
            }
            "li" => self.marked(node, marker, "li"),
            "a" => self.anchor(node, marker),
            "br" => Ok("\n".to_string()),
            "div" | "span" => self.container(node, marker),
            _ => self.children(node),
        }
    }

    fn text(&self, raw: &str) -> String {
        static WHITESPACE: OnceLock<Regex> = OnceLock::new();
        let text = if self.options.preserve_whitespace {
            raw.to_string()
        } else {
            let re = WHITESPACE.get_or_init(|| Regex::new(r"\s+").unwrap());
            re.replace_all(raw, " ").into_owned()
        };

        if text.is_empty() || text == " " {
            String::new()
        } else {
            quote_string(&text)
        }
    }

    /// `tag { content }` when the marker matches, bare content otherwise.
    fn marked(&self, node: DomNode, marker: &str, tag: &str) -> LmlResult<String> {
        let content = self.children(node)?;
        if marker == tag {
            Ok(format!("{} {{ {} }}", tag, content))
        } else {
            Ok(content)
        }
    }

    fn anchor(&self, node: DomNode, marker: &str) -> LmlResult<String> {
        let content = self.children(node)?;
        if !self.options.include_links {
            return Ok(content);
        }

        let href = node.attribute("href").unwrap_or_default();
        let mut attrs = format!("href={}", quote_string(href));
        if marker != "link" {
            if let Some(title) = node.attribute("title") {
                attrs.push_str(&format!(", title={}", quote_string(title)));
            }
        }
        Ok(format!("link[{}] {{ {} }}", attrs, content))
    }

    fn container(&self, node: DomNode, marker: &str) -> LmlResult<String> {
        match marker {
            "reason" | "answer" => {
                let content = self.children(node)?;
                Ok(format!("{} {{\n{}\n}}\n", marker, content))
            }
            "code" => {
                // Nested divs are editor chrome (language label, controls).
                let content = self.children_except_divs(node)?;
                let attrs = match node.attribute("data-attr") {
                    Some(attr) if !attr.trim().is_empty() => attr.to_string(),
                    _ => format!("lang={}", quote_string(&self.options.code_language)),
                };
                Ok(format!("code[{}] {{\n{}\n}}", attrs, content))
            }
            _ => self.children(node),
        }
    }
}

/// Raw text of a highlighted code block: `<pre><code>` holding text and `<span>` runs.
fn code_text(pre: DomNode) -> LmlResult<String> {
    let mut out = String::new();
    for code in pre.children() {
        if !code.is_element() || !code.tag_name().name().eq_ignore_ascii_case("code") {
            continue;
        }
        for child in code.children() {
            collect_span_text(child, &mut out)?;
        }
    }
    Ok(out)
}

fn collect_span_text(node: DomNode, out: &mut String) -> LmlResult<()> {
    if node.is_text() {
        out.push_str(node.text().unwrap_or_default());
        return Ok(());
    }
    if node.is_element() {
        let name = node.tag_name().name();
        if !name.eq_ignore_ascii_case("span") {
            return Err(LmlError::UnsupportedNode(name.to_string()));
        }
        for child in node.children() {
            collect_span_text(child, out)?;
        }
    }
    Ok(())
}
