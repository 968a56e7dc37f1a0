//! Visual tree produced by the renderer, and its HTML form.
//!
//! Every element carries a `data-lml` marker naming the construct it came
//! from, which is what lets an edited capture be imported back to LML.
//! Output is well-formed XML (void tags self-closed).

use std::sync::OnceLock;

use lugha_lml::NodeId;
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::state::CodeKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    /// Side panel with the assistant's reasoning.
    Reason,
    /// The primary answer body.
    Answer,
}

impl PanelKind {
    fn marker(self) -> &'static str {
        match self {
            PanelKind::Reason => "reason",
            PanelKind::Answer => "answer",
        }
    }
}

/// Controls shown in a code block's bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodeActions {
    pub toggle: bool,
    pub run: bool,
    pub copy: bool,
    pub edit: bool,
    pub running: bool,
    pub copying: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlockView {
    pub key: CodeKey,
    /// Owning AST node; the edit action hands it to the editor with the code.
    pub node: NodeId,
    pub lang: String,
    pub code: String,
    /// Attribute list in LML syntax, carried in `data-attr` for the importer.
    pub attr: String,
    pub collapsed: bool,
    pub actions: CodeActions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Text(String),
    Element {
        tag: &'static str,
        marker: &'static str,
        children: Vec<View>,
    },
    Link {
        href: String,
        children: Vec<View>,
    },
    Button {
        node: NodeId,
        onclick: Option<String>,
        label: Vec<View>,
    },
    Input {
        node: NodeId,
        name: Option<String>,
        value: String,
    },
    Image {
        src: String,
        alt: String,
    },
    Code(Box<CodeBlockView>),
    Panel {
        kind: PanelKind,
        children: Vec<View>,
    },
    Fragment(Vec<View>),
    /// Shown in place of a message whose source failed to parse.
    Fallback {
        error: String,
    },
}

impl Default for View {
    fn default() -> Self {
        View::Fragment(Vec::new())
    }
}

impl View {
    pub fn element(tag: &'static str, marker: &'static str, children: Vec<View>) -> View {
        View::Element {
            tag,
            marker,
            children,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, View::Fragment(children) if children.iter().all(View::is_empty))
    }

    fn children(&self) -> &[View] {
        match self {
            View::Element { children, .. }
            | View::Link { children, .. }
            | View::Panel { children, .. }
            | View::Fragment(children) => children,
            View::Button { label, .. } => label,
            _ => &[],
        }
    }

    /// Visible text, ignoring code blocks and controls.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            View::Text(t) => out.push_str(t),
            other => {
                for child in other.children() {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Every code block, in document order.
    pub fn code_blocks(&self) -> Vec<&CodeBlockView> {
        let mut out = Vec::new();
        self.walk(&mut |v| {
            if let View::Code(block) = v {
                out.push(block.as_ref());
            }
        });
        out
    }

    /// `(node, onclick)` for every button, in document order.
    pub fn buttons(&self) -> Vec<(NodeId, Option<&str>)> {
        let mut out = Vec::new();
        self.walk(&mut |v| {
            if let View::Button { node, onclick, .. } = v {
                out.push((*node, onclick.as_deref()));
            }
        });
        out
    }

    fn walk<'a>(&'a self, f: &mut impl FnMut(&'a View)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_children(&self, out: &mut String) {
        for child in self.children() {
            child.write_html(out);
        }
    }

    fn write_html(&self, out: &mut String) {
        match self {
            View::Text(t) => out.push_str(&escape_html(t)),
            View::Element { tag, marker, .. } => {
                out.push_str(&format!("<{} data-lml=\"{}\">", tag, marker));
                self.write_children(out);
                out.push_str(&format!("</{}>", tag));
            }
            View::Link { href, .. } => {
                out.push_str(&format!(
                    "<a data-lml=\"link\" href=\"{}\" target=\"_blank\">",
                    escape_html(href)
                ));
                self.write_children(out);
                out.push_str("</a>");
            }
            View::Button { node, onclick, .. } => {
                let onclick = onclick
                    .as_deref()
                    .map(|o| format!(" data-onclick=\"{}\"", escape_html(o)))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "<button data-lml=\"button\" data-node=\"{}\"{}>",
                    node, onclick
                ));
                self.write_children(out);
                out.push_str("</button>");
            }
            View::Input { node, name, value } => {
                let name = name
                    .as_deref()
                    .map(|n| format!(" name=\"{}\"", escape_html(n)))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "<input data-lml=\"input\" data-node=\"{}\"{} value=\"{}\"/>",
                    node,
                    name,
                    escape_html(value)
                ));
            }
            View::Image { src, alt } => {
                out.push_str(&format!(
                    "<img data-lml=\"img\" src=\"{}\" alt=\"{}\"/>",
                    escape_html(src),
                    escape_html(alt)
                ));
            }
            View::Code(block) => write_code_block(block, out),
            View::Panel { kind, .. } => {
                out.push_str(&format!(
                    "<div data-lml=\"{0}\" class=\"lml-{0}\">",
                    kind.marker()
                ));
                self.write_children(out);
                out.push_str("</div>");
            }
            View::Fragment(_) => self.write_children(out),
            View::Fallback { error } => {
                out.push_str("<div data-lml=\"error\" class=\"lml-error\">");
                out.push_str("<strong>Failed to render</strong>");
                out.push_str(&format!("<pre>{}</pre>", escape_html(error)));
                out.push_str("</div>");
            }
        }
    }
}

fn write_code_block(block: &CodeBlockView, out: &mut String) {
    let class = if block.collapsed {
        "lml-code collapsed"
    } else {
        "lml-code"
    };
    out.push_str(&format!(
        "<div data-lml=\"code\" data-attr=\"{}\" data-key=\"{}\" data-node=\"{}\" class=\"{}\">",
        escape_html(&block.attr),
        block.key,
        block.node,
        class
    ));

    // Bar: nested divs are dropped by the importer.
    out.push_str("<div class=\"lml-code-bar\">");
    out.push_str(&format!("<span>{}</span>", escape_html(&block.lang)));
    let a = &block.actions;
    if a.toggle {
        let label = if block.collapsed { "Show" } else { "Hide" };
        out.push_str(&format!("<button data-action=\"toggle\">{}</button>", label));
    }
    if a.run {
        let label = if a.running { "Running" } else { "Run" };
        out.push_str(&format!("<button data-action=\"run\">{}</button>", label));
    }
    if a.copy {
        let label = if a.copying { "Copied" } else { "Copy" };
        out.push_str(&format!("<button data-action=\"copy\">{}</button>", label));
    }
    if a.edit {
        out.push_str("<button data-action=\"edit\">Edit</button>");
    }
    out.push_str("</div>");

    let hidden = if block.collapsed { " hidden=\"hidden\"" } else { "" };
    out.push_str(&format!("<pre data-lml=\"code_block\"{}><code>", hidden));
    out.push_str(&highlight_code(&block.lang, &block.code));
    out.push_str("</code></pre></div>");
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ─── Highlighting ────────────────────────────────────────────────────────────

const CODE_THEME: &str = "base16-ocean.dark";

/// Every highlight class is emitted as `hl-<scope>`.
const CODE_CLASSES: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

static SYNTAXES: OnceLock<SyntaxSet> = OnceLock::new();
static CODE_CSS: OnceLock<String> = OnceLock::new();

/// Syntax used for a block's `lang`. Unknown languages and `text` are plain.
fn syntax_for<'s>(syntaxes: &'s SyntaxSet, lang: &str) -> &'s SyntaxReference {
    let token = match lang {
        "text" => return syntaxes.find_syntax_plain_text(),
        // Lugha reads close enough to Rust for keyword colouring.
        "lugha" => "rs",
        "javascript" => "js",
        "python" => "py",
        other => other,
    };
    syntaxes
        .find_syntax_by_token(token)
        .unwrap_or_else(|| syntaxes.find_syntax_plain_text())
}

/// Stylesheet for the `hl-` classes. Empty if the theme cannot be turned
/// into CSS.
pub fn highlight_css() -> &'static str {
    CODE_CSS.get_or_init(|| {
        let themes = ThemeSet::load_defaults();
        match themes.themes.get(CODE_THEME) {
            Some(theme) => css_for_theme_with_class_style(theme, CODE_CLASSES).unwrap_or_default(),
            None => String::new(),
        }
    })
}

/// `source` as classed `<span>` runs. Falls back to escaped plain text.
pub fn highlight_code(lang: &str, source: &str) -> String {
    let syntaxes = SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines);
    let mut spans =
        ClassedHTMLGenerator::new_with_class_style(syntax_for(syntaxes, lang), syntaxes, CODE_CLASSES);

    let highlighted = LinesWithEndings::from(source)
        .try_for_each(|line| spans.parse_html_for_line_which_includes_newline(line));
    match highlighted {
        Ok(()) => spans.finalize(),
        Err(_) => escape_html(source),
    }
}
