//! AST → [`View`].
//!
//! Display mode builds the read-only chat surface; with `save` set it also
//! queues runnable `lugha` blocks for execution. Editor mode builds the
//! editable surface: code blocks carry only their language label and nothing
//! is queued.

use lugha_lml::ast::*;
use lugha_lml::{attribute_source, visit, Extension, LmlResult, Visitor};

use crate::code_queue::{CodeEntry, CodeQueue};
use crate::state::RenderState;
use crate::view::{CodeActions, CodeBlockView, PanelKind, View};

/// Language whose `run` blocks are executable.
pub const RUNNABLE_LANG: &str = "lugha";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Display { save: bool },
    Editor,
}

/// Inherited render hints.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderArgs {
    /// Inside `nospace`: siblings are not separated by a space.
    pub nospace: bool,
}

/// Wraps a button's `onclick` value as a program with a single entry point.
pub fn wrap_entry_point(body: &str) -> String {
    format!("fun main(): unit {{\n {}\n}}", body)
}

pub struct Renderer<'a> {
    mode: RenderMode,
    state: &'a mut RenderState,
    queue: Option<&'a mut CodeQueue>,
    extensions: Vec<Box<dyn Extension<RenderArgs>>>,
}

impl<'a> Renderer<'a> {
    pub fn new(mode: RenderMode, state: &'a mut RenderState) -> Self {
        Self {
            mode,
            state,
            queue: None,
            extensions: Vec::new(),
        }
    }

    /// Queue receiving runnable blocks in save mode.
    pub fn with_queue(mut self, queue: &'a mut CodeQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn extension(mut self, hook: impl Extension<RenderArgs> + 'static) -> Self {
        self.extensions.push(Box::new(hook));
        self
    }

    /// One full pass: side-table entries for blocks not seen are dropped.
    pub fn render(mut self, ast: &Node) -> LmlResult<View> {
        self.state.begin_pass();
        let view = visit(&mut self, Some(ast), &RenderArgs::default())?;
        self.state.finish_pass();
        Ok(view)
    }

    fn saving(&self) -> bool {
        matches!(self.mode, RenderMode::Display { save: true })
    }

    fn body(&mut self, node: &Element, args: &RenderArgs) -> LmlResult<Vec<View>> {
        Ok(flatten(visit(self, node.body.as_deref(), args)?))
    }

    fn tagged(
        &mut self,
        tag: &'static str,
        marker: &'static str,
        node: &Element,
        args: &RenderArgs,
    ) -> LmlResult<View> {
        Ok(View::element(tag, marker, self.body(node, args)?))
    }
}

/// A fragment's children, or the view itself.
fn flatten(view: View) -> Vec<View> {
    match view {
        View::Fragment(children) => children,
        other => vec![other],
    }
}

fn attr_text(node: &Element, key: &str) -> Option<String> {
    node.attribute_map().get(key).map(AttrValue::as_text)
}

impl<'a> Visitor for Renderer<'a> {
    type Output = View;
    type Args = RenderArgs;

    fn extensions(&self) -> &[Box<dyn Extension<RenderArgs>>] {
        &self.extensions
    }

    fn visit_document(&mut self, node: &Document, args: &RenderArgs) -> LmlResult<View> {
        let children = flatten(visit(self, node.document.as_deref(), args)?);
        Ok(View::element("div", "document", children))
    }

    fn visit_element_list(&mut self, node: &ElementList, args: &RenderArgs) -> LmlResult<View> {
        let mut children = Vec::with_capacity(node.sources.len());
        for src in &node.sources {
            children.push(visit(self, Some(src), args)?);
        }
        Ok(View::Fragment(children))
    }

    /// Siblings in a multi-child block are separated by a single space.
    fn visit_block(&mut self, node: &Block, args: &RenderArgs) -> LmlResult<View> {
        let space = node.body.len() > 1 && !args.nospace;
        let mut children = Vec::with_capacity(node.body.len() * 2);
        for (index, src) in node.body.iter().enumerate() {
            if space && index > 0 {
                children.push(View::Text(" ".to_string()));
            }
            children.push(visit(self, Some(src), args)?);
        }
        Ok(View::Fragment(children))
    }

    fn visit_heading(&mut self, level: u8, node: &Element, args: &RenderArgs) -> LmlResult<View> {
        let tag = match level {
            1 => "h1",
            2 => "h2",
            3 => "h3",
            4 => "h4",
            5 => "h5",
            _ => "h6",
        };
        self.tagged(tag, tag, node, args)
    }

    fn visit_paragraph(&mut self, node: &Element, args: &RenderArgs) -> LmlResult<View> {
        self.tagged("p", "p", node, args)
    }

    fn visit_ol(&mut self, node: &Element, args: &RenderArgs) -> LmlResult<View> {
        self.tagged("ol", "ol", node, args)
    }

    fn visit_ul(&mut self, node: &Element, args: &RenderArgs) -> LmlResult<View> {
        self.tagged("ul", "ul", node, args)
    }

    fn visit_li(&mut self, node: &Element, args: &RenderArgs) -> LmlResult<View> {
        self.tagged("li", "li", node, args)
    }

    fn visit_b(&mut self, node: &Element, args: &RenderArgs) -> LmlResult<View> {
        self.tagged("strong", "b", node, args)
    }

    fn visit_i(&mut self, node: &Element, args: &RenderArgs) -> LmlResult<View> {
        self.tagged("em", "i", node, args)
    }

    fn visit_c(&mut self, node: &Element, args: &RenderArgs) -> LmlResult<View> {
        self.tagged("code", "c", node, args)
    }

    fn visit_button(&mut self, node: &Element, args: &RenderArgs) -> LmlResult<View> {
        Ok(View::Button {
            node: node.id,
            onclick: attr_text(node, "onclick"),
            label: self.body(node, args)?,
        })
    }

    fn visit_input(&mut self, node: &Element, _args: &RenderArgs) -> LmlResult<View> {
        Ok(View::Input {
            node: node.id,
            name: attr_text(node, "name"),
            value: node.body.as_deref().map(Node::text).unwrap_or_default(),
        })
    }

    fn visit_link(&mut self, node: &Element, args: &RenderArgs) -> LmlResult<View> {
        Ok(View::Link {
            href: attr_text(node, "href").unwrap_or_default(),
            children: self.body(node, args)?,
        })
    }

    fn visit_image(&mut self, node: &Element, _args: &RenderArgs) -> LmlResult<View> {
        Ok(View::Image {
            src: attr_text(node, "src").unwrap_or_default(),
            alt: attr_text(node, "alt").unwrap_or_default(),
        })
    }

    fn visit_code(&mut self, node: &Element, _args: &RenderArgs) -> LmlResult<View> {
        let attrs = node.attribute_map();
        let code = node.body.as_deref().map(Node::text).unwrap_or_default();
        let lang = attrs.get("lang").map(AttrValue::as_text).unwrap_or_default();
        let run = attrs.get("run").map(AttrValue::is_true).unwrap_or(false);
        let attr = match node.attributes.as_ref() {
            Some(list) => attribute_source(list)?,
            None => String::new(),
        };

        if lang == RUNNABLE_LANG && run && self.saving() {
            if let Some(queue) = self.queue.as_deref_mut() {
                queue.push(CodeEntry {
                    code: code.clone(),
                    node: Some(node.id),
                });
            }
        }

        let key = self.state.next_key(&lang, &code);

        let (collapsed, actions) = match self.mode {
            RenderMode::Editor => (false, CodeActions::default()),
            RenderMode::Display { .. } => {
                // Prose-like `text` blocks start open; everything else starts collapsed.
                let ui = self.state.observe(&key, lang != "text");
                let actions = CodeActions {
                    toggle: true,
                    run: lang == RUNNABLE_LANG,
                    copy: true,
                    edit: true,
                    running: ui.running,
                    copying: ui.copying,
                };
                (ui.collapsed, actions)
            }
        };

        Ok(View::Code(Box::new(CodeBlockView {
            key,
            node: node.id,
            lang,
            code,
            attr,
            collapsed,
            actions,
        })))
    }

    fn visit_pre(&mut self, node: &Element, args: &RenderArgs) -> LmlResult<View> {
        self.tagged("pre", "pre", node, args)
    }

    fn visit_nospace(&mut self, node: &Element, _args: &RenderArgs) -> LmlResult<View> {
        self.tagged("span", "nospace", node, &RenderArgs { nospace: true })
    }

    fn visit_sinkhole(&mut self, node: &Sinkhole, args: &RenderArgs) -> LmlResult<View> {
        let kind = match node.name.as_str() {
            "reason" => PanelKind::Reason,
            "answer" => PanelKind::Answer,
            _ => return Ok(View::default()),
        };
        let children = flatten(visit(self, node.body.as_deref(), args)?);
        Ok(View::Panel { kind, children })
    }

    fn visit_string(&mut self, node: &StringLit, _args: &RenderArgs) -> LmlResult<View> {
        Ok(View::Text(node.value.clone()))
    }

    fn visit_number(&mut self, node: &NumberLit, _args: &RenderArgs) -> LmlResult<View> {
        Ok(View::Text(format_number(node.value)))
    }

    fn visit_boolean(&mut self, node: &BooleanLit, _args: &RenderArgs) -> LmlResult<View> {
        Ok(View::Text(node.value.to_string()))
    }
}
