//! AST → canonical LML text.
//!
//! The output reparses to a tree with the same shape, which is what lets the
//! chat layer persist a tree after attributes were stamped onto it.

use crate::ast::*;
use crate::error::{LmlError, LmlResult};
use crate::visitor::{visit, Extension, Visitor};

/// Serialize a tree (usually a `Document`) to LML source.
pub fn serialize(node: &Node) -> LmlResult<String> {
    Serializer::new().run(node)
}

/// Backtick-quotes a text leaf. Only the characters the parser treats
/// specially inside a backtick string are escaped; newlines stay raw.
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('`');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            _ => out.push(c),
        }
    }
    out.push('`');
    out
}

/// Code bodies use JSON string escaping so they survive byte for byte.
pub(crate) fn quote_code(code: &str) -> String {
    let json = serde_json::Value::String(code.to_owned()).to_string();
    let inner = &json[1..json.len() - 1];
    format!("`{}`", inner.replace('`', "\\`"))
}

/// Attribute list in LML syntax without the brackets: ``lang=`lugha`, run=`true` ``.
pub fn attribute_source(list: &AttributeList) -> LmlResult<String> {
    let mut s = Serializer::new();
    let wrapped = s.visit_attribute_list(list, &())?;
    Ok(wrapped
        .trim_end()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string())
}

#[derive(Default)]
pub struct Serializer {
    extensions: Vec<Box<dyn Extension<()>>>,
}

impl Serializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extension(mut self, hook: impl Extension<()> + 'static) -> Self {
        self.extensions.push(Box::new(hook));
        self
    }

    pub fn run(&mut self, node: &Node) -> LmlResult<String> {
        visit(self, Some(node), &())
    }

    fn attributes(&mut self, attributes: Option<&AttributeList>) -> LmlResult<Option<String>> {
        match attributes {
            Some(list) => Ok(Some(self.visit_attribute_list(list, &())?)),
            None => Ok(None),
        }
    }

    /// `tag[attrs] { body }`, or `tag { body }` without attributes.
    fn wrapped(
        &mut self,
        tag: &str,
        attributes: Option<&AttributeList>,
        body: Option<&Node>,
    ) -> LmlResult<String> {
        let attrs = self.attributes(attributes)?.unwrap_or_else(|| " ".to_string());
        let body = visit(self, body, &())?;
        Ok(format!("{}{}{{ {} }}", tag, attrs, body))
    }

    /// Inline form when the body is a bare string: ``button[..] `Go` ``.
    fn inline_or_wrapped(&mut self, tag: &str, node: &Element) -> LmlResult<String> {
        match node.body.as_deref() {
            Some(Node::String(s)) => {
                let attrs = self.attributes(node.attributes.as_ref())?.unwrap_or_default();
                Ok(format!("{}{}{}", tag, attrs, quote_string(&s.value)))
            }
            body => self.wrapped(tag, node.attributes.as_ref(), body),
        }
    }

    fn joined(&mut self, nodes: &[Node]) -> LmlResult<String> {
        let mut parts = Vec::with_capacity(nodes.len());
        for node in nodes {
            let part = visit(self, Some(node), &())?;
            if !part.is_empty() {
                parts.push(part);
            }
        }
        Ok(parts.join("\n"))
    }
}

impl Visitor for Serializer {
    type Output = String;
    type Args = ();

    fn extensions(&self) -> &[Box<dyn Extension<()>>] {
        &self.extensions
    }

    fn visit_document(&mut self, node: &Document, args: &()) -> LmlResult<String> {
        visit(self, node.document.as_deref(), args)
    }

    fn visit_element_list(&mut self, node: &ElementList, _args: &()) -> LmlResult<String> {
        self.joined(&node.sources)
    }

    fn visit_block(&mut self, node: &Block, _args: &()) -> LmlResult<String> {
        self.joined(&node.body)
    }

    fn visit_heading(&mut self, level: u8, node: &Element, _args: &()) -> LmlResult<String> {
        self.wrapped(&format!("h{}", level), node.attributes.as_ref(), node.body.as_deref())
    }

    fn visit_paragraph(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        self.wrapped("p", node.attributes.as_ref(), node.body.as_deref())
    }

    fn visit_ol(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        self.wrapped("ol", node.attributes.as_ref(), node.body.as_deref())
    }

    fn visit_ul(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        self.wrapped("ul", node.attributes.as_ref(), node.body.as_deref())
    }

    fn visit_li(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        self.wrapped("li", node.attributes.as_ref(), node.body.as_deref())
    }

    fn visit_b(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        self.inline_or_wrapped("b", node)
    }

    fn visit_i(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        self.inline_or_wrapped("i", node)
    }

    fn visit_c(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        self.inline_or_wrapped("c", node)
    }

    fn visit_button(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        self.inline_or_wrapped("button", node)
    }

    fn visit_input(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        self.inline_or_wrapped("input", node)
    }

    fn visit_link(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        self.inline_or_wrapped("link", node)
    }

    fn visit_image(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        let attrs = self
            .attributes(node.attributes.as_ref())?
            .unwrap_or_else(|| " ".to_string());
        Ok(format!("img{}{{ \"\" }}", attrs))
    }

    fn visit_code(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        let code = match node.body.as_deref() {
            Some(Node::Block(block)) => match block.body.as_slice() {
                [Node::String(s)] => quote_code(&s.value),
                [other] => {
                    return Err(LmlError::SerializationShape {
                        found: other.tag_name().to_string(),
                    })
                }
                many => {
                    return Err(LmlError::SerializationShape {
                        found: format!("Block with {} children", many.len()),
                    })
                }
            },
            Some(other) => {
                return Err(LmlError::SerializationShape {
                    found: other.tag_name().to_string(),
                })
            }
            None => {
                return Err(LmlError::SerializationShape {
                    found: "nothing".to_string(),
                })
            }
        };

        let attrs = self
            .attributes(node.attributes.as_ref())?
            .unwrap_or_else(|| " ".to_string());
        Ok(format!("code{}{{ {} }}", attrs, code))
    }

    fn visit_pre(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        self.wrapped("pre", node.attributes.as_ref(), node.body.as_deref())
    }

    fn visit_nospace(&mut self, node: &Element, _args: &()) -> LmlResult<String> {
        self.wrapped("nospace", node.attributes.as_ref(), node.body.as_deref())
    }

    fn visit_sinkhole(&mut self, node: &Sinkhole, _args: &()) -> LmlResult<String> {
        self.wrapped(&node.name, node.attributes.as_ref(), node.body.as_deref())
    }

    /// A lone space is dropped; editing leaves those behind between inline nodes.
    fn visit_string(&mut self, node: &StringLit, _args: &()) -> LmlResult<String> {
        if node.value == " " {
            Ok(String::new())
        } else {
            Ok(quote_string(&node.value))
        }
    }

    fn visit_number(&mut self, node: &NumberLit, _args: &()) -> LmlResult<String> {
        Ok(format_number(node.value))
    }

    fn visit_boolean(&mut self, node: &BooleanLit, _args: &()) -> LmlResult<String> {
        Ok(node.value.to_string())
    }

    fn visit_identifier(&mut self, node: &Identifier, _args: &()) -> LmlResult<String> {
        Ok(node.name.clone())
    }

    fn visit_attribute_list(&mut self, node: &AttributeList, args: &()) -> LmlResult<String> {
        let mut parts = Vec::with_capacity(node.attributes.len());
        for attribute in &node.attributes {
            parts.push(self.visit_attribute(attribute, args)?);
        }
        Ok(format!("[{}] ", parts.join(", ")))
    }

    fn visit_attribute(&mut self, node: &Attribute, args: &()) -> LmlResult<String> {
        let value = match node.value.as_ref() {
            Node::String(s) => quote_string(&s.value),
            other => visit(self, Some(other), args)?,
        };
        Ok(format!("{}={}", node.key.name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn roundtrip(src: &str) -> String {
        serialize(&parse(src).unwrap()).unwrap()
    }

    #[test]
    fn test_paragraph_canonical_form() {
        assert_eq!(roundtrip("p{`hello`}"), "p { `hello` }");
    }

    #[test]
    fn test_single_space_leaf_is_elided() {
        let doc = Node::document(vec![Node::Paragraph(Element::new(0).with_body(
            Node::block(vec![
                Node::string("a"),
                Node::string(" "),
                Node::string("b"),
            ]),
        ))]);
        assert_eq!(serialize(&doc).unwrap(), "p { `a`\n`b` }");
    }

    #[test]
    fn test_attributes_joined_with_comma() {
        assert_eq!(
            roundtrip(r#"code[lang="lugha", run=true, width=2] { `x` }"#),
            "code[lang=`lugha`, run=true, width=2] { `x` }"
        );
    }

    #[test]
    fn test_code_uses_json_escaping() {
        let src = "code[lang=`lugha`] { `print(\"hi\")\nnext` }";
        assert_eq!(
            roundtrip(src),
            r#"code[lang=`lugha`] { `print(\"hi\")\nnext` }"#
        );
        let again = parse(&roundtrip(src)).unwrap();
        assert_eq!(again.text(), "print(\"hi\")\nnext");
    }

    #[test]
    fn test_code_shape_is_enforced() {
        let doc = Node::document(vec![Node::Code(
            Element::new(0).with_body(Node::block(vec![Node::Paragraph(Element::new(1))])),
        )]);
        assert_eq!(
            serialize(&doc).unwrap_err(),
            LmlError::SerializationShape {
                found: "p".to_string()
            }
        );

        let empty = Node::document(vec![Node::Code(Element::new(0))]);
        assert!(matches!(
            serialize(&empty),
            Err(LmlError::SerializationShape { .. })
        ));
    }

    #[test]
    fn test_inline_bodies_have_no_braces() {
        assert_eq!(roundtrip("button[onclick=doit()] `Go`"), "button[onclick=doit()] `Go`");
        assert_eq!(roundtrip("link `home`"), "link`home`");
        assert_eq!(roundtrip("input { `x` }"), "input { `x` }");
    }

    #[test]
    fn test_text_escapes_survive() {
        let doc = Node::document(vec![Node::Paragraph(
            Element::new(0).with_body(Node::block(vec![Node::string("a\\b `c`")])),
        )]);
        let text = serialize(&doc).unwrap();
        assert_eq!(parse(&text).unwrap().text(), "a\\b `c`");
    }

    #[test]
    fn test_serialize_is_idempotent() {
        let src = r#"
            h2 { `Title` }
            p { `Some ` b`bold` ` and ` c`code` }
            ul { li { `one` } li { i`two` } }
            reason { p { `why` } }
            answer { code[lang="lugha", run="true", filename="a.lg"] { `print(1)` } }
            img[src="/a.png"] { "" }
        "#;
        let once = roundtrip(src);
        let twice = roundtrip(&once);
        assert_eq!(once, twice);
        assert_eq!(parse(&once).unwrap(), parse(src).unwrap());
    }

    #[test]
    fn test_attribute_source_has_no_brackets() {
        let mut attrs = AttributeList::default();
        attrs.insert("lang", Node::string("lugha"));
        attrs.insert("run", Node::boolean(true));
        assert_eq!(attribute_source(&attrs).unwrap(), "lang=`lugha`, run=true");
    }

    #[test]
    fn test_extension_sees_nodes() {
        use std::cell::Cell;
        use std::rc::Rc;

        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let mut s = Serializer::new().extension(move |_: &Node, _: &()| c.set(c.get() + 1));
        s.run(&parse("p { `x` }").unwrap()).unwrap();
        // Document, ElementList, p, Block, String
        assert_eq!(count.get(), 5);
    }
}
