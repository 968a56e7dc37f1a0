use crate::ast::*;
use crate::error::{LmlError, LmlResult};

/// Elements nested deeper than this are rejected.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Tags whose body may be written inline as a bare string: ``b`bold` ``.
const INLINE_TAGS: &[&str] = &["b", "i", "c", "button", "input", "link"];

// ─── Public parse functions ──────────────────────────────────────────────────

/// Parse LML source into a `Document` node.
///
/// The whole input must be well formed; on failure no partial tree is returned.
pub fn parse(source: &str) -> LmlResult<Node> {
    let mut parser = Parser::new(source);
    let sources = parser.parse_elements()?;
    Ok(Node::Document(Document {
        document: Some(Box::new(Node::ElementList(ElementList { sources }))),
    }))
}

// ─── Parser ──────────────────────────────────────────────────────────────────

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    next_id: NodeId,
    depth: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            next_id: 0,
            depth: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> LmlError {
        LmlError::parse(self.line, self.column, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, expected: char, context: &str) -> LmlResult<()> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!(
                "expected '{}' {} but found '{}'",
                expected, context, c
            ))),
            None => Err(self.error(format!(
                "expected '{}' {} but reached end of input",
                expected, context
            ))),
        }
    }

    fn alloc_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ─── Elements ────────────────────────────────────────────────────────────

    /// Top level: elements (and stray string leaves) until end of input.
    fn parse_elements(&mut self) -> LmlResult<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Ok(nodes),
                Some('}') => return Err(self.error("unexpected '}' at top level")),
                Some(_) => nodes.push(self.parse_item()?),
            }
        }
    }

    /// One block item: an element or a literal.
    fn parse_item(&mut self) -> LmlResult<Node> {
        match self.peek() {
            Some('`') | Some('"') => Ok(Node::string(self.parse_string()?)),
            Some(c) if c.is_ascii_digit() || c == '-' => Ok(Node::number(self.parse_number()?)),
            Some(c) if is_ident_start(c) => self.parse_element(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_element(&mut self) -> LmlResult<Node> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(LmlError::MaxNestingDepthExceeded {
                max_depth: MAX_NESTING_DEPTH,
            });
        }

        let tag = self.parse_identifier()?;
        let id = self.alloc_id();

        self.skip_whitespace();
        let attributes = if self.peek() == Some('[') {
            Some(self.parse_attribute_list()?)
        } else {
            None
        };

        self.skip_whitespace();
        let body = match self.peek() {
            Some('{') => {
                self.depth += 1;
                let block = self.parse_block(&tag);
                self.depth -= 1;
                block?
            }
            Some('`') | Some('"') if INLINE_TAGS.contains(&tag.as_str()) => {
                Node::string(self.parse_string()?)
            }
            Some(c) => {
                return Err(self.error(format!(
                    "expected '{{' after '{}' but found '{}'",
                    tag, c
                )))
            }
            None => {
                return Err(self.error(format!(
                    "expected '{{' after '{}' but reached end of input",
                    tag
                )))
            }
        };

        let element = Element {
            id,
            attributes,
            body: Some(Box::new(body)),
        };

        Ok(match tag.as_str() {
            "h1" => Node::H1(element),
            "h2" => Node::H2(element),
            "h3" => Node::H3(element),
            "h4" => Node::H4(element),
            "h5" => Node::H5(element),
            "h6" => Node::H6(element),
            "p" => Node::Paragraph(element),
            "ol" => Node::Ol(element),
            "ul" => Node::Ul(element),
            "li" => Node::Li(element),
            "b" => Node::B(element),
            "i" => Node::I(element),
            "c" => Node::C(element),
            "button" => Node::Button(element),
            "input" => Node::Input(element),
            "link" => Node::Link(element),
            "img" => Node::Image(element),
            "code" => Node::Code(element),
            "pre" => Node::Pre(element),
            "nospace" => Node::NoSpace(element),
            _ => Node::Sinkhole(Sinkhole {
                id: element.id,
                name: tag,
                attributes: element.attributes,
                body: element.body,
            }),
        })
    }

    fn parse_block(&mut self, tag: &str) -> LmlResult<Node> {
        self.expect('{', &format!("to open '{}'", tag))?;
        let mut body = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('}') => {
                    self.bump();
                    return Ok(Node::Block(Block { body }));
                }
                None => {
                    return Err(self.error(format!(
                        "expected '}}' to close '{}' but reached end of input",
                        tag
                    )))
                }
                Some(_) => body.push(self.parse_item()?),
            }
        }
    }

    // ─── Attributes ──────────────────────────────────────────────────────────

    fn parse_attribute_list(&mut self) -> LmlResult<AttributeList> {
        self.expect('[', "to open attributes")?;
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(']') => {
                    self.bump();
                    return Ok(AttributeList { attributes });
                }
                Some(',') if !attributes.is_empty() => {
                    self.bump();
                }
                Some(c) if is_ident_start(c) => {
                    let key = self.parse_identifier()?;
                    self.expect('=', &format!("after attribute '{}'", key))?;
                    self.skip_whitespace();
                    let value = self.parse_attribute_value()?;
                    attributes.push(Attribute::new(key, value));
                }
                Some(c) => {
                    return Err(self.error(format!("unexpected '{}' in attribute list", c)))
                }
                None => {
                    return Err(self.error("expected ']' to close attributes but reached end of input"))
                }
            }
        }
    }

    fn parse_attribute_value(&mut self) -> LmlResult<Node> {
        match self.peek() {
            Some('`') | Some('"') => Ok(Node::string(self.parse_string()?)),
            Some(c) if c.is_ascii_digit() || c == '-' => Ok(Node::number(self.parse_number()?)),
            Some(c) if is_ident_start(c) => {
                let name = self.parse_identifier()?;
                match name.as_str() {
                    "true" => return Ok(Node::boolean(true)),
                    "false" => return Ok(Node::boolean(false)),
                    _ => {}
                }
                if self.peek() == Some('(') {
                    let args = self.parse_call_suffix()?;
                    Ok(Node::identifier(format!("{}{}", name, args)))
                } else {
                    Ok(Node::identifier(name))
                }
            }
            Some(c) => Err(self.error(format!("unexpected '{}' in attribute value", c))),
            None => Err(self.error("expected attribute value but reached end of input")),
        }
    }

    /// Balanced `( ... )` kept verbatim; strings inside may contain parentheses.
    fn parse_call_suffix(&mut self) -> LmlResult<String> {
        let mut out = String::new();
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated '(' in attribute value"));
            };
            out.push(c);
            match quote {
                Some(q) => {
                    if c == '\\' {
                        if let Some(next) = self.bump() {
                            out.push(next);
                        }
                    } else if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '"' | '`' | '\'' => quote = Some(c),
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(out);
                        }
                    }
                    _ => {}
                },
            }
        }
    }

    // ─── Literals ────────────────────────────────────────────────────────────

    fn parse_identifier(&mut self) -> LmlResult<String> {
        let mut name = String::new();
        match self.peek() {
            Some(c) if is_ident_start(c) => {
                name.push(c);
                self.bump();
            }
            _ => return Err(self.error("expected identifier")),
        }
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Ok(name)
    }

    fn parse_number(&mut self) -> LmlResult<f64> {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push('-');
            self.bump();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        text.parse::<f64>()
            .map_err(|_| LmlError::parse(line, column, format!("invalid number '{}'", text)))
    }

    /// Backtick or double-quoted string with JSON-style escapes. Raw newlines are kept.
    fn parse_string(&mut self) -> LmlResult<String> {
        let (line, column) = (self.line, self.column);
        let Some(quote) = self.bump() else {
            return Err(self.error("expected string"));
        };
        let mut value = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(LmlError::parse(line, column, "unterminated string literal"));
                }
                Some(c) if c == quote => return Ok(value),
                Some('\\') => {
                    let Some(esc) = self.bump() else {
                        return Err(LmlError::parse(line, column, "unterminated string literal"));
                    };
                    match esc {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        'b' => value.push('\u{8}'),
                        'f' => value.push('\u{c}'),
                        'u' => value.push(self.parse_unicode_escape()?),
                        '"' | '\\' | '/' | '`' => value.push(esc),
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn parse_unicode_escape(&mut self) -> LmlResult<char> {
        let mut hex = String::new();
        for _ in 0..4 {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                _ => return Err(self.error("invalid \\u escape")),
            }
        }
        let code = u32::from_str_radix(&hex, 16).map_err(|_| self.error("invalid \\u escape"))?;

        // Surrogate pair: 😀
        if (0xD800..0xDC00).contains(&code) && self.peek() == Some('\\') && self.peek_at(1) == Some('u') {
            self.bump();
            self.bump();
            let mut low = String::new();
            for _ in 0..4 {
                match self.bump() {
                    Some(c) if c.is_ascii_hexdigit() => low.push(c),
                    _ => return Err(self.error("invalid \\u escape")),
                }
            }
            let low = u32::from_str_radix(&low, 16).map_err(|_| self.error("invalid \\u escape"))?;
            let combined = 0x10000 + ((code - 0xD800) << 10) + (low.wrapping_sub(0xDC00) & 0x3FF);
            return char::from_u32(combined).ok_or_else(|| self.error("invalid surrogate pair"));
        }

        Ok(char::from_u32(code).unwrap_or('\u{FFFD}'))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn first(doc: &Node) -> &Node {
        match doc {
            Node::Document(d) => match d.document.as_deref() {
                Some(Node::ElementList(l)) => &l.sources[0],
                other => panic!("Expected element list, got {:?}", other),
            },
            other => panic!("Expected document, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_paragraph() {
        let doc = parse("p { `hello` }").unwrap();
        let expected = Node::Paragraph(Element {
            id: 0,
            attributes: None,
            body: Some(Box::new(Node::block(vec![Node::string("hello")]))),
        });
        assert_eq!(first(&doc), &expected);
    }

    #[test]
    fn test_parse_code_attributes() {
        let doc = parse(r#"code[lang="lugha", run="true"] { `print(1)` }"#).unwrap();
        let Node::Code(code) = first(&doc) else {
            panic!("Expected code element");
        };
        let attrs = code.attribute_map();
        assert_eq!(attrs["lang"].as_text(), "lugha");
        assert!(attrs["run"].is_true());
        assert_eq!(first(&doc).text(), "print(1)");
    }

    #[test]
    fn test_parse_inline_bodies() {
        let doc = parse("p { b`bold` i`it` link[href=`/x`] `go` }").unwrap();
        let Node::Paragraph(p) = first(&doc) else {
            panic!("Expected paragraph");
        };
        let Some(Node::Block(block)) = p.body.as_deref() else {
            panic!("Expected block body");
        };
        assert!(matches!(&block.body[0], Node::B(e) if matches!(e.body.as_deref(), Some(Node::String(_)))));
        assert!(matches!(&block.body[1], Node::I(_)));
        assert!(matches!(&block.body[2], Node::Link(_)));
        assert_eq!(block.body.len(), 3);
    }

    #[test]
    fn test_parse_call_attribute_value() {
        let doc = parse("button[onclick=doit()] `Go`").unwrap();
        let Node::Button(b) = first(&doc) else {
            panic!("Expected button");
        };
        assert_eq!(
            b.attributes.as_ref().unwrap().get("onclick"),
            Some(&Node::identifier("doit()"))
        );
    }

    #[test]
    fn test_unknown_tag_is_sinkhole() {
        let doc = parse("reason { p { `thinking` } }").unwrap();
        assert!(matches!(first(&doc), Node::Sinkhole(s) if s.name == "reason"));
    }

    #[test]
    fn test_ids_are_preorder() {
        let doc = parse("p { b`x` } code { `y` }").unwrap();
        let mut ids = Vec::new();
        doc.walk(&mut |n| {
            if let Some(e) = n.element() {
                ids.push(e.id);
            }
        });
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_string_escapes() {
        let doc = parse(r#"code { `a\nb \"q\" \` \\ é` }"#).unwrap();
        assert_eq!(first(&doc).text(), "a\nb \"q\" ` \\ é");
    }

    #[test]
    fn test_unterminated_block_is_parse_error() {
        let err = parse("p { ").unwrap_err();
        match err {
            LmlError::Parse { line, message, .. } => {
                assert_eq!(line, 1);
                assert!(message.contains("'}'"), "message: {}", message);
            }
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_string_reports_start() {
        let err = parse("p {\n  `oops }").unwrap_err();
        assert_eq!(
            err,
            LmlError::Parse {
                line: 2,
                column: 3,
                message: "unterminated string literal".to_string()
            }
        );
    }

    #[test]
    fn test_block_tag_rejects_inline_body() {
        assert!(parse("p `x`").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = "p { ".repeat(MAX_NESTING_DEPTH + 1) + &"}".repeat(MAX_NESTING_DEPTH + 1);
        assert!(matches!(
            parse(&deep),
            Err(LmlError::MaxNestingDepthExceeded { .. })
        ));
    }

    #[test]
    fn test_empty_source_is_empty_document() {
        let doc = parse("  ").unwrap();
        assert_eq!(doc, Node::document(vec![]));
    }
}
