use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of an element within one parsed tree. Assigned in pre-order by the parser.
pub type NodeId = u32;

/// Any LML node. The topology is fixed once parsed; only attribute lists are
/// mutated afterwards (filename stamping after code execution).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    Document(Document),
    ElementList(ElementList),
    Block(Block),
    H1(Element),
    H2(Element),
    H3(Element),
    H4(Element),
    H5(Element),
    H6(Element),
    Paragraph(Element),
    Ol(Element),
    Ul(Element),
    Li(Element),
    B(Element),
    I(Element),
    C(Element),
    Button(Element),
    Input(Element),
    Link(Element),
    Image(Element),
    Code(Element),
    Pre(Element),
    NoSpace(Element),
    Sinkhole(Sinkhole),
    String(StringLit),
    Number(NumberLit),
    Boolean(BooleanLit),
    Identifier(Identifier),
    AttributeList(AttributeList),
    Attribute(Attribute),
}

/// Root of a parsed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub document: Option<Box<Node>>,
}

/// Top-level sequence of elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementList {
    pub sources: Vec<Node>,
}

/// Contents of a `{ ... }` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub body: Vec<Node>,
}

/// Shared payload of every tagged element (headings, lists, inline marks, code, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Box<Node>>,
}

/// Generic named container. Its meaning depends on `name` ("reason", "answer", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sinkhole {
    pub id: NodeId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringLit {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberLit {
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanLit {
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeList {
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: Identifier,
    pub value: Box<Node>,
}

/// Flattened attribute value, as seen by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Identifier(String),
}

impl AttrValue {
    /// Value rendered as text: `true`, `1`, `lugha`, ...
    pub fn as_text(&self) -> String {
        self.to_string()
    }

    /// Boolean-like flag check: a `true` literal or the string "true".
    pub fn is_true(&self) -> bool {
        match self {
            AttrValue::Boolean(b) => *b,
            AttrValue::String(s) | AttrValue::Identifier(s) => s == "true",
            AttrValue::Number(_) => false,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::String(s) | AttrValue::Identifier(s) => f.write_str(s),
            AttrValue::Number(n) => f.write_str(&format_number(*n)),
            AttrValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Formats numbers the way LML writes them: integral values without a fraction.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl AttributeList {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    /// Last value bound to `key`; later attributes shadow earlier ones.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.attributes
            .iter()
            .rev()
            .find(|a| a.key.name == key)
            .map(|a| a.value.as_ref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.attributes.iter().any(|a| a.key.name == key)
    }

    /// Appends `key=value`.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) {
        self.attributes.push(Attribute::new(key, value));
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Folds the list into a flat key → value map. Nodes that are not scalar
    /// literals are skipped.
    pub fn to_map(&self) -> BTreeMap<String, AttrValue> {
        let mut map = BTreeMap::new();
        for attr in &self.attributes {
            let value = match attr.value.as_ref() {
                Node::String(s) => AttrValue::String(s.value.clone()),
                Node::Number(n) => AttrValue::Number(n.value),
                Node::Boolean(b) => AttrValue::Boolean(b.value),
                Node::Identifier(i) => AttrValue::Identifier(i.name.clone()),
                _ => continue,
            };
            map.insert(attr.key.name.clone(), value);
        }
        map
    }
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: Node) -> Self {
        Self {
            key: Identifier { name: key.into() },
            value: Box::new(value),
        }
    }
}

impl Element {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            attributes: None,
            body: None,
        }
    }

    pub fn with_attributes(mut self, attributes: AttributeList) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_body(mut self, body: Node) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    /// Attributes folded to a map; empty when the element has none.
    pub fn attribute_map(&self) -> BTreeMap<String, AttrValue> {
        self.attributes
            .as_ref()
            .map(AttributeList::to_map)
            .unwrap_or_default()
    }
}

impl Node {
    pub fn string(value: impl Into<String>) -> Node {
        Node::String(StringLit {
            value: value.into(),
        })
    }

    pub fn number(value: f64) -> Node {
        Node::Number(NumberLit { value })
    }

    pub fn boolean(value: bool) -> Node {
        Node::Boolean(BooleanLit { value })
    }

    pub fn identifier(name: impl Into<String>) -> Node {
        Node::Identifier(Identifier { name: name.into() })
    }

    pub fn block(body: Vec<Node>) -> Node {
        Node::Block(Block { body })
    }

    pub fn document(sources: Vec<Node>) -> Node {
        Node::Document(Document {
            document: Some(Box::new(Node::ElementList(ElementList { sources }))),
        })
    }

    /// LML tag (for elements) or node kind name (for everything else).
    pub fn tag_name(&self) -> &str {
        match self {
            Node::Document(_) => "Document",
            Node::ElementList(_) => "ElementList",
            Node::Block(_) => "Block",
            Node::H1(_) => "h1",
            Node::H2(_) => "h2",
            Node::H3(_) => "h3",
            Node::H4(_) => "h4",
            Node::H5(_) => "h5",
            Node::H6(_) => "h6",
            Node::Paragraph(_) => "p",
            Node::Ol(_) => "ol",
            Node::Ul(_) => "ul",
            Node::Li(_) => "li",
            Node::B(_) => "b",
            Node::I(_) => "i",
            Node::C(_) => "c",
            Node::Button(_) => "button",
            Node::Input(_) => "input",
            Node::Link(_) => "link",
            Node::Image(_) => "img",
            Node::Code(_) => "code",
            Node::Pre(_) => "pre",
            Node::NoSpace(_) => "nospace",
            Node::Sinkhole(s) => s.name.as_str(),
            Node::String(_) => "String",
            Node::Number(_) => "Number",
            Node::Boolean(_) => "Boolean",
            Node::Identifier(_) => "Identifier",
            Node::AttributeList(_) => "AttributeList",
            Node::Attribute(_) => "Attribute",
        }
    }

    /// The element payload, for every tagged element variant.
    pub fn element(&self) -> Option<&Element> {
        match self {
            Node::H1(e)
            | Node::H2(e)
            | Node::H3(e)
            | Node::H4(e)
            | Node::H5(e)
            | Node::H6(e)
            | Node::Paragraph(e)
            | Node::Ol(e)
            | Node::Ul(e)
            | Node::Li(e)
            | Node::B(e)
            | Node::I(e)
            | Node::C(e)
            | Node::Button(e)
            | Node::Input(e)
            | Node::Link(e)
            | Node::Image(e)
            | Node::Code(e)
            | Node::Pre(e)
            | Node::NoSpace(e) => Some(e),
            _ => None,
        }
    }

    pub fn element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::H1(e)
            | Node::H2(e)
            | Node::H3(e)
            | Node::H4(e)
            | Node::H5(e)
            | Node::H6(e)
            | Node::Paragraph(e)
            | Node::Ol(e)
            | Node::Ul(e)
            | Node::Li(e)
            | Node::B(e)
            | Node::I(e)
            | Node::C(e)
            | Node::Button(e)
            | Node::Input(e)
            | Node::Link(e)
            | Node::Image(e)
            | Node::Code(e)
            | Node::Pre(e)
            | Node::NoSpace(e) => Some(e),
            _ => None,
        }
    }

    /// Direct children in document order (attribute lists excluded).
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Document(d) => d.document.as_deref().into_iter().collect(),
            Node::ElementList(l) => l.sources.iter().collect(),
            Node::Block(b) => b.body.iter().collect(),
            Node::Sinkhole(s) => s.body.as_deref().into_iter().collect(),
            Node::Attribute(a) => vec![a.value.as_ref()],
            other => other
                .element()
                .and_then(|e| e.body.as_deref())
                .into_iter()
                .collect(),
        }
    }

    fn children_mut(&mut self) -> Vec<&mut Node> {
        match self {
            Node::Document(d) => d.document.as_deref_mut().into_iter().collect(),
            Node::ElementList(l) => l.sources.iter_mut().collect(),
            Node::Block(b) => b.body.iter_mut().collect(),
            Node::Sinkhole(s) => s.body.as_deref_mut().into_iter().collect(),
            Node::Attribute(a) => vec![a.value.as_mut()],
            other => other
                .element_mut()
                .and_then(|e| e.body.as_deref_mut())
                .into_iter()
                .collect(),
        }
    }

    /// Pre-order walk over this node and all of its descendants.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Finds the element carrying `id`.
    pub fn find_element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        if self.element().map(|e| e.id) == Some(id) {
            return self.element_mut();
        }
        for child in self.children_mut() {
            if let Some(found) = child.find_element_mut(id) {
                return Some(found);
            }
        }
        None
    }

    /// The tagged node whose element carries `id`.
    pub fn find_node(&self, id: NodeId) -> Option<&Node> {
        let mut found = None;
        self.walk(&mut |n| {
            if found.is_none() && n.element().map(|e| e.id) == Some(id) {
                found = Some(n);
            }
        });
        found
    }

    pub fn find_element(&self, id: NodeId) -> Option<&Element> {
        let mut found = None;
        self.walk(&mut |n| {
            if found.is_none() {
                if let Some(e) = n.element().filter(|e| e.id == id) {
                    found = Some(e);
                }
            }
        });
        found
    }

    /// Concatenation of every string leaf below this node.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.walk(&mut |n| {
            if let Node::String(s) = n {
                out.push_str(&s.value);
            }
        });
        out
    }

    /// Number of `code` elements in the tree.
    pub fn code_block_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |n| {
            if matches!(n, Node::Code(_)) {
                count += 1;
            }
        });
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_node(id: NodeId, code: &str) -> Node {
        let mut attrs = AttributeList::default();
        attrs.insert("lang", Node::string("lugha"));
        attrs.insert("run", Node::string("true"));
        Node::Code(
            Element::new(id)
                .with_attributes(attrs)
                .with_body(Node::block(vec![Node::string(code)])),
        )
    }

    #[test]
    fn test_attribute_fold_later_key_wins() {
        let mut attrs = AttributeList::default();
        attrs.insert("lang", Node::string("text"));
        attrs.insert("lang", Node::string("lugha"));
        attrs.insert("width", Node::number(3.0));
        let map = attrs.to_map();
        assert_eq!(map.get("lang"), Some(&AttrValue::String("lugha".into())));
        assert_eq!(map.get("width").map(|v| v.as_text()), Some("3".to_string()));
        assert_eq!(attrs.get("lang"), Some(&Node::string("lugha")));
    }

    #[test]
    fn test_run_flag_accepts_string_and_boolean() {
        assert!(AttrValue::String("true".into()).is_true());
        assert!(AttrValue::Boolean(true).is_true());
        assert!(!AttrValue::String("yes".into()).is_true());
    }

    #[test]
    fn test_find_element_mut_reaches_nested_code() {
        let mut doc = Node::document(vec![Node::Paragraph(
            Element::new(1).with_body(Node::block(vec![code_node(2, "print(1)")])),
        )]);

        let el = doc.find_element_mut(2).expect("code element");
        el.attributes
            .as_mut()
            .unwrap()
            .insert("filename", Node::string("a.lg"));

        let found = doc.find_element(2).unwrap();
        assert!(found.attributes.as_ref().unwrap().contains_key("filename"));
        assert!(doc.find_element_mut(99).is_none());
    }

    #[test]
    fn test_find_node_reports_tag() {
        let doc = Node::document(vec![code_node(4, "x")]);
        assert_eq!(doc.find_node(4).map(Node::tag_name), Some("code"));
        assert!(doc.find_node(5).is_none());
    }

    #[test]
    fn test_text_and_code_count() {
        let doc = Node::document(vec![
            Node::Paragraph(Element::new(1).with_body(Node::block(vec![
                Node::string("hello "),
                Node::string("world"),
            ]))),
            code_node(2, "x"),
        ]);
        assert_eq!(doc.code_block_count(), 1);
        assert_eq!(doc.text(), "hello worldx");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-4.0), "-4");
        assert_eq!(format_number(2.5), "2.5");
    }
}
