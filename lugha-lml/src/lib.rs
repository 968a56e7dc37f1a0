//! # Lugha Markup Language (LML)
//!
//! The markup the Lugha assistant answers in. A document is a list of
//! elements, each an LML tag with optional attributes and a body:
//!
//! ```text
//! h2 { `Result` }
//! p { `The answer is ` b`42` }
//! code[lang="lugha", run="true"] { `print(42)` }
//! ```
//!
//! ## Features
//! - Closed AST node set with serde support
//! - Visitor dispatch shared by every tree consumer
//! - Reference parser with line/column errors
//! - Reverse serializer producing canonical, reparseable LML
//! - Importer that rebuilds LML from edited, marker-annotated HTML
//!
//! ## Example
//! ```ignore
//! use lugha_lml::{parse, serialize};
//!
//! let doc = parse("p{`hello`}").expect("Failed to parse LML");
//! assert_eq!(serialize(&doc).unwrap(), "p { `hello` }");
//! ```

pub mod ast;
pub mod error;
pub mod importer;
pub mod parser;
pub mod serializer;
pub mod visitor;

// --- Core types ---
pub use ast::{
    AttrValue, Attribute, AttributeList, Block, Document, Element, ElementList, Node, NodeId,
    Sinkhole, StringLit,
};
pub use error::{LmlError, LmlResult};
pub use importer::{ConversionOptions, Importer};
pub use serializer::{attribute_source, quote_string, Serializer};
pub use visitor::{visit, Extension, Visitor};

/// Parse LML source into a `Document` node.
pub fn parse(source: &str) -> LmlResult<Node> {
    parser::parse(source)
}

/// Serialize a tree back to canonical LML.
pub fn serialize(node: &Node) -> LmlResult<String> {
    serializer::serialize(node)
}

/// Rebuild LML from an edited HTML capture of a rendered message.
pub fn import_html(html: &str) -> LmlResult<String> {
    importer::import_html(html)
}
