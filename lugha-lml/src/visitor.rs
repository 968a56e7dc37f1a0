//! Double dispatch over the closed [`Node`] set.
//!
//! Every concrete visitor (renderer, serializer, ...) implements [`Visitor`]
//! with its own output type; [`visit`] routes a node to the handler for its
//! variant after running the registered [`Extension`] hooks.

use crate::ast::*;
use crate::error::LmlResult;

/// Read-only instrumentation run before each node is dispatched.
pub trait Extension<A> {
    fn before_accept(&self, node: &Node, args: &A);
}

impl<A, F> Extension<A> for F
where
    F: Fn(&Node, &A),
{
    fn before_accept(&self, node: &Node, args: &A) {
        self(node, args)
    }
}

pub trait Visitor: Sized {
    type Output: Default;
    type Args: Clone + Default;

    /// Hooks observed by [`visit`] before dispatch.
    fn extensions(&self) -> &[Box<dyn Extension<Self::Args>>] {
        &[]
    }

    fn visit_document(&mut self, node: &Document, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_element_list(
        &mut self,
        node: &ElementList,
        args: &Self::Args,
    ) -> LmlResult<Self::Output>;
    fn visit_block(&mut self, node: &Block, args: &Self::Args) -> LmlResult<Self::Output>;

    /// `h1` .. `h6`; `level` is 1-based.
    fn visit_heading(
        &mut self,
        level: u8,
        node: &Element,
        args: &Self::Args,
    ) -> LmlResult<Self::Output>;
    fn visit_paragraph(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_ol(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_ul(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_li(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_b(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_i(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_c(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_button(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_input(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_link(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_image(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_code(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_pre(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_nospace(&mut self, node: &Element, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_sinkhole(&mut self, node: &Sinkhole, args: &Self::Args) -> LmlResult<Self::Output>;
    fn visit_string(&mut self, node: &StringLit, args: &Self::Args) -> LmlResult<Self::Output>;

    fn visit_number(&mut self, _node: &NumberLit, _args: &Self::Args) -> LmlResult<Self::Output> {
        Ok(Self::Output::default())
    }

    fn visit_boolean(
        &mut self,
        _node: &BooleanLit,
        _args: &Self::Args,
    ) -> LmlResult<Self::Output> {
        Ok(Self::Output::default())
    }

    fn visit_identifier(
        &mut self,
        _node: &Identifier,
        _args: &Self::Args,
    ) -> LmlResult<Self::Output> {
        Ok(Self::Output::default())
    }

    fn visit_attribute_list(
        &mut self,
        _node: &AttributeList,
        _args: &Self::Args,
    ) -> LmlResult<Self::Output> {
        Ok(Self::Output::default())
    }

    fn visit_attribute(
        &mut self,
        _node: &Attribute,
        _args: &Self::Args,
    ) -> LmlResult<Self::Output> {
        Ok(Self::Output::default())
    }
}

/// Dispatches `node` to `visitor`. An absent node yields the empty output.
pub fn visit<V: Visitor>(
    visitor: &mut V,
    node: Option<&Node>,
    args: &V::Args,
) -> LmlResult<V::Output> {
    let Some(node) = node else {
        return Ok(V::Output::default());
    };

    for extension in visitor.extensions() {
        extension.before_accept(node, args);
    }

    match node {
        Node::Document(n) => visitor.visit_document(n, args),
        Node::ElementList(n) => visitor.visit_element_list(n, args),
        Node::Block(n) => visitor.visit_block(n, args),
        Node::H1(n) => visitor.visit_heading(1, n, args),
        Node::H2(n) => visitor.visit_heading(2, n, args),
        Node::H3(n) => visitor.visit_heading(3, n, args),
        Node::H4(n) => visitor.visit_heading(4, n, args),
        Node::H5(n) => visitor.visit_heading(5, n, args),
        Node::H6(n) => visitor.visit_heading(6, n, args),
        Node::Paragraph(n) => visitor.visit_paragraph(n, args),
        Node::Ol(n) => visitor.visit_ol(n, args),
        Node::Ul(n) => visitor.visit_ul(n, args),
        Node::Li(n) => visitor.visit_li(n, args),
        Node::B(n) => visitor.visit_b(n, args),
        Node::I(n) => visitor.visit_i(n, args),
        Node::C(n) => visitor.visit_c(n, args),
        Node::Button(n) => visitor.visit_button(n, args),
        Node::Input(n) => visitor.visit_input(n, args),
        Node::Link(n) => visitor.visit_link(n, args),
        Node::Image(n) => visitor.visit_image(n, args),
        Node::Code(n) => visitor.visit_code(n, args),
        Node::Pre(n) => visitor.visit_pre(n, args),
        Node::NoSpace(n) => visitor.visit_nospace(n, args),
        Node::Sinkhole(n) => visitor.visit_sinkhole(n, args),
        Node::String(n) => visitor.visit_string(n, args),
        Node::Number(n) => visitor.visit_number(n, args),
        Node::Boolean(n) => visitor.visit_boolean(n, args),
        Node::Identifier(n) => visitor.visit_identifier(n, args),
        Node::AttributeList(n) => visitor.visit_attribute_list(n, args),
        Node::Attribute(n) => visitor.visit_attribute(n, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Counts string leaves and records visited kinds through an extension.
    struct Counter {
        extensions: Vec<Box<dyn Extension<()>>>,
    }

    impl Visitor for Counter {
        type Output = usize;
        type Args = ();

        fn extensions(&self) -> &[Box<dyn Extension<()>>] {
            &self.extensions
        }

        fn visit_document(&mut self, node: &Document, args: &()) -> LmlResult<usize> {
            visit(self, node.document.as_deref(), args)
        }

        fn visit_element_list(&mut self, node: &ElementList, args: &()) -> LmlResult<usize> {
            let mut n = 0;
            for src in &node.sources {
                n += visit(self, Some(src), args)?;
            }
            Ok(n)
        }

        fn visit_block(&mut self, node: &Block, args: &()) -> LmlResult<usize> {
            let mut n = 0;
            for src in &node.body {
                n += visit(self, Some(src), args)?;
            }
            Ok(n)
        }

        fn visit_heading(&mut self, _level: u8, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_paragraph(&mut self, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_ol(&mut self, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_ul(&mut self, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_li(&mut self, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_b(&mut self, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_i(&mut self, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_c(&mut self, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_button(&mut self, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_input(&mut self, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_link(&mut self, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_image(&mut self, _node: &Element, _args: &()) -> LmlResult<usize> {
            Ok(0)
        }

        fn visit_code(&mut self, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_pre(&mut self, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_nospace(&mut self, node: &Element, args: &()) -> LmlResult<usize> {
            visit(self, node.body.as_deref(), args)
        }

        fn visit_sinkhole(&mut self, node: &Sinkhole, args: &()) -> LmlResult<usize> {
            match node.name.as_str() {
                "answer" => visit(self, node.body.as_deref(), args),
                _ => Ok(0),
            }
        }

        fn visit_string(&mut self, _node: &StringLit, _args: &()) -> LmlResult<usize> {
            Ok(1)
        }
    }

    #[test]
    fn test_absent_node_is_empty_result() {
        let mut v = Counter { extensions: vec![] };
        assert_eq!(visit(&mut v, None, &()).unwrap(), 0);
    }

    #[test]
    fn test_unknown_sinkhole_and_unsupported_leaves_are_empty() {
        let doc = Node::document(vec![
            Node::Sinkhole(Sinkhole {
                id: 1,
                name: "mystery".into(),
                attributes: None,
                body: Some(Box::new(Node::block(vec![Node::string("hidden")]))),
            }),
            Node::Sinkhole(Sinkhole {
                id: 2,
                name: "answer".into(),
                attributes: None,
                body: Some(Box::new(Node::block(vec![
                    Node::string("shown"),
                    Node::number(4.0),
                ]))),
            }),
        ]);
        let mut v = Counter { extensions: vec![] };
        assert_eq!(visit(&mut v, Some(&doc), &()).unwrap(), 1);
    }

    #[test]
    fn test_extensions_observe_every_node_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let hook = move |node: &Node, _: &()| sink.borrow_mut().push(node.tag_name().to_string());

        let doc = Node::document(vec![Node::Paragraph(
            Element::new(1).with_body(Node::block(vec![Node::string("x")])),
        )]);
        let mut v = Counter {
            extensions: vec![Box::new(hook)],
        };
        visit(&mut v, Some(&doc), &()).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec!["Document", "ElementList", "p", "Block", "String"]
        );
    }
}
