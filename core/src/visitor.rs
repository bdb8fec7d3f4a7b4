//! Enter/exit traversal of the pattern tree.
//!
//! [`walk_pattern`] is the single recursive descent over a
//! [`PatternDefinition`]. Each node is passed to [`PatternVisitor::enter`];
//! unless that returns [`VisitFlow::Abort`], the node's children are walked
//! in the order code templates, automations, attributes, elements. Then
//! [`PatternVisitor::exit`] is called, whether or not entry was aborted.
//!
//! A child whose exit returns [`VisitFlow::Abort`] stops its remaining
//! siblings. The parent's own exit still runs, so traversal always unwinds to
//! the root.

use crate::attribute::Attribute;
use crate::automation::{Automation, CodeTemplate};
use crate::identifier::Identifier;
use crate::pattern::{Element, PatternDefinition, PatternElement};

/// Whether a traversal should descend/continue or stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitFlow {
    Continue,
    Abort,
}

impl VisitFlow {
    pub fn is_abort(&self) -> bool {
        matches!(self, VisitFlow::Abort)
    }
}

/// A node of the pattern tree, as seen by a [`PatternVisitor`].
#[derive(Debug, Clone, Copy)]
pub enum PatternNode<'a> {
    Pattern(&'a PatternDefinition),
    Element(&'a Element),
    CodeTemplate(&'a CodeTemplate),
    Automation(&'a Automation),
    Attribute(&'a Attribute),
}

impl<'a> PatternNode<'a> {
    pub fn id(&self) -> &'a Identifier {
        match *self {
            PatternNode::Pattern(pattern) => pattern.id(),
            PatternNode::Element(element) => element.id(),
            PatternNode::CodeTemplate(template) => template.id(),
            PatternNode::Automation(automation) => automation.id(),
            PatternNode::Attribute(attribute) => attribute.id(),
        }
    }

    pub fn name(&self) -> &'a str {
        match *self {
            PatternNode::Pattern(pattern) => pattern.name(),
            PatternNode::Element(element) => element.name(),
            PatternNode::CodeTemplate(template) => template.name(),
            PatternNode::Automation(automation) => automation.name(),
            PatternNode::Attribute(attribute) => attribute.name(),
        }
    }

    /// Returns `true` for patterns and elements.
    pub fn is_composite(&self) -> bool {
        matches!(self, PatternNode::Pattern(_) | PatternNode::Element(_))
    }
}

/// Visitor over the pattern tree.
///
/// Both methods default to [`VisitFlow::Continue`], so implementors only
/// override what they need.
pub trait PatternVisitor {
    fn enter(&mut self, _node: PatternNode<'_>) -> VisitFlow {
        VisitFlow::Continue
    }

    fn exit(&mut self, _node: PatternNode<'_>) -> VisitFlow {
        VisitFlow::Continue
    }
}

/// Walks `pattern` depth-first with `visitor`.
///
/// Returns the flow produced by the pattern's exit.
pub fn walk_pattern<V: PatternVisitor + ?Sized>(
    pattern: &PatternDefinition,
    visitor: &mut V,
) -> VisitFlow {
    walk_node(PatternNode::Pattern(pattern), visitor)
}

fn walk_node<V: PatternVisitor + ?Sized>(node: PatternNode<'_>, visitor: &mut V) -> VisitFlow {
    if visitor.enter(node) == VisitFlow::Continue {
        let composite: Option<&PatternElement> = match node {
            PatternNode::Pattern(pattern) => Some(&pattern.element),
            PatternNode::Element(element) => Some(&element.element),
            _ => None,
        };
        if let Some(composite) = composite {
            walk_children(composite, visitor);
        }
    }
    visitor.exit(node)
}

fn walk_children<V: PatternVisitor + ?Sized>(element: &PatternElement, visitor: &mut V) {
    let children = element
        .code_templates
        .iter()
        .map(PatternNode::CodeTemplate)
        .chain(element.automations.iter().map(PatternNode::Automation))
        .chain(element.attributes.iter().map(PatternNode::Attribute))
        .chain(element.elements.iter().map(PatternNode::Element));

    for child in children {
        if walk_node(child, visitor).is_abort() {
            break;
        }
    }
}
