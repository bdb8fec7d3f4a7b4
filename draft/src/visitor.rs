//! Enter/exit traversal of a draft's item tree.
//!
//! Mirrors the pattern traversal: each item is entered, its children
//! (properties, then collection items) are walked unless entry aborted, and
//! the item is exited. A child's exit returning [`VisitFlow::Abort`] skips
//! its remaining siblings.

use pattern_toolkit_core::VisitFlow;

use crate::item::{DraftItem, SchemaKind};

/// Read-only visitor over draft items.
pub trait DraftItemVisitor {
    fn enter(&mut self, _item: &DraftItem) -> VisitFlow {
        VisitFlow::Continue
    }

    fn exit(&mut self, _item: &DraftItem) -> VisitFlow {
        VisitFlow::Continue
    }
}

/// Visitor that may rewrite the items it passes.
///
/// Changes made in `enter` to an item's children are seen by the walk;
/// changes made in `exit` are not revisited.
pub trait DraftItemVisitorMut {
    fn enter(&mut self, _item: &mut DraftItem) -> VisitFlow {
        VisitFlow::Continue
    }

    fn exit(&mut self, _item: &mut DraftItem) -> VisitFlow {
        VisitFlow::Continue
    }
}

/// Walks `item` depth-first. Returns the flow of `item`'s exit.
pub fn walk<V: DraftItemVisitor + ?Sized>(item: &DraftItem, visitor: &mut V) -> VisitFlow {
    if visitor.enter(item) == VisitFlow::Continue {
        for child in item.children() {
            if walk(child, visitor).is_abort() {
                break;
            }
        }
    }
    visitor.exit(item)
}

/// Like [`walk`], with mutable access.
pub fn walk_mut<V: DraftItemVisitorMut + ?Sized>(
    item: &mut DraftItem,
    visitor: &mut V,
) -> VisitFlow {
    if visitor.enter(item) == VisitFlow::Continue {
        for child in item.children_mut() {
            if walk_mut(child, visitor).is_abort() {
                break;
            }
        }
    }
    visitor.exit(item)
}

/// Dotted path of the items currently entered.
///
/// Collection items contribute their id; the collection before them has
/// already contributed the name.
#[derive(Debug, Default)]
pub(crate) struct PathStack {
    segments: Vec<String>,
}

impl PathStack {
    pub(crate) fn push(&mut self, item: &DraftItem) {
        let segment = if item.kind() == SchemaKind::CollectionItem {
            item.id().to_string()
        } else {
            item.name().to_string()
        };
        self.segments.push(segment);
    }

    pub(crate) fn pop(&mut self) {
        self.segments.pop();
    }

    /// Replaces the innermost segment, after a rename.
    pub(crate) fn replace_top(&mut self, segment: &str) {
        if let Some(top) = self.segments.last_mut() {
            *top = segment.to_string();
        }
    }

    pub(crate) fn path(&self) -> String {
        self.segments.join(".")
    }

    /// Path of `name` below the innermost segment.
    pub(crate) fn child_path(&self, name: &str) -> String {
        if self.segments.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.path())
        }
    }

    /// Path of the enclosing item, wrapped in braces.
    pub(crate) fn parent_reference(&self) -> String {
        let end = self.segments.len().saturating_sub(1);
        format!("{{{}}}", self.segments[..end].join("."))
    }

    pub(crate) fn reference(&self) -> String {
        format!("{{{}}}", self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::DraftContext;
    use pattern_toolkit_core::{
        Cardinality, DataType, NewAttribute, NewElement, PatternDefinition, ToolkitDefinition,
        VersionInstruction, VersioningPolicy,
    };

    fn toolkit() -> ToolkitDefinition {
        let mut pattern = PatternDefinition::new("Blog").unwrap();
        let post = {
            let mut editor = pattern.edit_root();
            editor
                .add_attribute(NewAttribute::new("title", DataType::String))
                .unwrap();
            editor
                .add_element(NewElement::new("Post").with_cardinality(Cardinality::ZeroOrMany))
                .unwrap()
        };
        pattern
            .edit(&post)
            .unwrap()
            .add_attribute(NewAttribute::new("body", DataType::String))
            .unwrap();
        ToolkitDefinition::package(
            &mut pattern,
            &VersionInstruction::auto(),
            &VersioningPolicy::default(),
            Vec::new(),
        )
        .unwrap()
        .0
    }

    #[derive(Default)]
    struct Recorder {
        paths: PathStack,
        entered: Vec<String>,
        abort_on: Option<&'static str>,
    }

    impl DraftItemVisitor for Recorder {
        fn enter(&mut self, item: &DraftItem) -> VisitFlow {
            self.paths.push(item);
            self.entered.push(self.paths.path());
            if self.abort_on == Some(item.name()) {
                VisitFlow::Abort
            } else {
                VisitFlow::Continue
            }
        }

        fn exit(&mut self, _item: &DraftItem) -> VisitFlow {
            self.paths.pop();
            VisitFlow::Continue
        }
    }

    #[test]
    fn test_walk_visits_properties_then_items() {
        let toolkit = toolkit();
        let context = DraftContext::new(&toolkit);
        let mut model = DraftItem::new_pattern(&context);
        let item_id = model
            .property_mut("Post")
            .unwrap()
            .materialise_collection_item(&context)
            .unwrap()
            .id()
            .clone();

        let mut recorder = Recorder::default();
        walk(&model, &mut recorder);

        assert_eq!(
            recorder.entered,
            vec![
                "Blog".to_string(),
                "Blog.title".to_string(),
                "Blog.Post".to_string(),
                format!("Blog.Post.{item_id}"),
                format!("Blog.Post.{item_id}.body"),
            ]
        );
        assert!(recorder.paths.path().is_empty());
    }

    #[test]
    fn test_abort_on_enter_skips_children_only() {
        let toolkit = toolkit();
        let context = DraftContext::new(&toolkit);
        let mut model = DraftItem::new_pattern(&context);
        model
            .property_mut("Post")
            .unwrap()
            .materialise_collection_item(&context)
            .unwrap();

        let mut recorder = Recorder {
            abort_on: Some("Post"),
            ..Recorder::default()
        };
        walk(&model, &mut recorder);

        assert_eq!(recorder.entered, vec!["Blog", "Blog.title", "Blog.Post"]);
    }

    #[test]
    fn test_path_stack_references() {
        let toolkit = toolkit();
        let model = DraftItem::new_pattern(&DraftContext::new(&toolkit));
        let mut paths = PathStack::default();
        paths.push(&model);
        paths.push(model.property("title").unwrap());

        assert_eq!(paths.reference(), "{Blog.title}");
        assert_eq!(paths.parent_reference(), "{Blog}");
        assert_eq!(paths.child_path("x"), "Blog.title.x");
        paths.replace_top("headline");
        assert_eq!(paths.path(), "Blog.headline");
    }
}
