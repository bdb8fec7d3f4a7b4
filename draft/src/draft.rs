//! The draft aggregate.

use tracing::{info, warn};

use pattern_toolkit_core::{
    DraftPolicy, Identifier, Persistable, PersistableFactory, PersistableProperties, Result,
    ToolkitDefinition, ToolkitError, ValidationResult, validate_name,
};

use crate::dictionary::DraftItemDictionary;
use crate::item::{DraftContext, DraftItem};
use crate::migrate::{DraftUpgradeResult, SchemaMigrator};
use crate::validate::SchemaValidator;

/// A runtime instance of a toolkit, configured by an end user.
///
/// The draft owns a copy of the toolkit it was built from, so its schemas
/// stay resolvable until it is explicitly upgraded.
///
/// # Examples
///
/// ```
/// use pattern_toolkit_core::{
///     Cardinality, DraftPolicy, NewElement, PatternDefinition, ToolkitDefinition,
///     VersionInstruction, VersioningPolicy,
/// };
/// use pattern_toolkit_draft::Draft;
///
/// let mut pattern = PatternDefinition::new("Blog").unwrap();
/// pattern
///     .edit_root()
///     .add_element(NewElement::new("Post").with_cardinality(Cardinality::OneOrMany))
///     .unwrap();
/// let (toolkit, _) = ToolkitDefinition::package(
///     &mut pattern,
///     &VersionInstruction::auto(),
///     &VersioningPolicy::default(),
///     Vec::new(),
/// )
/// .unwrap();
///
/// let mut draft = Draft::new("MyBlog", toolkit, DraftPolicy::default()).unwrap();
/// assert_eq!(draft.validate()[0].message, "Post requires at least one instance");
///
/// let post = draft.model().property("Post").unwrap().id().clone();
/// draft.materialise_collection_item(&post).unwrap();
/// assert!(draft.validate().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    id: Identifier,
    name: String,
    toolkit: ToolkitDefinition,
    model: DraftItem,
    policy: DraftPolicy,
}

impl Draft {
    /// Creates a draft with a freshly materialized pattern item.
    ///
    /// # Errors
    ///
    /// Returns [`ToolkitError::InvalidIdentifier`] or
    /// [`ToolkitError::ReservedName`] for a bad name, or
    /// [`ToolkitError::IncompatibleRuntime`] when the toolkit needs a newer
    /// runtime.
    pub fn new(
        name: impl Into<String>,
        toolkit: ToolkitDefinition,
        policy: DraftPolicy,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        toolkit.verify_runtime()?;

        let model = DraftItem::new_pattern(&DraftContext::new(&toolkit).with_policy(policy));
        info!(
            draft = %name,
            toolkit = %toolkit.pattern().name(),
            version = %toolkit.version(),
            "created draft"
        );
        Ok(Self {
            id: Identifier::generate(),
            name,
            toolkit,
            model,
            policy,
        })
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn toolkit(&self) -> &ToolkitDefinition {
        &self.toolkit
    }

    /// The pattern item at the root of the draft.
    pub fn model(&self) -> &DraftItem {
        &self.model
    }

    pub fn policy(&self) -> DraftPolicy {
        self.policy
    }

    /// Uses `policy` for later materialization; restores the policy a
    /// rehydrated draft does not carry.
    pub fn with_policy(mut self, policy: DraftPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn context(&self) -> DraftContext<'_> {
        DraftContext::new(&self.toolkit).with_policy(self.policy)
    }

    pub fn find_item(&self, id: &Identifier) -> Option<&DraftItem> {
        self.model.find_item(id)
    }

    /// Collects every cardinality and value problem of the draft.
    pub fn validate(&self) -> Vec<ValidationResult> {
        SchemaValidator::new(&self.toolkit).validate(&self.model)
    }

    fn item_mut(&mut self, id: &Identifier) -> Result<&mut DraftItem> {
        self.model
            .find_item_mut(id)
            .ok_or_else(|| ToolkitError::not_found("draft item", id.as_str()))
    }

    /// Materializes the item with `id`. See [`DraftItem::materialise`].
    ///
    /// # Errors
    ///
    /// [`ToolkitError::NotFound`] for an unknown item, or any error of
    /// [`DraftItem::materialise`].
    pub fn materialise(&mut self, id: &Identifier, value: Option<&str>) -> Result<()> {
        let context = DraftContext::new(&self.toolkit).with_policy(self.policy);
        let item = self
            .model
            .find_item_mut(id)
            .ok_or_else(|| ToolkitError::not_found("draft item", id.as_str()))?;
        item.materialise(&context, value)
    }

    /// Adds an item to the collection with `collection_id` and returns its id.
    ///
    /// # Errors
    ///
    /// [`ToolkitError::NotFound`] for an unknown item, or
    /// [`ToolkitError::InvalidSchemaKind`] when it is not a collection.
    pub fn materialise_collection_item(&mut self, collection_id: &Identifier) -> Result<Identifier> {
        let context = DraftContext::new(&self.toolkit).with_policy(self.policy);
        let collection = self
            .model
            .find_item_mut(collection_id)
            .ok_or_else(|| ToolkitError::not_found("draft item", collection_id.as_str()))?;
        let item = collection.materialise_collection_item(&context)?;
        Ok(item.id().clone())
    }

    /// Sets the value of the attribute item with `id`.
    ///
    /// # Errors
    ///
    /// See [`DraftItem::assign_value`].
    pub fn assign_value(&mut self, id: &Identifier, raw: Option<&str>) -> Result<()> {
        let context = DraftContext::new(&self.toolkit).with_policy(self.policy);
        let item = self
            .model
            .find_item_mut(id)
            .ok_or_else(|| ToolkitError::not_found("draft item", id.as_str()))?;
        item.assign_value(&context, raw)
    }

    /// # Errors
    ///
    /// See [`DraftItem::unmaterialise`].
    pub fn unmaterialise(&mut self, id: &Identifier) -> Result<()> {
        self.item_mut(id)?.unmaterialise()
    }

    /// Records a produced file on the item with `id`.
    pub(crate) fn add_artifact_link(
        &mut self,
        id: &Identifier,
        command_id: &Identifier,
        path: &str,
    ) -> Result<()> {
        self.item_mut(id)?.add_artifact_link(command_id, path);
        Ok(())
    }

    /// Lazy dictionary of the item with `id`, including its ancestry.
    pub fn item_dictionary(&self, id: &Identifier) -> Option<DraftItemDictionary<'_>> {
        self.model
            .find_item(id)
            .map(|item| DraftItemDictionary::new(&self.model, item).with_ancestry())
    }

    /// Migrates the draft to `latest`, a later version of its toolkit.
    ///
    /// Upgrading to the version the draft already uses changes nothing.
    ///
    /// # Errors
    ///
    /// [`ToolkitError::IllegalUpgrade`] when `latest` is a different toolkit
    /// or an older version, or [`ToolkitError::IncompatibleRuntime`].
    pub fn upgrade(&mut self, latest: &ToolkitDefinition) -> Result<DraftUpgradeResult> {
        if latest.id() != self.toolkit.id() {
            return Err(self.illegal_upgrade(format!(
                "toolkit '{}' is not the toolkit '{}' it was built from",
                latest.pattern().name(),
                self.toolkit.pattern().name()
            )));
        }
        latest.verify_runtime()?;
        if latest.version() < self.toolkit.version() {
            return Err(self.illegal_upgrade(format!(
                "version {} is older than the current version {}",
                latest.version(),
                self.toolkit.version()
            )));
        }
        if latest.version() == self.toolkit.version() {
            return Ok(DraftUpgradeResult::default());
        }

        let context = DraftContext::new(latest).with_policy(self.policy);
        let result = SchemaMigrator::new(&self.toolkit, context).migrate(&mut self.model);
        if !result.is_success() {
            warn!(draft = %self.name, "draft migration failed; toolkit not upgraded");
            return Ok(result);
        }
        self.toolkit.migrate_pattern(latest);
        Ok(result)
    }

    fn illegal_upgrade(&self, reason: String) -> ToolkitError {
        ToolkitError::IllegalUpgrade {
            draft: self.name.clone(),
            reason,
        }
    }
}

impl Persistable for Draft {
    const TYPE_NAME: &'static str = "Draft";

    fn dehydrate(&self) -> PersistableProperties {
        let mut properties = PersistableProperties::for_type::<Self>();
        properties.set("Id", self.id.as_str());
        properties.set("Name", self.name.clone());
        properties.set_child("Toolkit", &self.toolkit);
        properties.set_child("Model", &self.model);
        properties
    }

    /// Rehydrates with the default [`DraftPolicy`]; see
    /// [`Draft::with_policy`].
    fn rehydrate(properties: &PersistableProperties, factory: &PersistableFactory) -> Result<Self> {
        let mut model: DraftItem = properties.child("Model", factory)?;
        model.populate_ancestry();
        Ok(Self {
            id: properties.identifier("Id")?,
            name: properties.string("Name")?,
            toolkit: properties.child("Toolkit", factory)?,
            model,
            policy: DraftPolicy::default(),
        })
    }
}
