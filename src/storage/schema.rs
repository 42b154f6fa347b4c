//! Schema descriptors for the persisted model.
//!
//! A [`Model`] is the versioned description of every entity kind a store can
//! hold. [`PersistenceContext::open`](crate::PersistenceContext::open) turns
//! the model into tables at open time and performs lightweight migration
//! against whatever schema the store file already carries.

/// Typed attribute kinds an entity can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Real,
    /// Boolean, stored as an integer 0/1.
    Boolean,
    /// UTC timestamp, stored as Unix epoch seconds.
    Timestamp,
    /// Raw bytes.
    Blob,
}

impl AttributeKind {
    /// Returns the `SQLite` column type this kind is stored as.
    #[must_use]
    pub const fn column_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer | Self::Boolean | Self::Timestamp => "INTEGER",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
        }
    }
}

/// A single typed attribute of an entity kind.
#[derive(Debug, Clone)]
pub struct Attribute {
    name: String,
    kind: AttributeKind,
    required: bool,
}

impl Attribute {
    /// Returns the attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the attribute kind.
    #[must_use]
    pub const fn kind(&self) -> AttributeKind {
        self.kind
    }

    /// Whether a value is required at save time.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }
}

/// Describes one entity kind: its name and typed attributes.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    name: String,
    attributes: Vec<Attribute>,
}

impl EntityDescriptor {
    /// Creates a descriptor with no attributes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Adds a required attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    /// Adds an optional attribute.
    #[must_use]
    pub fn with_optional_attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }

    /// Returns the entity kind name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared attributes, in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// The schema descriptor: a named, versioned set of entity kinds.
///
/// The model name doubles as the store file name (`<name>.sqlite`).
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    entities: Vec<EntityDescriptor>,
}

impl Model {
    /// Creates a model with no entities.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
        }
    }

    /// Adds an entity descriptor.
    #[must_use]
    pub fn with_entity(mut self, entity: EntityDescriptor) -> Self {
        self.entities.push(entity);
        self
    }

    /// Returns the model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns every entity descriptor.
    #[must_use]
    pub fn entities(&self) -> &[EntityDescriptor] {
        &self.entities
    }

    /// Looks up an entity descriptor by kind name.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.name == name)
    }
}

/// Whether a name is safe to splice into SQL as an identifier.
///
/// Entity and attribute names are restricted to `[A-Za-z_][A-Za-z0-9_]*`;
/// everything else is rejected at context-open time.
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
