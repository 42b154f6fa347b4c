//! Query descriptors: fetch requests, predicates, and sort order.
//!
//! Predicates compile to parameterized SQL. Attribute names referenced by a
//! predicate or sort descriptor are validated against the entity descriptor
//! before the query runs; values always travel as bound parameters.

/// How subpredicates of a compound predicate combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOperator {
    /// Every subpredicate must match.
    And,
    /// At least one subpredicate must match.
    Or,
}

impl CompoundOperator {
    const fn sql_keyword(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// Result of combining zero subpredicates.
    const fn empty_sql(self) -> &'static str {
        match self {
            Self::And => "1 = 1",
            Self::Or => "1 = 0",
        }
    }
}

/// Sort direction for a sort descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// Whether this direction is ascending.
    #[must_use]
    pub const fn is_ascending(self) -> bool {
        matches!(self, Self::Ascending)
    }

    const fn sql_keyword(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Orders fetch results by one attribute.
#[derive(Debug, Clone)]
pub struct SortDescriptor {
    attribute: String,
    direction: SortDirection,
}

impl SortDescriptor {
    /// Creates a sort descriptor.
    #[must_use]
    pub fn new(attribute: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            attribute: attribute.into(),
            direction,
        }
    }

    /// Ascending sort on the given attribute.
    #[must_use]
    pub fn ascending(attribute: impl Into<String>) -> Self {
        Self::new(attribute, SortDirection::Ascending)
    }

    /// Descending sort on the given attribute.
    #[must_use]
    pub fn descending(attribute: impl Into<String>) -> Self {
        Self::new(attribute, SortDirection::Descending)
    }

    /// Returns the attribute this descriptor sorts on.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Returns the sort direction.
    #[must_use]
    pub const fn direction(&self) -> SortDirection {
        self.direction
    }

    pub(crate) fn sql(&self) -> String {
        format!("\"{}\" {}", self.attribute, self.direction.sql_keyword())
    }
}

/// A query filter over one entity kind's attributes.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Case-insensitive substring match on a text attribute.
    TextContains {
        /// Attribute to match.
        attribute: String,
        /// Substring to look for.
        value: String,
    },
    /// Exact match on an integer attribute.
    IntegerEquals {
        /// Attribute to match.
        attribute: String,
        /// Value to compare against.
        value: i64,
    },
    /// Exact match on a boolean attribute.
    BooleanEquals {
        /// Attribute to match.
        attribute: String,
        /// Value to compare against.
        value: bool,
    },
    /// Membership test on an integer attribute.
    IntegerIn {
        /// Attribute to match.
        attribute: String,
        /// Accepted values; empty never matches.
        values: Vec<i64>,
    },
    /// Combination of subpredicates.
    Compound {
        /// How the subpredicates combine.
        operator: CompoundOperator,
        /// The combined subpredicates.
        subpredicates: Vec<Predicate>,
    },
}

impl Predicate {
    /// Case-insensitive substring match on a text attribute.
    #[must_use]
    pub fn text_contains(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TextContains {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Exact match on an integer attribute.
    #[must_use]
    pub fn integer_equals(attribute: impl Into<String>, value: i64) -> Self {
        Self::IntegerEquals {
            attribute: attribute.into(),
            value,
        }
    }

    /// Exact match on a boolean attribute.
    #[must_use]
    pub fn boolean_equals(attribute: impl Into<String>, value: bool) -> Self {
        Self::BooleanEquals {
            attribute: attribute.into(),
            value,
        }
    }

    /// Membership test on an integer attribute; an empty list never matches.
    #[must_use]
    pub fn integer_in(attribute: impl Into<String>, values: Vec<i64>) -> Self {
        Self::IntegerIn {
            attribute: attribute.into(),
            values,
        }
    }

    /// Conjunction of subpredicates.
    #[must_use]
    pub fn and(subpredicates: Vec<Self>) -> Self {
        Self::Compound {
            operator: CompoundOperator::And,
            subpredicates,
        }
    }

    /// Disjunction of subpredicates.
    #[must_use]
    pub fn or(subpredicates: Vec<Self>) -> Self {
        Self::Compound {
            operator: CompoundOperator::Or,
            subpredicates,
        }
    }

    /// Collects every attribute name this predicate references.
    pub(crate) fn collect_attributes<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::TextContains { attribute, .. }
            | Self::IntegerEquals { attribute, .. }
            | Self::BooleanEquals { attribute, .. }
            | Self::IntegerIn { attribute, .. } => out.push(attribute),
            Self::Compound { subpredicates, .. } => {
                for predicate in subpredicates {
                    predicate.collect_attributes(out);
                }
            },
        }
    }

    /// Compiles to a SQL fragment, appending bound parameters to `params`.
    pub(crate) fn sql(&self, params: &mut Vec<rusqlite::types::Value>) -> String {
        match self {
            Self::TextContains { attribute, value } => {
                params.push(rusqlite::types::Value::Text(format!(
                    "%{}%",
                    escape_like(value)
                )));
                format!("\"{attribute}\" LIKE ? ESCAPE '\\'")
            },
            Self::IntegerEquals { attribute, value } => {
                params.push(rusqlite::types::Value::Integer(*value));
                format!("\"{attribute}\" = ?")
            },
            Self::BooleanEquals { attribute, value } => {
                params.push(rusqlite::types::Value::Integer(i64::from(*value)));
                format!("\"{attribute}\" = ?")
            },
            Self::IntegerIn { attribute, values } => {
                if values.is_empty() {
                    return "1 = 0".to_string();
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                for value in values {
                    params.push(rusqlite::types::Value::Integer(*value));
                }
                format!("\"{attribute}\" IN ({placeholders})")
            },
            Self::Compound {
                operator,
                subpredicates,
            } => {
                if subpredicates.is_empty() {
                    return operator.empty_sql().to_string();
                }
                let joined = subpredicates
                    .iter()
                    .map(|predicate| predicate.sql(params))
                    .collect::<Vec<_>>()
                    .join(&format!(" {} ", operator.sql_keyword()));
                format!("({joined})")
            },
        }
    }
}

/// Escapes LIKE wildcards in a user-supplied match value.
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// A query descriptor: entity kind, optional predicate, sort, and limit.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    entity: String,
    predicate: Option<Predicate>,
    sort: Vec<SortDescriptor>,
    limit: Option<usize>,
}

impl FetchRequest {
    /// Creates a request fetching every instance of an entity kind.
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            predicate: None,
            sort: Vec::new(),
            limit: None,
        }
    }

    /// Filters results with a predicate.
    #[must_use]
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Appends a sort descriptor.
    #[must_use]
    pub fn sorted_by(mut self, descriptor: SortDescriptor) -> Self {
        self.sort.push(descriptor);
        self
    }

    /// Caps the number of returned records.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the entity kind being fetched.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Returns the predicate, if any.
    #[must_use]
    pub const fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    /// Returns the sort descriptors in application order.
    #[must_use]
    pub fn sort_descriptors(&self) -> &[SortDescriptor] {
        &self.sort
    }

    /// Returns the result limit, if any.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }
}
