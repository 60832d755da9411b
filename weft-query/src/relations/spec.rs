//! Relationship descriptor types.

use indexmap::IndexMap;
use smol_str::SmolStr;
use std::fmt;

/// Type of relationship between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationType {
    /// One-to-one (e.g. USER has one PROFILE), via a foreign key on the target.
    OneToOne,
    /// One-to-many (e.g. AUTHOR has many BOOK), via a foreign key on the target.
    OneToMany,
    /// Many-to-one (e.g. BOOK belongs to AUTHOR), via a foreign key on the source.
    ManyToOne,
    /// Many-to-many (e.g. BOOK has many TAG) through a pivot entity.
    ManyToMany,
}

impl RelationType {
    /// Derive the kind from the final character of a relationship name.
    ///
    /// `Z` is many-to-many, `S` one-to-many, `1` many-to-one and anything
    /// else one-to-one.
    pub fn from_name(name: &str) -> Self {
        match name.chars().last() {
            Some('Z') => Self::ManyToMany,
            Some('S') => Self::OneToMany,
            Some('1') => Self::ManyToOne,
            _ => Self::OneToOne,
        }
    }

    /// Suffix that names a relationship of this kind by convention.
    pub fn suffix(&self) -> Option<char> {
        match self {
            Self::ManyToMany => Some('Z'),
            Self::OneToMany => Some('S'),
            Self::ManyToOne => Some('1'),
            Self::OneToOne => None,
        }
    }

    /// Kind of the relationship seen from the other end.
    pub fn reverse(&self) -> Self {
        match self {
            Self::ManyToMany => Self::ManyToMany,
            Self::OneToMany => Self::ManyToOne,
            Self::ManyToOne => Self::OneToMany,
            Self::OneToOne => Self::ManyToOne,
        }
    }

    /// Check if this relation returns multiple records.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }

    /// Check if this relation returns a single record.
    pub fn is_one(&self) -> bool {
        matches!(self, Self::OneToOne | Self::ManyToOne)
    }

    /// Cardinality of the target side.
    pub fn cardinality(&self) -> Cardinality {
        if self.is_many() {
            Cardinality::Many
        } else {
            Cardinality::One
        }
    }
}

/// How many target objects one source object links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// At most one.
    One,
    /// Any number.
    Many,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::One => "one",
            Self::Many => "many",
        })
    }
}

/// Field pairs as declared, before qualification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawMapping {
    /// `(source field, target field)` equalities.
    Direct(Vec<(SmolStr, SmolStr)>),
    /// Through a pivot entity.
    Pivot {
        /// Pivot entity name.
        pivot: SmolStr,
        /// `(source field, pivot field)` equalities.
        source: Vec<(SmolStr, SmolStr)>,
        /// `(pivot field, target field)` equalities.
        target: Vec<(SmolStr, SmolStr)>,
    },
}

impl RawMapping {
    /// Direct mapping from field pairs.
    pub fn direct<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<SmolStr>,
        B: Into<SmolStr>,
    {
        Self::Direct(pairs.into_iter().map(|(a, b)| (a.into(), b.into())).collect())
    }

    /// Pivot mapping from field pairs on both sides.
    pub fn pivot<I, J, A, B, C, D>(pivot: impl Into<SmolStr>, source: I, target: J) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        J: IntoIterator<Item = (C, D)>,
        A: Into<SmolStr>,
        B: Into<SmolStr>,
        C: Into<SmolStr>,
        D: Into<SmolStr>,
    {
        Self::Pivot {
            pivot: pivot.into(),
            source: source.into_iter().map(|(a, b)| (a.into(), b.into())).collect(),
            target: target.into_iter().map(|(c, d)| (c.into(), d.into())).collect(),
        }
    }
}

/// Explicit relationship declaration. Unset attributes fall back to the
/// naming convention when the relationship is first resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    /// Relationship name.
    pub name: SmolStr,
    /// Target entity.
    pub target: Option<SmolStr>,
    /// Kind.
    pub kind: Option<RelationType>,
    /// Property name on source objects.
    pub property: Option<SmolStr>,
    /// Name of the reverse relationship on the target.
    pub reverse: Option<SmolStr>,
    /// Join mapping.
    pub mapping: Option<RawMapping>,
}

impl RelationDef {
    /// Declare a relationship with every attribute left to convention.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            target: None,
            kind: None,
            property: None,
            reverse: None,
            mapping: None,
        }
    }

    /// Set the target entity.
    pub fn target(mut self, target: impl Into<SmolStr>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set the kind.
    pub fn kind(mut self, kind: RelationType) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the property name.
    pub fn property(mut self, property: impl Into<SmolStr>) -> Self {
        self.property = Some(property.into());
        self
    }

    /// Set the reverse relationship name.
    pub fn reverse(mut self, reverse: impl Into<SmolStr>) -> Self {
        self.reverse = Some(reverse.into());
        self
    }

    /// Set the join mapping.
    pub fn mapping(mut self, mapping: RawMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }
}

/// Canonical join mapping: `target entity -> source entity -> {source field: target field}`.
///
/// Groups are kept in join order, so a pivot group precedes the terminal
/// target group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinMapping(IndexMap<SmolStr, IndexMap<SmolStr, IndexMap<SmolStr, SmolStr>>>);

impl JoinMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `source.source_field = target.target_field`.
    pub fn bind(
        &mut self,
        target: impl Into<SmolStr>,
        source: impl Into<SmolStr>,
        source_field: impl Into<SmolStr>,
        target_field: impl Into<SmolStr>,
    ) -> &mut Self {
        self.0
            .entry(target.into())
            .or_default()
            .entry(source.into())
            .or_default()
            .insert(source_field.into(), target_field.into());
        self
    }

    /// Iterate target groups in join order.
    pub fn groups(
        &self,
    ) -> impl Iterator<Item = (&SmolStr, &IndexMap<SmolStr, IndexMap<SmolStr, SmolStr>>)> {
        self.0.iter()
    }

    /// Number of joins this mapping compiles to.
    pub fn join_count(&self) -> usize {
        self.0.len()
    }

    /// Check if the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
