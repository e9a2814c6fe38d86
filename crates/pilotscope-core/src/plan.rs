//! Planner-side view of relations, filters and chosen paths.
//!
//! The host optimizer owns the real structures; a host binding lowers the
//! parts the probe-query unparser needs into these types:
//! - `RelCatalog`: every base relation with its real name, alias and the
//!   filters attached to it (the host's per-relation restriction list).
//! - `JoinRel`: a join under consideration, its member relations, the
//!   join-level restriction list and the cheapest paths of its two inputs.
//! - `Path`: the chosen access/join path subtree. Only join and pass-through
//!   wrapper variants carry anything the unparser reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::RelId;
use crate::schema::DataType;

/// A variable reference inside a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Var {
    /// Column of a base relation, resolved to the relation alias.
    Column { alias: String, attribute: String },
    /// Intermediate pipeline slots without a stable schema.
    Inner,
    Outer,
    Index,
}

/// A literal constant as the host's type output function renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Const {
    pub data_type: DataType,
    /// `None` for SQL NULL.
    pub value: Option<String>,
}

/// Filter expression tree. Closed set; anything the host cannot lower into
/// one of the first four shapes becomes `Unsupported`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Var(Var),
    Const(Const),
    /// Operator call; two or more args print infix, one arg prints prefix.
    Op { op: String, args: Vec<Expr> },
    Func { name: String, args: Vec<Expr> },
    Unsupported { tag: String },
}

impl Expr {
    pub fn column(alias: impl Into<String>, attribute: impl Into<String>) -> Self {
        Expr::Var(Var::Column {
            alias: alias.into(),
            attribute: attribute.into(),
        })
    }

    pub fn constant(data_type: DataType, value: impl Into<String>) -> Self {
        Expr::Const(Const {
            data_type,
            value: Some(value.into()),
        })
    }

    pub fn int(v: i64) -> Self {
        Self::constant(DataType::Int64, v.to_string())
    }

    pub fn text(v: impl Into<String>) -> Self {
        Self::constant(DataType::Utf8, v)
    }

    pub fn null(data_type: DataType) -> Self {
        Expr::Const(Const {
            data_type,
            value: None,
        })
    }

    pub fn binary(op: impl Into<String>, left: Expr, right: Expr) -> Self {
        Expr::Op {
            op: op.into(),
            args: vec![left, right],
        }
    }

    pub fn prefix(op: impl Into<String>, operand: Expr) -> Self {
        Expr::Op {
            op: op.into(),
            args: vec![operand],
        }
    }

    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Func {
            name: name.into(),
            args,
        }
    }
}

/// A base relation as the planner's range table sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseRel {
    pub id: RelId,
    pub name: String,
    pub alias: String,
    #[serde(default)]
    pub filters: Vec<Expr>,
}

impl BaseRel {
    pub fn new(id: RelId, name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            alias: alias.into(),
            filters: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Expr) -> Self {
        self.filters.push(filter);
        self
    }

    /// `name`, or `name alias` when the alias differs.
    pub fn from_item(&self) -> String {
        if self.name == self.alias {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.alias)
        }
    }
}

/// Relation ids in insertion order, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelSet(Vec<RelId>);

impl RelSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns false if the id was already a member.
    pub fn insert(&mut self, id: RelId) -> bool {
        if self.0.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = RelId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<RelId> for RelSet {
    fn from_iter<I: IntoIterator<Item = RelId>>(iter: I) -> Self {
        let mut set = RelSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Base relations known to the planner for the current query.
#[derive(Debug, Clone, Default)]
pub struct RelCatalog {
    rels: BTreeMap<RelId, BaseRel>,
}

impl RelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later registrations under the same id replace earlier ones.
    pub fn register(&mut self, rel: BaseRel) {
        self.rels.insert(rel.id, rel);
    }

    pub fn get(&self, id: RelId) -> Option<&BaseRel> {
        self.rels.get(&id)
    }

    pub fn require(&self, id: RelId) -> Result<&BaseRel> {
        self.get(id)
            .ok_or_else(|| Error::Plan(format!("relation {id} is not in the catalog")))
    }

    pub fn len(&self) -> usize {
        self.rels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }
}

impl FromIterator<BaseRel> for RelCatalog {
    fn from_iter<I: IntoIterator<Item = BaseRel>>(iter: I) -> Self {
        let mut catalog = RelCatalog::new();
        for rel in iter {
            catalog.register(rel);
        }
        catalog
    }
}

/// Binary join path: residual join filters plus both inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPath {
    #[serde(default)]
    pub join_filters: Vec<Expr>,
    pub outer: Box<Path>,
    pub inner: Box<Path>,
}

impl JoinPath {
    pub fn new(join_filters: Vec<Expr>, outer: Path, inner: Path) -> Self {
        Self {
            join_filters,
            outer: Box::new(outer),
            inner: Box::new(inner),
        }
    }
}

/// Chosen access/join path subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Path {
    /// Any scan of a base relation; `param_filters` holds the clauses pushed
    /// into a parameterized scan (e.g. the inner side of a nested loop).
    Scan {
        rel: RelId,
        #[serde(default)]
        param_filters: Vec<Expr>,
    },
    NestLoop(JoinPath),
    MergeJoin(JoinPath),
    HashJoin(JoinPath),
    Gather(Box<Path>),
    GatherMerge(Box<Path>),
    /// Sort, material, append, ...: nothing to unparse below it.
    Other { label: String },
}

impl Path {
    pub fn scan(rel: RelId) -> Self {
        Path::Scan {
            rel,
            param_filters: Vec::new(),
        }
    }

    pub fn param_filters(&self) -> &[Expr] {
        match self {
            Path::Scan { param_filters, .. } => param_filters,
            _ => &[],
        }
    }

    pub fn as_join(&self) -> Option<&JoinPath> {
        match self {
            Path::NestLoop(jp) | Path::MergeJoin(jp) | Path::HashJoin(jp) => Some(jp),
            _ => None,
        }
    }

    /// The single child of a pass-through wrapper.
    pub fn wrapped(&self) -> Option<&Path> {
        match self {
            Path::Gather(sub) | Path::GatherMerge(sub) => Some(sub),
            _ => None,
        }
    }
}

/// A join relation under consideration by the host optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRel {
    pub relids: RelSet,
    /// Join-level restriction list passed to the size estimate.
    #[serde(default)]
    pub filters: Vec<Expr>,
    /// Cheapest total path of the outer input relation, if already chosen.
    #[serde(default)]
    pub outer_path: Option<Path>,
    /// Cheapest total path of the inner input relation, if already chosen.
    #[serde(default)]
    pub inner_path: Option<Path>,
}
