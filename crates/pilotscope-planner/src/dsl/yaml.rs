//! YAML plan fixtures: a relation catalog plus the relation or join whose
//! probe query should be built. Stands in for a live host planner in the CLI
//! and in tests.
//!
//! Example:
//! ```yaml
//! relations:
//!   - { id: 1, name: comments, alias: c }
//!   - id: 2
//!     name: posts
//!     alias: p
//!     filters:
//!       - { op: "<=", args: [ { col: p.answercount }, { int: 5 } ] }
//! default_rows: 1000
//! probe:
//!   join:
//!     relids: [1, 2]
//!     filters:
//!       - { op: "=", args: [ { col: c.postid }, { col: p.id } ] }
//!     outer_path: { scan: { rel: 1 } }
//!     inner_path: { scan: { rel: 2 } }
//! ```
//!
//! Expression shorthands: `{col: alias.attr}`, `{slot: inner|outer|index}`,
//! `{int: 5}`, `{num: "1.50"}`, `{str: text}`, `{typed: date, value: "2020-01-01"}`,
//! `{null: int4}`, `{op: "=", args: [..]}`, `{func: name, args: [..]}`,
//! `{unsupported: SubPlan}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pilotscope_core::error::Result as CoreResult;
use pilotscope_core::id::RelId;
use pilotscope_core::plan::{BaseRel, Expr, JoinPath, JoinRel, Path, RelCatalog, RelSet, Var};
use pilotscope_core::schema::DataType;

use crate::unparse::{base_rel_probe, join_rel_probe};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid fixture: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureDoc {
    pub relations: Vec<RelationDef>,
    pub probe: ProbeDef,
    #[serde(default)]
    pub default_rows: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDef {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub filters: Vec<ExprDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeDef {
    Base(u32),
    Join {
        relids: Vec<u32>,
        #[serde(default)]
        filters: Vec<ExprDef>,
        #[serde(default)]
        outer_path: Option<PathDef>,
        #[serde(default)]
        inner_path: Option<PathDef>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotDef {
    Inner,
    Outer,
    Index,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExprDef {
    Column { col: String },
    Slot { slot: SlotDef },
    Int { int: i64 },
    Num { num: String },
    Str {
        #[serde(rename = "str")]
        text: String,
    },
    Typed { typed: String, value: String },
    Null { null: String },
    Op { op: String, args: Vec<ExprDef> },
    Func { func: String, args: Vec<ExprDef> },
    Unsupported { unsupported: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinPathDef {
    #[serde(default)]
    pub join_filters: Vec<ExprDef>,
    pub outer: Box<PathDef>,
    pub inner: Box<PathDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathDef {
    Scan {
        rel: u32,
        #[serde(default)]
        param_filters: Vec<ExprDef>,
    },
    NestLoop(JoinPathDef),
    MergeJoin(JoinPathDef),
    HashJoin(JoinPathDef),
    Gather(Box<PathDef>),
    GatherMerge(Box<PathDef>),
    Other { label: String },
}

/// What the probe should be built for.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeTarget {
    Base(RelId),
    Join(JoinRel),
}

#[derive(Debug, Clone)]
pub struct PlanFixture {
    pub catalog: RelCatalog,
    pub target: ProbeTarget,
    /// Row estimate the "host" would produce without an override.
    pub default_rows: f64,
}

impl PlanFixture {
    pub fn probe(&self) -> CoreResult<String> {
        match &self.target {
            ProbeTarget::Base(rel) => base_rel_probe(&self.catalog, *rel),
            ProbeTarget::Join(join) => join_rel_probe(&self.catalog, join),
        }
    }
}

fn to_expr(def: &ExprDef) -> Result<Expr, FixtureError> {
    Ok(match def {
        ExprDef::Column { col } => {
            let (alias, attribute) = col.split_once('.').ok_or_else(|| {
                FixtureError::Invalid(format!("column '{col}' must be written as alias.attribute"))
            })?;
            Expr::column(alias, attribute)
        }
        ExprDef::Slot { slot } => Expr::Var(match slot {
            SlotDef::Inner => Var::Inner,
            SlotDef::Outer => Var::Outer,
            SlotDef::Index => Var::Index,
        }),
        ExprDef::Int { int } => Expr::int(*int),
        ExprDef::Num { num } => Expr::constant(DataType::Numeric, num.clone()),
        ExprDef::Str { text } => Expr::text(text.clone()),
        ExprDef::Typed { typed, value } => {
            Expr::constant(DataType::from_host_name(typed), value.clone())
        }
        ExprDef::Null { null } => Expr::null(DataType::from_host_name(null)),
        ExprDef::Op { op, args } => Expr::Op {
            op: op.clone(),
            args: to_exprs(args)?,
        },
        ExprDef::Func { func, args } => Expr::func(func.clone(), to_exprs(args)?),
        ExprDef::Unsupported { unsupported } => Expr::Unsupported {
            tag: unsupported.clone(),
        },
    })
}

fn to_exprs(defs: &[ExprDef]) -> Result<Vec<Expr>, FixtureError> {
    defs.iter().map(to_expr).collect()
}

fn to_join_path(def: &JoinPathDef) -> Result<JoinPath, FixtureError> {
    Ok(JoinPath::new(
        to_exprs(&def.join_filters)?,
        to_path(&def.outer)?,
        to_path(&def.inner)?,
    ))
}

fn to_path(def: &PathDef) -> Result<Path, FixtureError> {
    Ok(match def {
        PathDef::Scan { rel, param_filters } => Path::Scan {
            rel: RelId::new(*rel),
            param_filters: to_exprs(param_filters)?,
        },
        PathDef::NestLoop(jp) => Path::NestLoop(to_join_path(jp)?),
        PathDef::MergeJoin(jp) => Path::MergeJoin(to_join_path(jp)?),
        PathDef::HashJoin(jp) => Path::HashJoin(to_join_path(jp)?),
        PathDef::Gather(sub) => Path::Gather(Box::new(to_path(sub)?)),
        PathDef::GatherMerge(sub) => Path::GatherMerge(Box::new(to_path(sub)?)),
        PathDef::Other { label } => Path::Other {
            label: label.clone(),
        },
    })
}

/// Parse a YAML fixture into a catalog and probe target.
pub fn parse_yaml_fixture(yaml_src: &str) -> Result<PlanFixture, FixtureError> {
    let doc: FixtureDoc = serde_yaml::from_str(yaml_src)?;

    let mut catalog = RelCatalog::new();
    for def in &doc.relations {
        let alias = def.alias.clone().unwrap_or_else(|| def.name.clone());
        let mut rel = BaseRel::new(RelId::new(def.id), def.name.clone(), alias);
        rel.filters = to_exprs(&def.filters)?;
        catalog.register(rel);
    }

    let target = match &doc.probe {
        ProbeDef::Base(id) => ProbeTarget::Base(RelId::new(*id)),
        ProbeDef::Join {
            relids,
            filters,
            outer_path,
            inner_path,
        } => {
            if relids.len() < 2 {
                return Err(FixtureError::Invalid(
                    "a join probe needs at least two relations".into(),
                ));
            }
            ProbeTarget::Join(JoinRel {
                relids: relids.iter().copied().map(RelId::new).collect::<RelSet>(),
                filters: to_exprs(filters)?,
                outer_path: outer_path.as_ref().map(to_path).transpose()?,
                inner_path: inner_path.as_ref().map(to_path).transpose()?,
            })
        }
    };

    Ok(PlanFixture {
        catalog,
        target,
        default_rows: doc.default_rows.unwrap_or(1000.0),
    })
}
