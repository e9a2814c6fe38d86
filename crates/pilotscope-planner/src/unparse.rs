//! Plan-to-SQL probe unparser.
//!
//! For a base relation:
//! ```text
//! select count(*) from <name>[ <alias>][ where f1 and f2 ...];
//! ```
//! For a join:
//! ```text
//! select count(*) from r1[ a1], r2[ a2], ...
//!   <join filters> <filters found while descending the input paths>
//!   <base filters of every member relation>;
//! ```
//! Clause lists share one "where already opened" flag per top-level call, so
//! the first emitted clause opens ` where ` and every later one is joined
//! with ` and `, whichever list it comes from.
//!
//! The output buffer is caller-owned and cleared at the start of every
//! top-level call; nothing is carried over between calls.

use pilotscope_core::error::Result;
use pilotscope_core::id::RelId;
use pilotscope_core::plan::{Const, Expr, JoinRel, Path, RelCatalog, RelSet, Var};

const SELECT_PREFIX: &str = "select count(*) from ";
const SLOT_PLACEHOLDER: &str = "?";
const UNKNOWN_EXPR: &str = "unknown expr";

struct Unparser<'a> {
    catalog: &'a RelCatalog,
    out: &'a mut String,
    where_open: bool,
}

impl<'a> Unparser<'a> {
    fn new(catalog: &'a RelCatalog, out: &'a mut String) -> Self {
        out.clear();
        Self {
            catalog,
            out,
            where_open: false,
        }
    }

    fn from_list(&mut self, relids: impl IntoIterator<Item = RelId>) -> Result<()> {
        self.out.push_str(SELECT_PREFIX);
        for (i, id) in relids.into_iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            let rel = self.catalog.require(id)?;
            self.out.push_str(&rel.from_item());
        }
        Ok(())
    }

    fn clauses(&mut self, clauses: &[Expr]) {
        for clause in clauses {
            self.out
                .push_str(if self.where_open { " and " } else { " where " });
            self.where_open = true;
            self.expr(clause);
        }
    }

    fn path(&mut self, path: &Path) {
        if let Some(jp) = path.as_join() {
            if !jp.join_filters.is_empty() {
                self.clauses(&jp.join_filters);
            } else {
                // Join clauses pushed into a parameterized inner scan.
                self.clauses(jp.inner.param_filters());
            }
            self.path(&jp.outer);
            self.path(&jp.inner);
        } else if let Some(sub) = path.wrapped() {
            self.path(sub);
        }
    }

    fn base_filters(&mut self, relids: &RelSet) -> Result<()> {
        let catalog = self.catalog;
        for id in relids.iter() {
            self.clauses(&catalog.require(id)?.filters);
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Var(var) => self.var(var),
            Expr::Const(c) => self.constant(c),
            Expr::Op { op, args } => match args.as_slice() {
                [] => self.out.push_str(UNKNOWN_EXPR),
                [operand] => {
                    self.out.push_str(op);
                    self.out.push(' ');
                    self.expr(operand);
                }
                [left, right, ..] => {
                    self.expr(left);
                    self.out.push(' ');
                    self.out.push_str(op);
                    self.out.push(' ');
                    self.expr(right);
                }
            },
            Expr::Func { name, args } => {
                self.out.push_str(name);
                self.out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.expr(arg);
                }
                self.out.push(')');
            }
            Expr::Unsupported { .. } => self.out.push_str(UNKNOWN_EXPR),
        }
    }

    fn var(&mut self, var: &Var) {
        match var {
            Var::Column { alias, attribute } => {
                self.out.push_str(alias);
                self.out.push('.');
                self.out.push_str(attribute);
            }
            Var::Inner | Var::Outer | Var::Index => self.out.push_str(SLOT_PLACEHOLDER),
        }
    }

    fn constant(&mut self, c: &Const) {
        let Some(value) = &c.value else {
            self.out.push_str("NULL");
            return;
        };
        if c.data_type.is_numeric() {
            self.out.push_str(value);
        } else {
            self.out.push('\'');
            self.out.push_str(value);
            self.out.push('\'');
        }
    }
}

/// Probe query for one base relation and its own filters.
pub fn unparse_base_rel(catalog: &RelCatalog, rel: RelId, out: &mut String) -> Result<()> {
    let res = write_base_rel(&mut Unparser::new(catalog, out), rel);
    if res.is_err() {
        out.clear();
    }
    res
}

/// Probe query for a join: explicit join filters, filters implied by the
/// chosen input paths, then every member's base filters.
pub fn unparse_join_rel(catalog: &RelCatalog, join: &JoinRel, out: &mut String) -> Result<()> {
    let res = write_join_rel(&mut Unparser::new(catalog, out), join);
    if res.is_err() {
        out.clear();
    }
    res
}

fn write_base_rel(u: &mut Unparser<'_>, rel: RelId) -> Result<()> {
    let catalog = u.catalog;
    u.from_list([rel])?;
    u.clauses(&catalog.require(rel)?.filters);
    u.out.push(';');
    Ok(())
}

fn write_join_rel(u: &mut Unparser<'_>, join: &JoinRel) -> Result<()> {
    u.from_list(join.relids.iter())?;
    u.clauses(&join.filters);
    if let Some(inner) = &join.inner_path {
        u.path(inner);
    }
    if let Some(outer) = &join.outer_path {
        u.path(outer);
    }
    u.base_filters(&join.relids)?;
    u.out.push(';');
    Ok(())
}

pub fn base_rel_probe(catalog: &RelCatalog, rel: RelId) -> Result<String> {
    let mut out = String::new();
    unparse_base_rel(catalog, rel, &mut out)?;
    Ok(out)
}

pub fn join_rel_probe(catalog: &RelCatalog, join: &JoinRel) -> Result<String> {
    let mut out = String::new();
    unparse_join_rel(catalog, join, &mut out)?;
    Ok(out)
}
