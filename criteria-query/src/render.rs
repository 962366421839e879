//! A JPQL-like rendering of criteria queries, for diagnostics only.
//!
//! The rendering is best effort: it is not guaranteed to parse, and it is never used to execute a
//! query. Aliases it needs are taken from, and recorded in, the alias registry of the query being
//! rendered, so they agree with the aliases of the compiled query.

use std::fmt;
use std::sync::Arc;

use criteria_kernel::{ArithmeticOp, Literal};
use parking_lot::Mutex;
use tracing::trace;

use crate::alias::AliasRegistry;
use crate::compound::CompoundKind;
use crate::fmt::{fmt_with, write_separated};
use crate::node::{Node, NodeKind, Quantifier};
use crate::params::ParameterMap;
use crate::path::{PathDef, PathKind};
use crate::predicate::{BooleanOperator, PredicateDef, PredicateKind};
use crate::query::QueryDef;
use crate::subquery::SubqueryDef;

pub(crate) struct RenderContext<'a> {
    aliases: &'a Mutex<AliasRegistry>,
    params: Mutex<ParameterMap>,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(aliases: &'a Mutex<AliasRegistry>, def: &QueryDef) -> Self {
        if let Err(error) = def.seed_aliases(&mut aliases.lock()) {
            trace!(%error, "rendering a query whose aliases do not seed");
        }
        let params = ParameterMap::collect(def).unwrap_or_default();
        Self {
            aliases,
            params: Mutex::new(params),
        }
    }

    fn alias(&self, node: &Node) -> String {
        self.aliases.lock().get_alias(node)
    }

    fn parameter(&self, node: &Node) -> String {
        match self.params.lock().register(node) {
            Ok((key, _)) => key.to_string(),
            Err(_) => "?".to_owned(),
        }
    }
}

pub(crate) trait CqlDisplay {
    fn cql<'a>(&'a self, cx: &'a RenderContext<'a>) -> impl fmt::Display + 'a;
}

impl CqlDisplay for QueryDef {
    fn cql<'a>(&'a self, cx: &'a RenderContext<'a>) -> impl fmt::Display + 'a {
        fmt_with(move |f| write_query(f, cx, self, &[]))
    }
}

impl CqlDisplay for SubqueryDef {
    fn cql<'a>(&'a self, cx: &'a RenderContext<'a>) -> impl fmt::Display + 'a {
        fmt_with(move |f| {
            let delegate = self.delegate.lock().clone();
            let correlated = self.correlated.read().clone();
            f.write_str("(")?;
            write_query(f, cx, &delegate, &correlated)?;
            f.write_str(")")
        })
    }
}

impl CqlDisplay for Node {
    fn cql<'a>(&'a self, cx: &'a RenderContext<'a>) -> impl fmt::Display + 'a {
        fmt_with(move |f| {
            use NodeKind::*;

            match &self.kind {
                Constant(lit) => write_literal(f, lit),
                Parameter { .. } => f.write_str(&cx.parameter(self)),
                Path(def) => write_path(f, cx, self, def),
                Unary { func, arg } => {
                    write!(f, "{}({})", func.to_string().to_uppercase(), arg.cql(cx))
                }
                Aggregate {
                    func,
                    distinct,
                    arg,
                } => write!(
                    f,
                    "{}({}{})",
                    func.to_string().to_uppercase(),
                    if *distinct { "DISTINCT " } else { "" },
                    arg.cql(cx)
                ),
                Arithmetic {
                    op: ArithmeticOp::Mod,
                    left,
                    right,
                } => write!(f, "MOD({}, {})", left.cql(cx), right.cql(cx)),
                Arithmetic { op, left, right } => {
                    write!(f, "({} {op} {})", left.cql(cx), right.cql(cx))
                }
                Concat { left, right } => {
                    write!(f, "CONCAT({}, {})", left.cql(cx), right.cql(cx))
                }
                Substring { value, from, len } => {
                    write!(f, "SUBSTRING({}, {}", value.cql(cx), from.cql(cx))?;
                    if let Some(len) = len {
                        write!(f, ", {}", len.cql(cx))?;
                    }
                    f.write_str(")")
                }
                Locate {
                    value,
                    pattern,
                    from,
                } => {
                    write!(f, "LOCATE({}, {}", pattern.cql(cx), value.cql(cx))?;
                    if let Some(from) = from {
                        write!(f, ", {}", from.cql(cx))?;
                    }
                    f.write_str(")")
                }
                Trim {
                    value,
                    trim_char,
                    spec,
                } => {
                    write!(f, "TRIM({spec} ")?;
                    if let Some(c) = trim_char {
                        write!(f, "{} ", c.cql(cx))?;
                    }
                    write!(f, "FROM {})", value.cql(cx))
                }
                Cast { value } => write!(f, "CAST({} AS {})", value.cql(cx), self.java_type()),
                Function { name, args } => {
                    write!(f, "FUNCTION('{name}'")?;
                    for arg in args {
                        write!(f, ", {}", arg.cql(cx))?;
                    }
                    f.write_str(")")
                }
                Current(temporal) => write!(f, "{temporal}"),
                Case { whens, otherwise } => {
                    f.write_str("CASE")?;
                    write_whens(f, cx, whens, otherwise.as_ref())
                }
                SimpleCase {
                    operand,
                    whens,
                    otherwise,
                } => {
                    write!(f, "CASE {}", operand.cql(cx))?;
                    write_whens(f, cx, whens, otherwise.as_ref())
                }
                Coalesce(values) => {
                    f.write_str("COALESCE(")?;
                    write_list(f, cx, values)?;
                    f.write_str(")")
                }
                NullIf { left, right } => {
                    write!(f, "NULLIF({}, {})", left.cql(cx), right.cql(cx))
                }
                MapEntry(map) => write!(f, "ENTRY({})", map.cql(cx)),
                Subquery(sub) => write!(f, "{}", sub.cql(cx)),
                Quantified {
                    quantifier,
                    subquery,
                } => write!(
                    f,
                    "{} {}",
                    match quantifier {
                        Quantifier::All => "ALL",
                        Quantifier::Any => "ANY",
                    },
                    subquery.cql(cx)
                ),
                Predicate(def) => write_predicate(f, cx, def),
                Compound(def) => match &def.kind {
                    CompoundKind::Construct(class) => {
                        write!(f, "NEW {class}(")?;
                        write_list(f, cx, &def.items)?;
                        f.write_str(")")
                    }
                    _ => write_list(f, cx, &def.items),
                },
            }
        })
    }
}

fn write_list(f: &mut fmt::Formatter, cx: &RenderContext<'_>, nodes: &[Arc<Node>]) -> fmt::Result {
    write_separated(f, nodes, ", ", |f, node| write!(f, "{}", node.cql(cx)))
}

fn write_literal(f: &mut fmt::Formatter, lit: &Literal) -> fmt::Result {
    match lit {
        Literal::Boolean(true) => f.write_str("TRUE"),
        Literal::Boolean(false) => f.write_str("FALSE"),
        Literal::Collection(elements) | Literal::Array(elements) => {
            f.write_str("(")?;
            write_separated(f, elements, ", ", write_literal)?;
            f.write_str(")")
        }
        other => write!(f, "{other}"),
    }
}

fn write_whens(
    f: &mut fmt::Formatter,
    cx: &RenderContext<'_>,
    whens: &[(Arc<Node>, Arc<Node>)],
    otherwise: Option<&Arc<Node>>,
) -> fmt::Result {
    for (when, then) in whens {
        write!(f, " WHEN {} THEN {}", when.cql(cx), then.cql(cx))?;
    }
    if let Some(otherwise) = otherwise {
        write!(f, " ELSE {}", otherwise.cql(cx))?;
    }
    f.write_str(" END")
}

/// The alias a root or join is rendered with. Correlated copies take the alias of what they
/// stand for.
fn from_alias(cx: &RenderContext<'_>, node: &Node, def: &PathDef) -> String {
    match def.correlated_target() {
        Some(target) => match target.as_path() {
            Some(target_def) => from_alias(cx, target, target_def),
            None => cx.alias(target),
        },
        None => cx.alias(node),
    }
}

fn write_path(
    f: &mut fmt::Formatter,
    cx: &RenderContext<'_>,
    node: &Node,
    def: &PathDef,
) -> fmt::Result {
    match &def.kind {
        PathKind::Attribute => match (def.parent(), &def.attribute) {
            (Some(parent), Some(attribute)) => write!(f, "{}.{}", parent.cql(cx), attribute.name),
            _ => f.write_str("?"),
        },
        PathKind::MapKey => match def.parent() {
            Some(map) => write!(f, "KEY({})", map.cql(cx)),
            None => f.write_str("KEY(?)"),
        },
        _ => f.write_str(&from_alias(cx, node, def)),
    }
}

fn write_fetches(f: &mut fmt::Formatter, prefix: &str, def: &PathDef) -> fmt::Result {
    for fetch in def.fetches() {
        let Some(fetch_def) = fetch.as_path() else {
            continue;
        };
        let (Some(join_type), Some(attribute)) = (fetch_def.join_type(), &fetch_def.attribute)
        else {
            continue;
        };
        let path = format!("{prefix}.{}", attribute.name);
        write!(f, " {join_type} JOIN FETCH {path}")?;
        write_fetches(f, &path, fetch_def)?;
    }
    Ok(())
}

fn write_joins(
    f: &mut fmt::Formatter,
    cx: &RenderContext<'_>,
    parent: &Node,
    def: &PathDef,
) -> fmt::Result {
    let parent_alias = from_alias(cx, parent, def);
    for join in def.joins() {
        let Some(join_def) = join.as_path() else {
            continue;
        };
        let (Some(join_type), Some(attribute)) = (join_def.join_type(), &join_def.attribute)
        else {
            continue;
        };
        write!(
            f,
            " {join_type} JOIN {parent_alias}.{} {}",
            attribute.name,
            cx.alias(&join)
        )?;
        write_joins(f, cx, &join, join_def)?;
    }
    if let Some(key_join) = def.key_join() {
        if let (Some(key_def), Some(join_type)) = (
            key_join.as_path(),
            key_join.as_path().and_then(PathDef::join_type),
        ) {
            write!(
                f,
                " {join_type} JOIN KEY({parent_alias}) {}",
                cx.alias(&key_join)
            )?;
            write_joins(f, cx, &key_join, key_def)?;
        }
    }
    write_fetches(f, &parent_alias, def)
}

fn write_from(f: &mut fmt::Formatter, cx: &RenderContext<'_>, root: &Arc<Node>) -> fmt::Result {
    let Some(def) = root.as_path() else {
        return Ok(());
    };
    let entity = match &def.kind {
        PathKind::Root { entity } => entity.as_str(),
        _ => "?",
    };
    write!(f, "{entity} {}", from_alias(cx, root, def))?;
    write_joins(f, cx, root, def)
}

fn write_query(
    f: &mut fmt::Formatter,
    cx: &RenderContext<'_>,
    def: &QueryDef,
    correlated: &[Arc<Node>],
) -> fmt::Result {
    f.write_str("SELECT ")?;
    if def.distinct {
        f.write_str("DISTINCT ")?;
    }
    match &def.selection {
        Some(selection) => write!(f, "{}", selection.cql(cx))?,
        None => f.write_str("*")?,
    }

    f.write_str(" FROM ")?;
    write_separated(f, &def.roots, ", ", |f, root| write_from(f, cx, root))?;
    for join in correlated {
        if let Some(join_def) = join.as_path() {
            write_joins(f, cx, join, join_def)?;
        }
    }

    if let Some(restriction) = &def.restriction {
        write!(f, " WHERE {}", restriction.cql(cx))?;
    }
    if !def.ordering.is_empty() {
        f.write_str(" ORDER BY ")?;
        write_separated(f, &def.ordering, ", ", |f, order| {
            write!(
                f,
                "{} {}",
                order.expression().0.cql(cx),
                if order.is_ascending() { "ASC" } else { "DESC" }
            )
        })?;
    }
    if !def.grouping.is_empty() {
        f.write_str(" GROUP BY ")?;
        write_list(f, cx, &def.grouping)?;
    }
    if let Some(having) = &def.having {
        write!(f, " HAVING {}", having.cql(cx))?;
    }
    Ok(())
}

fn not(negated: bool) -> &'static str {
    if negated {
        "NOT "
    } else {
        ""
    }
}

fn write_predicate(
    f: &mut fmt::Formatter,
    cx: &RenderContext<'_>,
    def: &PredicateDef,
) -> fmt::Result {
    use PredicateKind::*;

    let negated = def.negated;
    match &def.kind {
        Junction { op, terms } => {
            let terms = terms.read().clone();
            match (terms.as_slice(), op, negated) {
                ([], BooleanOperator::And, false) | ([], BooleanOperator::Or, true) => {
                    f.write_str("1 = 1")
                }
                ([], _, _) => f.write_str("1 <> 1"),
                ([term], _, _) => write!(f, "{}{}", not(negated), term.cql(cx)),
                (terms, op, negated) => {
                    let sep = match op {
                        BooleanOperator::And => " AND ",
                        BooleanOperator::Or => " OR ",
                    };
                    write!(f, "{}(", not(negated))?;
                    write_separated(f, terms, sep, |f, term| write!(f, "{}", term.cql(cx)))?;
                    f.write_str(")")
                }
            }
        }
        Comparison { op, left, right } => {
            write!(f, "{} {op} {}", left.cql(cx), right.cql(cx))
        }
        Between {
            value,
            lower,
            upper,
        } => write!(
            f,
            "{} {}BETWEEN {} AND {}",
            value.cql(cx),
            not(negated),
            lower.cql(cx),
            upper.cql(cx)
        ),
        Like {
            value,
            pattern,
            escape,
        } => {
            write!(f, "{} {}LIKE {}", value.cql(cx), not(negated), pattern.cql(cx))?;
            if let Some(escape) = escape {
                write!(f, " ESCAPE {}", escape.cql(cx))?;
            }
            Ok(())
        }
        NullCheck { value, not_null } => {
            write!(f, "{} IS {}NULL", value.cql(cx), not(*not_null))
        }
        Empty {
            collection,
            not_empty,
        } => write!(f, "{} IS {}EMPTY", collection.cql(cx), not(*not_empty)),
        Member {
            element,
            collection,
        } => write!(
            f,
            "{} {}MEMBER OF {}",
            element.cql(cx),
            not(negated),
            collection.cql(cx)
        ),
        In { value, values } => {
            let values = values.read().clone();
            write!(f, "{} {}IN ", value.cql(cx), not(negated))?;
            match values.as_slice() {
                [single] if matches!(&single.kind, NodeKind::Constant(lit) if lit.elements().is_some()) => {
                    write!(f, "{}", single.cql(cx))
                }
                values => {
                    f.write_str("(")?;
                    write_list(f, cx, values)?;
                    f.write_str(")")
                }
            }
        }
        Exists(subquery) => write!(f, "{}EXISTS {}", not(negated), subquery.cql(cx)),
        Constant(true) => f.write_str("1 = 1"),
        Constant(false) => f.write_str("1 <> 1"),
    }
}
