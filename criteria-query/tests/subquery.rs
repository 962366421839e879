use std::sync::Arc;

use criteria_kernel::{Expr, SubqueryValue, Value};
use criteria_logging::init_test_logging;
use criteria_metamodel::{JavaType, Metamodel};
use criteria_query::{CriteriaBuilder, Selectable};
use pretty_assertions::assert_eq;

fn company() -> Arc<Metamodel> {
    Arc::new(Metamodel::from_json(include_str!("fixtures/company.json")).unwrap())
}

/// The subquery tested by a filter of the form `(... and EXISTS (subquery))`
fn exists_subquery(filter: &Expr) -> &SubqueryValue {
    match filter {
        Expr::And(_, exists) => match exists.as_ref() {
            Expr::IsNotEmpty(Value::Subquery(sub)) => sub,
            other => panic!("expected EXISTS, got {other}"),
        },
        Expr::IsNotEmpty(Value::Subquery(sub)) => sub,
        other => panic!("unexpected filter {other}"),
    }
}

#[test]
fn correlated_joins_resolve_to_the_enclosing_variable() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();
    let phones = e.join("phones").unwrap().aliased("p").unwrap();

    let sub = q.subquery(JavaType::Long);
    let ph = sub.from("Phone").unwrap().aliased("ph").unwrap();
    let correlated = sub.correlate_join(&phones).unwrap();
    sub.select(cb.count(&ph));
    sub.where_(cb.equal(&ph, &correlated)).unwrap();
    q.where_(cb.exists(&sub)).unwrap();

    let exprs = q.compile().unwrap();
    match &exprs.filter {
        Expr::And(bind, _) => assert_eq!(bind.to_string(), "bind(p in e.phones)"),
        other => panic!("unexpected filter {other}"),
    }
    assert_eq!(exprs.variables.keys().collect::<Vec<_>>(), vec!["p"]);

    let sub = exists_subquery(&exprs.filter);
    assert!(sub.correlated);
    assert_eq!(sub.ty, JavaType::Long);
    assert_eq!(sub.expressions.candidate, JavaType::managed("Phone"));
    assert_eq!(sub.expressions.filter.to_string(), "ph = ^p");
    assert!(sub.expressions.filter.bound_variables().is_empty());
    assert!(sub.expressions.variables.is_empty());
    assert_eq!(sub.expressions.projections.len(), 1);
}

#[test]
fn joins_from_correlated_joins_navigate_the_enclosing_variable() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();
    let phones = e.join("phones").unwrap().aliased("p").unwrap();

    let sub = q.subquery(JavaType::Long);
    let d = sub.from("Department").unwrap().aliased("d").unwrap();
    let correlated = sub.correlate_join(&phones).unwrap();
    let owner = correlated.join("owner").unwrap().aliased("o").unwrap();
    sub.select(cb.count(&d));
    sub.where_(cb.equal(&d, owner.get("department").unwrap()))
        .unwrap();
    q.where_(cb.exists(&sub)).unwrap();

    let exprs = q.compile().unwrap();
    let sub = exists_subquery(&exprs.filter);
    assert_eq!(
        sub.expressions.filter.to_string(),
        "(bind(o in ^p.owner) and d = o.department)"
    );
    assert_eq!(
        sub.expressions.variables.get("o"),
        Some(&JavaType::managed("Employee"))
    );
    assert!(sub.correlated);
    assert!(sub.expressions.access_path.contains("Employee"));
}

#[test]
fn correlated_roots_equal_the_enclosing_candidate() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();

    let sub = q.subquery(JavaType::Long);
    let same = sub.correlate_root(&e).unwrap().aliased("same").unwrap();
    let phones = same.join("phones").unwrap().aliased("r").unwrap();
    sub.select(cb.count(&phones));
    q.where_(cb.gt(sub.as_expression(), cb.literal(1))).unwrap();

    let exprs = q.compile().unwrap();
    let Expr::Compare {
        left: Value::Subquery(sub),
        ..
    } = &exprs.filter
    else {
        panic!("unexpected filter {}", exprs.filter);
    };
    assert!(sub.correlated);
    assert_eq!(
        sub.expressions.filter.to_string(),
        "(same = ^e and bind(r in ^e.phones))"
    );
}

#[test]
fn uncorrelated_subqueries_are_not_marked() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();

    let sub = q.subquery(JavaType::Double);
    let other = sub.from("Employee").unwrap().aliased("o").unwrap();
    sub.select(cb.avg(other.get("salary").unwrap()));
    q.where_(cb.gt(e.get("salary").unwrap(), cb.all(&sub)))
        .unwrap();

    let exprs = q.compile().unwrap();
    let Expr::Compare {
        right: Value::All(sub),
        ..
    } = &exprs.filter
    else {
        panic!("unexpected filter {}", exprs.filter);
    };
    assert!(!sub.correlated);
    assert_eq!(sub.expressions.filter, Expr::True);
    assert_eq!(sub.expressions.projections[0].value.to_string(), "avg(o.salary)");
    assert!(exprs.filter.to_string().starts_with("e.salary > all(subquery("));
}

#[test]
fn subquery_aliases_do_not_collide_with_the_enclosing_query() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap();

    let sub = q.subquery(JavaType::Long);
    let inner = sub.from("Employee").unwrap();
    sub.select(cb.count(&inner));
    sub.where_(cb.equal(inner.get("manager").unwrap(), &e))
        .unwrap();
    q.where_(cb.exists(&sub)).unwrap();
    q.compile().unwrap();

    let outer_alias = e.alias().unwrap();
    let inner_alias = inner.alias().unwrap();
    assert_ne!(outer_alias, inner_alias);
    assert_eq!(q.alias_of(&e).unwrap(), outer_alias);
}
