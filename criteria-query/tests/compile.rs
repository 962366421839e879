use std::collections::HashSet;
use std::sync::Arc;

use criteria_errors::CriteriaError;
use criteria_kernel::{Expr, FillStrategy, Literal};
use criteria_logging::init_test_logging;
use criteria_metamodel::{JavaType, Metamodel};
use criteria_query::{CriteriaBuilder, JoinType, Path, Predicate, Selectable, Selection};
use pretty_assertions::assert_eq;
use test_strategy::proptest;

fn company() -> Arc<Metamodel> {
    Arc::new(Metamodel::from_json(include_str!("fixtures/company.json")).unwrap())
}

#[test]
fn equality_filter_with_ordering() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();
    q.where_(cb.equal(e.get("name").unwrap(), cb.literal("Bob")))
        .unwrap();
    q.order_by([cb.asc(e.get("age").unwrap())]);

    let exprs = q.compile().unwrap();
    assert_eq!(exprs.candidate, JavaType::managed("Employee"));
    assert_eq!(exprs.filter.to_string(), "e.name = 'Bob'");
    assert!(exprs.is_default_projection());
    assert_eq!(exprs.ordering.len(), 1);
    assert_eq!(exprs.ordering[0].value.to_string(), "e.age");
    assert!(exprs.ordering[0].ascending);
    assert!(exprs.having.is_none());
    assert!(exprs.variables.is_empty());
}

#[test]
fn in_a_literal_list_expands_to_equalities() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();
    let ages = cb.in_(e.get("age").unwrap());
    ages.value(cb.literal(vec![20, 30, 40])).unwrap();
    q.where_(ages).unwrap();

    assert_eq!(
        q.compile().unwrap().filter.to_string(),
        "(((e.age = 20 or e.age = 30) or e.age = 40) and e.age <> NULL)"
    );
}

#[test]
fn negated_in_keeps_the_null_guard_outside() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();
    let names = cb.in_(e.get("name").unwrap());
    names.value(cb.literal("a")).unwrap().value(cb.literal("b")).unwrap();
    q.where_(names.not()).unwrap();

    assert_eq!(
        q.compile().unwrap().filter.to_string(),
        "(not((e.name = 'a' or e.name = 'b')) and e.name <> NULL)"
    );
}

#[test]
fn joins_bind_variables_before_the_restriction() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();
    let p = e
        .join_with("phones", JoinType::Left)
        .unwrap()
        .aliased("p")
        .unwrap();
    q.where_(cb.like(p.get("number").unwrap(), cb.literal("555%")))
        .unwrap();

    let exprs = q.compile().unwrap();
    assert_eq!(
        exprs.filter.to_string(),
        "(bind(p in e.phones) and p.number matches '555%')"
    );
    assert_eq!(
        exprs.variables.get("p"),
        Some(&JavaType::managed("Phone"))
    );
    assert_eq!(exprs.filter.bound_variables().len(), 1);
}

#[test]
fn constructor_results_resolve_by_argument_types() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::named("EmployeeSummary"));
    let e = q.from("Employee").unwrap();
    q.multiselect([e.get("name").unwrap(), e.get("age").unwrap()]);

    let exprs = q.compile().unwrap();
    let shape = exprs.result_shape.unwrap();
    assert_eq!(shape.ty, JavaType::named("EmployeeSummary"));
    assert_eq!(
        shape.strategy,
        FillStrategy::NewInstance {
            class: "EmployeeSummary".into(),
            parameters: vec![JavaType::String, JavaType::Integer],
        }
    );
    assert_eq!(exprs.projections.len(), 2);
}

#[test]
fn constructor_arguments_out_of_order_fail() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::named("EmployeeSummary"));
    let e = q.from("Employee").unwrap();
    q.multiselect([e.get("age").unwrap(), e.get("name").unwrap()]);

    assert_eq!(
        q.compile().unwrap_err(),
        CriteriaError::UnconstructibleType {
            class: "EmployeeSummary".into(),
            arguments: vec!["Integer".into(), "String".into()],
        }
    );
}

#[test]
fn grouped_constructor_results() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::named("DepartmentStats"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();
    let d = e.join("department").unwrap().aliased("d").unwrap();
    let name = d.get("name").unwrap();
    q.select(cb.construct(
        "DepartmentStats",
        [
            Selection::from(&name),
            cb.count(&e).into(),
            cb.avg(e.get("salary").unwrap()).into(),
        ],
    ));
    q.group_by([&name]);
    q.having(cb.gt(cb.count(&e), cb.literal(3))).unwrap();

    let exprs = q.compile().unwrap();
    assert_eq!(exprs.grouping.len(), 1);
    assert_eq!(exprs.grouping[0].to_string(), "d.name");
    assert!(exprs.having.is_some());
    assert_eq!(exprs.projections.len(), 3);
    assert!(matches!(
        exprs.result_shape.unwrap().strategy,
        FillStrategy::NewInstance { .. }
    ));
}

#[test]
fn empty_junctions_filter_everything_or_nothing() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());

    let mut q = cb.create_query(JavaType::managed("Employee"));
    q.from("Employee").unwrap();
    q.where_(cb.conjunction()).unwrap();
    assert_eq!(q.compile().unwrap().filter, Expr::True);

    q.where_(cb.disjunction()).unwrap();
    assert_eq!(q.compile().unwrap().filter, Expr::False);

    q.where_(cb.disjunction().not()).unwrap();
    assert_eq!(q.compile().unwrap().filter, Expr::True);
}

#[test]
fn compiling_twice_gives_the_same_result() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_tuple_query();
    let e = q.from("Employee").unwrap();
    let name = e.get("name").unwrap();
    q.multiselect([Selection::from(&name), Selection::from(e.get("age").unwrap())]);
    q.order_by([cb.desc(&name)]);

    let before = q.alias_of(&name).unwrap();
    let first = q.compile().unwrap();
    let second = q.compile().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.projections[0].alias, before);
    assert_eq!(name.alias(), Some(before));
}

#[test]
fn parameters_are_typed_in_order() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap();
    q.where_all(vec![
        cb.gt(e.get("age").unwrap(), cb.named_parameter(JavaType::Integer, "age")),
        cb.lt(e.get("salary").unwrap(), cb.parameter(JavaType::Double)),
    ]);

    let exprs = q.compile().unwrap();
    let types: Vec<_> = exprs.parameter_types.values().cloned().collect();
    assert_eq!(types, vec![JavaType::Integer, JavaType::Double]);
    assert_eq!(exprs.parameter_types, q.parameter_types().unwrap());
}

#[test]
fn navigating_through_collections_fails() {
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap();
    let err = e.get("phones").unwrap().get("number").unwrap_err();
    assert!(err.is_illegal_navigation());
}

fn comparison(cb: &CriteriaBuilder, op: usize, left: Path, right: i32) -> Predicate {
    let right = cb.literal(right);
    match op {
        0 => cb.equal(left, right),
        1 => cb.not_equal(left, right),
        2 => cb.gt(left, right),
        3 => cb.ge(left, right),
        4 => cb.lt(left, right),
        _ => cb.le(left, right),
    }
}

#[proptest]
fn double_negation_compiles_like_the_predicate(#[strategy(0..6usize)] op: usize, age: i32) {
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();
    let p = comparison(&cb, op, e.get("age").unwrap(), age);

    q.where_(&p).unwrap();
    let plain = q.compile().unwrap().filter;
    q.where_(p.not().not()).unwrap();
    let doubled = q.compile().unwrap().filter;
    assert_eq!(plain, doubled);
}

/// Predicates whose negation toggles a flag or a junction rather than inverting an operator
fn flagged(cb: &CriteriaBuilder, kind: usize, e: &Path, age: i32) -> Predicate {
    let age_path = e.get("age").unwrap();
    match kind {
        0 => cb.like(e.get("name").unwrap(), cb.literal("B%")),
        1 => cb.between(age_path, cb.literal(age), cb.literal(age.saturating_add(10))),
        2 => {
            let ages = cb.in_(age_path);
            ages.value(cb.literal(vec![age, 0])).unwrap();
            ages
        }
        3 => cb.is_member(
            cb.named_parameter(JavaType::managed("Phone"), "phone"),
            e.get("phones").unwrap(),
        ),
        4 => cb.is_empty(e.get("projects").unwrap()),
        5 => cb.or([
            cb.gt(age_path, cb.literal(age)),
            cb.like(e.get("name").unwrap(), cb.literal("A%")),
        ]),
        6 => cb.and([cb.is_not_null(e.get("manager").unwrap())]),
        _ => cb.conjunction(),
    }
}

#[proptest]
fn double_negation_compiles_like_the_predicate_for_every_kind(
    #[strategy(0..8usize)] kind: usize,
    age: i32,
) {
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();
    let p = flagged(&cb, kind, &e, age);

    q.where_(&p).unwrap();
    let plain = q.compile().unwrap().filter;
    q.where_(p.not().not()).unwrap();
    let doubled = q.compile().unwrap().filter;
    assert_eq!(plain, doubled);

    q.where_(p.not()).unwrap();
    assert_ne!(plain, q.compile().unwrap().filter);
}

#[test]
fn in_a_bound_array_parameter_expands_to_equalities() {
    init_test_logging();
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();
    let ages = cb.in_(e.get("age").unwrap());
    ages.value(cb.bound_parameter(
        JavaType::array_of(JavaType::Integer),
        "ages",
        Literal::Array(vec![Literal::Integer(1), Literal::Integer(2)]),
    ))
    .unwrap();
    q.where_(ages).unwrap();

    assert_eq!(
        q.compile().unwrap().filter.to_string(),
        "((e.age = 1 or e.age = 2) and e.age <> NULL)"
    );
}

#[proptest]
fn generated_aliases_are_unique(#[strategy(1..12usize)] n: usize) {
    const FIELDS: [&str; 4] = ["name", "age", "salary", "active"];

    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_tuple_query();
    let e = q.from("Employee").unwrap().aliased("autoAlias2").unwrap();
    q.multiselect((0..n).map(|i| e.get(FIELDS[i % FIELDS.len()]).unwrap()));

    let exprs = q.compile().unwrap();
    let aliases: HashSet<_> = exprs.projections.iter().map(|p| p.alias.clone()).collect();
    assert_eq!(aliases.len(), n);
    assert!(!aliases.contains("autoAlias2"));
}
