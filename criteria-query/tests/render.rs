use std::sync::Arc;

use criteria_kernel::TrimSpec;
use criteria_metamodel::{JavaType, Metamodel};
use criteria_query::{CriteriaBuilder, JoinType, Selectable, Selection};
use pretty_assertions::assert_eq;

fn company() -> Arc<Metamodel> {
    Arc::new(Metamodel::from_json(include_str!("fixtures/company.json")).unwrap())
}

#[test]
fn joins_restrictions_and_ordering() {
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();
    let p = e
        .join_with("phones", JoinType::Left)
        .unwrap()
        .aliased("p")
        .unwrap();
    q.where_(cb.and([
        cb.gt(e.get("age").unwrap(), cb.literal(30)),
        cb.like(p.get("number").unwrap(), cb.literal("555%")),
    ]))
    .unwrap();
    q.order_by([cb.desc(e.get("name").unwrap())]);

    assert_eq!(
        q.to_cql(),
        "SELECT * FROM Employee e LEFT JOIN e.phones p \
         WHERE (e.age > 30 AND p.number LIKE '555%') ORDER BY e.name DESC"
    );
}

#[test]
fn negated_exists() {
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Department"));
    let d = q.from("Department").unwrap().aliased("d").unwrap();

    let sub = q.subquery(JavaType::managed("Employee"));
    let e = sub.from("Employee").unwrap().aliased("e").unwrap();
    sub.select(&e);
    sub.where_(cb.equal(e.get("department").unwrap(), &d))
        .unwrap();
    q.where_(cb.exists(&sub).not()).unwrap();

    assert_eq!(
        q.to_string(),
        "SELECT * FROM Department d WHERE NOT EXISTS \
         (SELECT e FROM Employee e WHERE e.department = d)"
    );
}

#[test]
fn constructors_and_functions() {
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::named("EmployeeSummary"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();
    q.select(cb.construct(
        "EmployeeSummary",
        [
            Selection::from(cb.upper(cb.trim(TrimSpec::Both, e.get("name").unwrap()))),
            Selection::from(cb.modulo(e.get("age").unwrap(), cb.literal(10))),
        ],
    ));
    q.where_(cb.between(e.get("salary").unwrap(), cb.literal(1.5), cb.literal(2.5)))
        .unwrap();
    q.distinct(true);

    assert_eq!(
        q.to_cql(),
        "SELECT DISTINCT NEW EmployeeSummary(UPPER(TRIM(BOTH FROM e.name)), MOD(e.age, 10)) \
         FROM Employee e WHERE e.salary BETWEEN 1.5 AND 2.5"
    );
}

#[test]
fn in_lists_and_null_checks() {
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::managed("Employee"));
    let e = q.from("Employee").unwrap().aliased("e").unwrap();
    let kinds = cb.in_(e.get("age").unwrap());
    kinds.value(cb.literal(vec![1, 2])).unwrap();
    q.where_all(vec![
        kinds,
        cb.is_not_null(e.get("manager").unwrap()),
        cb.is_empty(e.get("projects").unwrap()),
    ]);

    assert_eq!(
        q.to_cql(),
        "SELECT * FROM Employee e WHERE \
         (e.age IN (1, 2) AND e.manager IS NOT NULL AND e.projects IS EMPTY)"
    );
}

#[test]
fn rendering_assigns_the_aliases_compilation_uses() {
    let cb = CriteriaBuilder::new(company());
    let mut q = cb.create_query(JavaType::String);
    let e = q.from("Employee").unwrap();
    let name = e.get("name").unwrap();
    q.select(&name);

    let cql = q.to_cql();
    let alias = e.alias().unwrap();
    assert_eq!(cql, format!("SELECT {alias}.name FROM Employee {alias}"));

    let exprs = q.compile().unwrap();
    assert_eq!(exprs.projections[0].value.to_string(), format!("{alias}.name"));
}
