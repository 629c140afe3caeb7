//! Shared test support utilities for mapping integration tests
//!
//! Fixture types deriving `Facet`, plus helpers that build populated
//! instances.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use facet::Facet;
use mapwise_core::{Mapper, MapperSettings, RegistrationPolicy};
use std::sync::{Arc, RwLock, Weak};

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct User {
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub email: String,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct UserDto {
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub age_text: String,
    pub email: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[facet(transparent)]
pub struct UserId(pub i64);

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct Account {
    pub id: UserId,
    pub owner: String,
    pub balance: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct AccountDto {
    pub id: i64,
    pub owner: String,
    pub balance: f32,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct Address {
    pub street: String,
    pub city: String,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct Company {
    pub name: String,
    pub address: Option<Box<Address>>,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct Employee {
    pub name: String,
    pub company: Company,
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct EmployeeCard {
    pub name: String,
    pub employer: String,
    pub city: String,
    pub tag_count: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct BaseEntity {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct Product {
    #[facet(flatten)]
    pub base: BaseEntity,
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct ProductDto {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub price: f32,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct Level3 {
    pub value3: String,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct Level2 {
    pub level3: Level3,
    pub value2: i32,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct Level1 {
    pub level2: Level2,
    pub value1: bool,
}

/// Org chart node; managers and reports form reference cycles
pub type Shared<T> = Arc<RwLock<T>>;

#[derive(Debug, Default, Facet)]
pub struct Person {
    pub name: String,
    pub manager: Option<Shared<Person>>,
    pub reports: Vec<Shared<Person>>,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct PersonDto {
    pub name: String,
    pub manager: Option<Box<PersonDto>>,
    pub reports: Vec<PersonDto>,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct PersonSummary {
    pub name: String,
    pub manager_name: String,
    pub report_count: usize,
}

/// Stands in for a person without keeping them alive
#[derive(Debug, Default, Facet)]
pub struct Delegate {
    pub name: String,
    pub principal: Weak<RwLock<Person>>,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct DelegateDto {
    pub name: String,
    pub principal: Option<PersonDto>,
}

/// Singly linked list node, for graphs deeper than any stack
#[derive(Debug, Default, Facet)]
pub struct Link {
    pub label: String,
    pub next: Option<Box<Link>>,
}

#[derive(Debug, Default, PartialEq, Facet)]
pub struct LinkView {
    pub label: String,
    pub next: Option<Box<LinkView>>,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct Event {
    pub name: String,
    pub at: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Facet)]
pub struct EventView {
    pub name: String,
    pub at: DateTime<Utc>,
}

pub fn john_doe() -> User {
    User {
        first_name: "John".to_string(),
        last_name: "Doe".to_string(),
        age: 30,
        email: "john@example.com".to_string(),
    }
}

pub fn employee_in(city: Option<&str>) -> Employee {
    Employee {
        name: "Ada".to_string(),
        company: Company {
            name: "Analytical Engines".to_string(),
            address: city.map(|city| {
                Box::new(Address {
                    street: "1 Loom Lane".to_string(),
                    city: city.to_string(),
                })
            }),
        },
        tags: vec!["math".to_string(), "engines".to_string()],
    }
}

pub fn product() -> Product {
    Product {
        base: BaseEntity {
            id: 42,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        },
        name: "Widget".to_string(),
        price: 9.5,
    }
}

pub fn nested_levels() -> Level1 {
    Level1 {
        level2: Level2 {
            level3: Level3 {
                value3: "deep".to_string(),
            },
            value2: 2,
        },
        value1: true,
    }
}

pub fn person(name: &str) -> Shared<Person> {
    Arc::new(RwLock::new(Person {
        name: name.to_string(),
        ..Default::default()
    }))
}

/// `report` works for `manager`, and `manager` lists `report`
pub fn link(manager: &Shared<Person>, report: &Shared<Person>) {
    report.write().unwrap().manager = Some(Arc::clone(manager));
    manager.write().unwrap().reports.push(Arc::clone(report));
}

/// Drop the links so reference-counted cycles can be freed
pub fn unlink(people: &[&Shared<Person>]) {
    for person in people {
        let mut person = person.write().unwrap();
        person.manager = None;
        person.reports.clear();
    }
}

pub fn strict_mapper() -> Mapper {
    Mapper::with_settings(MapperSettings {
        registration_policy: RegistrationPolicy::Strict,
        ..Default::default()
    })
    .unwrap()
}

/// A list of `len` links labelled `l0`, `l1`, ...
pub fn chain(len: usize) -> Link {
    let mut head = Link::default();
    for i in (0..len).rev() {
        head = Link {
            label: format!("l{i}"),
            next: (i + 1 < len).then(|| Box::new(head)),
        };
    }
    head
}

/// Drop a list without recursing once per link
pub fn dismantle(mut head: Link) {
    let mut next = head.next.take();
    while let Some(mut link) = next {
        next = link.next.take();
    }
}

pub fn links_in(view: &LinkView) -> usize {
    let mut count = 1;
    let mut current = view;
    while let Some(next) = current.next.as_deref() {
        count += 1;
        current = next;
    }
    count
}
