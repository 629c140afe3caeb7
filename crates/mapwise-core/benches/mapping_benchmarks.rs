//! Benchmarks for the mapping engine
//!
//! Compares reflective mapping against a registered converter and a
//! hand-written assignment for the same pair, and measures how collection
//! size and override rules affect throughput.
//!
//! Copyright (c) 2025 Mapwise Team
//! Licensed under the Apache-2.0 license

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use facet::Facet;
use mapwise_core::Mapper;

#[derive(Debug, Default, Clone, Facet)]
pub struct Address {
    pub street: String,
    pub city: String,
}

#[derive(Debug, Default, Clone, Facet)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: i32,
    pub address: Address,
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Clone, Facet)]
pub struct CustomerDto {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: i64,
    pub city: String,
    pub tags: Vec<String>,
}

fn create_customer(i: usize) -> Customer {
    Customer {
        id: i as i64,
        name: format!("Customer {}", i),
        email: format!("customer{}@example.com", i),
        age: 20 + (i % 50) as i32,
        address: Address {
            street: format!("{} Main Street", i),
            city: if i % 2 == 0 { "Berlin" } else { "Lisbon" }.to_string(),
        },
        tags: vec!["retail".to_string(), format!("tier-{}", i % 3)],
    }
}

fn manual(customer: &Customer) -> CustomerDto {
    CustomerDto {
        id: customer.id,
        name: customer.name.clone(),
        email: customer.email.clone(),
        age: i64::from(customer.age),
        city: customer.address.city.clone(),
        tags: customer.tags.clone(),
    }
}

fn bench_single_struct(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_struct");
    let customer = create_customer(7);

    let reflective = Mapper::new();
    group.bench_function("reflective", |b| {
        b.iter(|| {
            let dto: CustomerDto = reflective.map(black_box(&customer)).unwrap();
            black_box(dto)
        })
    });

    let configured = Mapper::new();
    configured
        .config::<Customer, CustomerDto>()
        .map("name")
        .from_fn(|c: &Customer| c.name.to_uppercase())
        .map("city")
        .from_path("address.city")
        .register()
        .unwrap();
    group.bench_function("configured", |b| {
        b.iter(|| {
            let dto: CustomerDto = configured.map(black_box(&customer)).unwrap();
            black_box(dto)
        })
    });

    let converted = Mapper::new();
    converted.register_converter(manual);
    group.bench_function("converter", |b| {
        b.iter(|| {
            let dto: CustomerDto = converted.map(black_box(&customer)).unwrap();
            black_box(dto)
        })
    });

    group.bench_function("manual", |b| b.iter(|| black_box(manual(black_box(&customer)))));

    group.finish();
}

fn bench_collections(c: &mut Criterion) {
    let mut group = c.benchmark_group("collections");
    let mapper = Mapper::new();

    for size in [10usize, 100, 1000] {
        let customers: Vec<Customer> = (0..size).map(create_customer).collect();
        group.bench_with_input(BenchmarkId::new("vec", size), &customers, |b, customers| {
            b.iter(|| {
                let dtos: Vec<CustomerDto> = mapper.map(black_box(customers)).unwrap();
                black_box(dtos)
            })
        });
    }

    group.finish();
}

fn bench_shape_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("shape_cache");
    let customer = create_customer(1);

    group.bench_function("cold", |b| {
        b.iter(|| {
            let mapper = Mapper::new();
            let dto: CustomerDto = mapper.map(black_box(&customer)).unwrap();
            black_box(dto)
        })
    });

    let warm = Mapper::new();
    let _: CustomerDto = warm.map(&customer).unwrap();
    group.bench_function("warm", |b| {
        b.iter(|| {
            let dto: CustomerDto = warm.map(black_box(&customer)).unwrap();
            black_box(dto)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_single_struct, bench_collections, bench_shape_cache);
criterion_main!(benches);
