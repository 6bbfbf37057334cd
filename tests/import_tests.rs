/// CSV import pipeline tests against the in-memory store.
mod common;

use common::*;
use credit_scoring_api::import::ImportService;
use serde_json::json;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn imports_semicolon_file_with_features() {
    let store = InMemoryClientStore::new();
    let service = ImportService::new(store.clone());

    let csv = "First_Name; Last_Name ;Birth_Date;phone;salary;city;score\n\
               Ivan;Petrov;15-01-1990;+79990000000;85000,50;Kazan;NaN\n\
               Anna;Smirnova;1985-03-02;;120000;;\n";

    let stats = service.import_csv(csv.as_bytes()).await.unwrap();

    assert_eq!(stats.success_count, 2);
    assert_eq!(stats.failure_count, 0);
    assert_eq!(stats.total, 2);
    assert!(stats.errors.is_empty());

    let clients = store.all();
    assert_eq!(clients[0].first_name, "Ivan");
    assert_eq!(clients[0].birth_date, date(1990, 1, 15));
    assert_eq!(
        clients[0].features,
        Some(json!({"salary": 85000.5, "city": "Kazan", "score": 0.0}))
    );
    assert_eq!(clients[1].birth_date, date(1985, 3, 2));
    assert_eq!(
        clients[1].features,
        Some(json!({"salary": 120000.0, "city": 0.0, "score": 0.0}))
    );
}

#[tokio::test]
async fn invalid_rows_are_reported_with_line_numbers() {
    let store = InMemoryClientStore::new();
    let service = ImportService::new(store.clone());

    let csv = "first_name,last_name,birth_date\n\
               Ivan,Petrov,15-01-1990\n\
               Anna,,02-03-1985\n\
               Petr,Ivanov,March 1980\n\
               Olga,Sokolova\n";

    let stats = service.import_csv(csv.as_bytes()).await.unwrap();

    assert_eq!(stats.success_count, 1);
    assert_eq!(stats.failure_count, 3);
    assert_eq!(stats.total, 4);
    assert_eq!(stats.errors[0], "Line 3: last_name is required");
    assert!(stats.errors[1].starts_with("Line 4: invalid birth_date format"));
    assert_eq!(stats.errors[2], "Line 5: birth_date is required");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn rows_are_flushed_in_batches() {
    let store = InMemoryClientStore::new();
    let service = ImportService::with_batch_size(store.clone(), 2);

    let mut csv = String::from("first_name,last_name,birth_date\n");
    for i in 0..5 {
        csv.push_str(&format!("Name{},Last{},15-01-1990\n", i, i));
    }

    let stats = service.import_csv(csv.as_bytes()).await.unwrap();

    assert_eq!(stats.success_count, 5);
    assert_eq!(store.batch_calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.len(), 5);
}

#[tokio::test]
async fn failed_batch_falls_back_to_row_inserts() {
    let store = InMemoryClientStore::new();
    store.reject_last_name("Broken");
    let service = ImportService::new(store.clone());

    let csv = "first_name,last_name,birth_date\n\
               Ivan,Petrov,15-01-1990\n\
               Anna,Broken,02-03-1985\n\
               Olga,Sokolova,1991-07-20\n";

    let stats = service.import_csv(csv.as_bytes()).await.unwrap();

    assert_eq!(stats.success_count, 2);
    assert_eq!(stats.failure_count, 1);
    assert_eq!(stats.total, 3);
    assert!(stats.errors[0].starts_with("Line 3: failed to create client Anna Broken"));
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn error_list_is_capped() {
    let store = InMemoryClientStore::new();
    let service = ImportService::new(store);

    let mut csv = String::from("first_name,last_name,birth_date\n");
    for _ in 0..30 {
        csv.push_str("Ivan,,15-01-1990\n");
    }

    let stats = service.import_csv(csv.as_bytes()).await.unwrap();

    assert_eq!(stats.failure_count, 30);
    assert_eq!(stats.errors.len(), 21);
    assert_eq!(stats.errors[20], "... and 10 more errors");
}

#[tokio::test]
async fn empty_file_is_bad_request() {
    let service = ImportService::new(InMemoryClientStore::new());

    let err = service.import_csv(b"").await.unwrap_err();
    assert!(err.is_bad_request());
}

#[tokio::test]
async fn header_only_file_imports_nothing() {
    let service = ImportService::new(InMemoryClientStore::new());

    let stats = service
        .import_csv(b"first_name,last_name,birth_date\n")
        .await
        .unwrap();
    assert_eq!(stats.total, 0);
    assert!(stats.errors.is_empty());
}

#[tokio::test]
async fn error_lines_follow_the_physical_file() {
    let service = ImportService::new(InMemoryClientStore::new());

    let csv = "first_name,last_name,birth_date\n\nIvan,,15-01-1990\n";
    let stats = service.import_csv(csv.as_bytes()).await.unwrap();
    assert_eq!(stats.errors, vec!["Line 3: last_name is required"]);

    let csv = "first_name,last_name,birth_date,note\n\
               Anna,Ivanova,02-03-1985,\"first\nsecond\"\n\
               Ivan,,15-01-1990,x\n";
    let stats = service.import_csv(csv.as_bytes()).await.unwrap();
    assert_eq!(stats.success_count, 1);
    assert_eq!(stats.errors, vec!["Line 4: last_name is required"]);
}
