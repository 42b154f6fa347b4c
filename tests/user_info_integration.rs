//! Integration tests for the user info service.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use dodostore::{EntityBridge, UserInfo};
use std::sync::mpsc;

#[test]
fn test_insertion_and_retrieval() {
    let stack = common::setup();
    let mut user = common::sample_user(7);
    user.date_of_birth = chrono::DateTime::from_timestamp(640_224_000, 0);

    let (tx, rx) = mpsc::channel();
    stack.service.insert_user_info(
        user.clone(),
        move |inserted| {
            tx.send(inserted).unwrap();
        },
        common::failure_is_a_bug("insert"),
    );
    stack.run_callbacks(1);
    let inserted = rx.try_recv().unwrap();
    assert!(inserted.iter().all(|user| user.storage_handle().is_some()));

    let (tx, rx) = mpsc::channel();
    stack.service.get_user_info(
        move |users| {
            tx.send(users).unwrap();
        },
        common::failure_is_a_bug("fetch"),
    );
    stack.run_callbacks(1);
    common::assert_same_users(&[user], &rx.try_recv().unwrap());
}

#[test]
fn test_insert_update_fetch_scenario() {
    let stack = common::setup();

    let (tx, rx) = mpsc::channel();
    stack.service.insert_user_info(
        UserInfo::new("u1", "p1"),
        move |inserted| {
            tx.send(inserted).unwrap();
        },
        common::failure_is_a_bug("insert"),
    );
    stack.run_callbacks(1);

    let mut saved = rx.try_recv().unwrap().remove(0);
    let handle = saved.storage_handle().cloned().unwrap();

    saved.username = "u1-updated".to_string();
    let (tx, rx) = mpsc::channel();
    stack.service.update_user_infos(
        vec![saved],
        move || {
            tx.send(()).unwrap();
        },
        common::failure_is_a_bug("update"),
    );
    stack.run_callbacks(1);
    rx.try_recv().unwrap();

    let (tx, rx) = mpsc::channel();
    stack.service.get_user_info(
        move |users| {
            tx.send(users).unwrap();
        },
        common::failure_is_a_bug("fetch"),
    );
    stack.run_callbacks(1);

    let users = rx.try_recv().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "u1-updated");
    assert_eq!(users[0].storage_handle(), Some(&handle));
}

#[test]
fn test_update_rewrites_every_field() {
    let stack = common::setup();

    let (tx, rx) = mpsc::channel();
    stack.service.insert_user_info(
        common::sample_user(3),
        move |inserted| {
            tx.send(inserted).unwrap();
        },
        common::failure_is_a_bug("insert"),
    );
    stack.run_callbacks(1);

    let mut updated = rx.try_recv().unwrap().remove(0);
    updated.username.push_str("updated");
    updated.password.push_str("updated");
    updated.first_name.push_str("updated");
    updated.last_name.push_str("updated");
    updated.email_address.push_str("updated");
    updated.height += 1.0;
    updated.consent_to_share_data = !updated.consent_to_share_data;

    let (tx, rx) = mpsc::channel();
    stack.service.update_user_infos(
        vec![updated.clone()],
        move || {
            tx.send(()).unwrap();
        },
        common::failure_is_a_bug("update"),
    );
    stack.run_callbacks(1);
    rx.try_recv().unwrap();

    let (tx, rx) = mpsc::channel();
    stack.service.get_user_info(
        move |users| {
            tx.send(users).unwrap();
        },
        common::failure_is_a_bug("fetch"),
    );
    stack.run_callbacks(1);
    common::assert_same_users(&[updated], &rx.try_recv().unwrap());
}

#[test]
fn test_removing_all() {
    let stack = common::setup();

    let (tx, rx) = mpsc::channel();
    stack.service.insert_user_infos(
        vec![common::sample_user(1), common::sample_user(2)],
        move |inserted| {
            tx.send(inserted).unwrap();
        },
        common::failure_is_a_bug("insert"),
    );
    stack.run_callbacks(1);
    assert_eq!(rx.try_recv().unwrap().len(), 2);

    let (tx, rx) = mpsc::channel();
    stack.service.remove_all(
        move || {
            tx.send(()).unwrap();
        },
        common::failure_is_a_bug("remove all"),
    );
    stack.run_callbacks(1);
    rx.try_recv().unwrap();

    let (tx, rx) = mpsc::channel();
    stack.service.get_user_info(
        move |users| {
            tx.send(users).unwrap();
        },
        common::failure_is_a_bug("fetch"),
    );
    stack.run_callbacks(1);
    assert!(rx.try_recv().unwrap().is_empty());
}

#[test]
fn test_removing_specific_objects() {
    let stack = common::setup();

    let (tx, rx) = mpsc::channel();
    stack.service.insert_user_infos(
        vec![common::sample_user(1), common::sample_user(2)],
        move |inserted| {
            tx.send(inserted).unwrap();
        },
        common::failure_is_a_bug("insert"),
    );
    stack.run_callbacks(1);
    let mut inserted = rx.try_recv().unwrap();
    let doomed = inserted.remove(0);

    let (tx, rx) = mpsc::channel();
    stack.service.remove_user_infos(
        vec![doomed],
        move || {
            tx.send(()).unwrap();
        },
        common::failure_is_a_bug("remove"),
    );
    stack.run_callbacks(1);
    rx.try_recv().unwrap();

    let (tx, rx) = mpsc::channel();
    stack.service.get_user_info(
        move |users| {
            tx.send(users).unwrap();
        },
        common::failure_is_a_bug("fetch"),
    );
    stack.run_callbacks(1);

    let remaining = rx.try_recv().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].username, "unit2");
}

#[test]
fn test_find_by_username() {
    let stack = common::setup();
    let users = vec![
        UserInfo::new("bob", "p"),
        UserInfo::new("alicia", "p"),
        UserInfo::new("alice", "p"),
    ];

    let (tx, rx) = mpsc::channel();
    stack.service.insert_user_infos(
        users,
        move |inserted| {
            tx.send(inserted).unwrap();
        },
        common::failure_is_a_bug("insert"),
    );
    stack.run_callbacks(1);
    rx.try_recv().unwrap();

    let (tx, rx) = mpsc::channel();
    stack.service.find_by_username(
        "ali",
        move |users| {
            tx.send(users).unwrap();
        },
        common::failure_is_a_bug("find"),
    );
    stack.run_callbacks(1);

    let found = rx.try_recv().unwrap();
    let names: Vec<_> = found.iter().map(|user| user.username.as_str()).collect();
    assert_eq!(names, vec!["alice", "alicia"]);
}
