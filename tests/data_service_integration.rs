//! Integration tests for the generic data service contract.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use dodostore::{
    DATA_SERVICE_ERROR_DOMAIN, DataError, EntityBridge, FetchRequest, Record, UserInfo,
    UserInfoService,
};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

#[test]
fn test_round_trip_assigns_handle_and_preserves_fields() {
    let stack = common::setup();
    let user = common::sample_user(1);

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
    assert_eq!(inserted.len(), 1);
    let handle = inserted[0].storage_handle().cloned();
    assert!(handle.is_some(), "inserted object should carry a handle");

    let (tx, rx) = mpsc::channel();
    stack.service.get_user_info(
        move |users| {
            tx.send(users).unwrap();
        },
        common::failure_is_a_bug("fetch"),
    );
    stack.run_callbacks(1);

    let fetched = rx.try_recv().unwrap();
    common::assert_same_users(&[user], &fetched);
    assert_eq!(fetched[0].storage_handle(), handle.as_ref());
}

#[test]
fn test_batch_insert_preserves_input_order() {
    let stack = common::setup();
    let users: Vec<UserInfo> = (0..5).map(common::sample_user).collect();

    let (tx, rx) = mpsc::channel();
    stack.service.insert_user_infos(
        users.clone(),
        move |inserted| {
            tx.send(inserted).unwrap();
        },
        common::failure_is_a_bug("insert"),
    );
    stack.run_callbacks(1);

    let inserted = rx.try_recv().unwrap();
    assert_eq!(inserted.len(), users.len());
    for (input, output) in users.iter().zip(&inserted) {
        assert_eq!(input.username, output.username);
        assert!(output.storage_handle().is_some());
    }

    let mut handles: Vec<_> = inserted
        .iter()
        .map(|user| user.storage_handle().unwrap().clone())
        .collect();
    handles.dedup();
    assert_eq!(handles.len(), users.len(), "handles should be distinct");
}

#[test]
fn test_insert_is_all_or_nothing_when_populate_fails() {
    let stack = common::setup();
    let users: Vec<UserInfo> = (0..3).map(common::sample_user).collect();

    let (tx, rx) = mpsc::channel();
    stack.data.insert_objects(
        UserInfoService::ENTITY,
        users,
        |user: &UserInfo, record: &mut Record| {
            if user.username == "unit1" {
                return Err(DataError::transform("unit1 cannot be serialized"));
            }
            record.set_text("username", user.username.clone());
            record.set_text("password", user.password.clone());
            record.set_real("height", user.height);
            record.set_boolean("consent_to_share_data", user.consent_to_share_data);
            Ok(())
        },
        |_inserted: Vec<UserInfo>| panic!("insert should not succeed"),
        move |error| {
            tx.send(error).unwrap();
        },
    );
    stack.run_callbacks(1);
    rx.try_recv().unwrap();

    // Nothing from the batch may be visible, not even objects populated
    // before the failing one.
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
fn test_update_requires_storage_handle() {
    let stack = common::setup();

    let (tx, rx) = mpsc::channel();
    stack.service.update_user_infos(
        vec![UserInfo::new("u1", "p1")],
        || panic!("update of an unsaved object should not succeed"),
        move |error| {
            tx.send(error).unwrap();
        },
    );
    stack.run_callbacks(1);

    let error = rx.try_recv().unwrap();
    assert_eq!(error.domain(), DATA_SERVICE_ERROR_DOMAIN);
    assert_eq!(error.code(), 0);
    assert!(error.to_string().contains("no storage handle"));
}

#[test]
fn test_failed_update_batch_mutates_nothing() {
    let stack = common::setup();

    let (tx, rx) = mpsc::channel();
    stack.service.insert_user_info(
        common::sample_user(1),
        move |inserted| {
            tx.send(inserted).unwrap();
        },
        common::failure_is_a_bug("insert"),
    );
    stack.run_callbacks(1);
    let mut saved = rx.try_recv().unwrap().remove(0);
    saved.username = "unit1-updated".to_string();

    // The saved object is valid; the fresh one hits the handle precondition
    // and must abort the whole batch before any save.
    let (tx, rx) = mpsc::channel();
    stack.service.update_user_infos(
        vec![saved, UserInfo::new("ghost", "p")],
        || panic!("batch with an unsaved object should not succeed"),
        move |error| {
            tx.send(error).unwrap();
        },
    );
    stack.run_callbacks(1);
    assert!(rx.try_recv().unwrap().to_string().contains("no storage handle"));

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
    assert_eq!(users[0].username, "unit1");
}

#[test]
fn test_remove_requires_storage_handle() {
    let stack = common::setup();

    let (tx, rx) = mpsc::channel();
    stack.service.remove_user_infos(
        vec![UserInfo::new("u1", "p1")],
        || panic!("removal of an unsaved object should not succeed"),
        move |error| {
            tx.send(error).unwrap();
        },
    );
    stack.run_callbacks(1);
    assert!(rx.try_recv().unwrap().to_string().contains("no storage handle"));
}

#[test]
fn test_operations_complete_in_issue_order() {
    let stack = common::setup();
    let order = Arc::new(Mutex::new(Vec::new()));

    let insert_order = Arc::clone(&order);
    stack.service.insert_user_info(
        common::sample_user(1),
        move |_inserted| {
            insert_order.lock().unwrap().push("insert");
        },
        common::failure_is_a_bug("insert"),
    );

    // Issued back-to-back, before the insert completes: the fetch must wait
    // for the insert and observe its effect.
    let fetch_order = Arc::clone(&order);
    let (tx, rx) = mpsc::channel();
    stack.service.get_user_info(
        move |users| {
            fetch_order.lock().unwrap().push("fetch");
            tx.send(users.len()).unwrap();
        },
        common::failure_is_a_bug("fetch"),
    );

    stack.run_callbacks(2);
    assert_eq!(*order.lock().unwrap(), vec!["insert", "fetch"]);
    assert_eq!(rx.try_recv().unwrap(), 1);
}

#[test]
fn test_remove_all_on_empty_store_succeeds() {
    let stack = common::setup();

    let (tx, rx) = mpsc::channel();
    stack.service.remove_all(
        move || {
            tx.send(()).unwrap();
        },
        common::failure_is_a_bug("remove all"),
    );
    stack.run_callbacks(1);
    rx.try_recv().unwrap();
}

#[test]
fn test_fetch_optional_drops_skipped_records() {
    let stack = common::setup();
    let users: Vec<UserInfo> = (1..=3).map(common::sample_user).collect();

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

    // The transform treats "unit2" as malformed and skips it; the rest come
    // back in query order.
    let (tx, rx) = mpsc::channel();
    stack.data.execute_fetch_optional(
        FetchRequest::new(UserInfoService::ENTITY),
        |record: &Record| {
            let username = record.text("username")?;
            if username == "unit2" {
                return None;
            }
            Some(UserInfo::new(
                username,
                record.text("password").unwrap_or_default(),
            ))
        },
        move |users: Vec<UserInfo>| {
            tx.send(users).unwrap();
        },
        common::failure_is_a_bug("fetch optional"),
    );
    stack.run_callbacks(1);

    let users = rx.try_recv().unwrap();
    let names: Vec<_> = users.iter().map(|user| user.username.as_str()).collect();
    assert_eq!(names, vec!["unit1", "unit3"]);
    assert!(users.iter().all(|user| user.storage_handle().is_some()));
}

#[test]
fn test_callbacks_run_on_main_thread_exactly_once() {
    let stack = common::setup();
    let main_thread = stack.main_thread;
    let calls = Arc::new(Mutex::new(0usize));

    let insert_calls = Arc::clone(&calls);
    stack.service.insert_user_info(
        common::sample_user(1),
        move |_inserted| {
            assert_eq!(thread::current().id(), main_thread);
            *insert_calls.lock().unwrap() += 1;
        },
        common::failure_is_a_bug("insert"),
    );
    let fetch_calls = Arc::clone(&calls);
    stack.service.get_user_info(
        move |_users| {
            assert_eq!(thread::current().id(), main_thread);
            *fetch_calls.lock().unwrap() += 1;
        },
        common::failure_is_a_bug("fetch"),
    );

    stack.run_callbacks(2);
    assert_eq!(*calls.lock().unwrap(), 2);
    // No stray completions.
    assert_eq!(stack.main.drain(), 0);
}
