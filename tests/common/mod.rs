//! Shared support for data service integration tests.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use dodostore::{
    DataError, DataService, MainQueue, PersistenceContext, StoreConfig, UserInfo, UserInfoService,
};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// How long a test waits for a completion callback.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// An isolated store, data service, and main queue for one test.
pub struct TestStack {
    pub main: MainQueue,
    pub data: DataService,
    pub service: UserInfoService,
    pub main_thread: ThreadId,
    _dir: tempfile::TempDir,
}

impl TestStack {
    /// Runs `count` completion callbacks on the current thread, failing the
    /// test if they do not arrive in time.
    pub fn run_callbacks(&self, count: usize) {
        let ran = self.main.run(count, CALLBACK_TIMEOUT);
        assert_eq!(ran, count, "timed out waiting for completion callbacks");
    }

    /// Asserts the caller is on the thread that drains the main queue.
    pub fn assert_main_thread(&self) {
        assert_eq!(
            thread::current().id(),
            self.main_thread,
            "completion should run on the main thread"
        );
    }
}

/// Creates an isolated store under a temp directory and the service stack
/// on top of it.
pub fn setup() -> TestStack {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::with_data_dir(dir.path());
    let context = PersistenceContext::open(UserInfoService::model(), &config).unwrap();

    let main = MainQueue::new();
    let data = DataService::new(context, main.handle()).unwrap();
    TestStack {
        service: UserInfoService::new(data.clone()),
        data,
        main_thread: thread::current().id(),
        main,
        _dir: dir,
    }
}

/// Failure callback for operations the test expects to succeed.
pub fn failure_is_a_bug(operation: &'static str) -> impl FnOnce(DataError) + Send + 'static {
    move |error| panic!("{operation} returned error: {error}")
}

/// Creates a sample user with every field populated.
pub fn sample_user(suffix: u32) -> UserInfo {
    let mut user = UserInfo::new(format!("unit{suffix}"), format!("password{suffix}"));
    user.first_name = format!("firstname{suffix}");
    user.last_name = format!("lastname{suffix}");
    user.email_address = format!("email{suffix}@example.com");
    user.height = f64::from(suffix);
    user.consent_to_share_data = true;
    user
}

/// Asserts both lists hold the same users, position by position.
pub fn assert_same_users(expected: &[UserInfo], actual: &[UserInfo]) {
    assert_eq!(expected.len(), actual.len(), "incorrect number of objects");
    for (expected, actual) in expected.iter().zip(actual) {
        assert_same_user(expected, actual);
    }
}

/// Asserts every mapped field matches.
pub fn assert_same_user(expected: &UserInfo, actual: &UserInfo) {
    assert_eq!(expected.username, actual.username);
    assert_eq!(expected.password, actual.password);
    assert_eq!(expected.first_name, actual.first_name);
    assert_eq!(expected.last_name, actual.last_name);
    assert_eq!(expected.email_address, actual.email_address);
    assert!((expected.height - actual.height).abs() < f64::EPSILON);
    assert_eq!(expected.date_of_birth, actual.date_of_birth);
    assert_eq!(
        expected.consent_to_share_data,
        actual.consent_to_share_data
    );
}
