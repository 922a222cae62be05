//! Process-wide defaults. Kept in its own test binary since installing
//! defaults affects every server constructed afterwards.

use std::sync::{Arc, Mutex};

use hyper::Method;
use stub_server::observability::{Level, Logger};
use stub_server::routing::route;
use stub_server::{Defaults, Stub, StubServer};

mod common;

#[derive(Default)]
struct Recorder(Mutex<Vec<(Level, String)>>);

impl Logger for Recorder {
    fn log(&self, level: Level, message: &str) {
        self.0.lock().unwrap().push((level, message.to_string()));
    }
}

#[tokio::test]
async fn defaults_apply_after_instance_stubs() {
    let health = Arc::new(Stub::returning_text(route(Method::GET, "/health"), "default"));
    let logger = Arc::new(Recorder::default());
    Defaults::install(
        Defaults::empty()
            .with_stub(Arc::clone(&health))
            .with_logger(logger.clone()),
    );

    let plain = StubServer::builder()
        .port(common::free_port())
        .build()
        .unwrap();
    let overriding = StubServer::builder()
        .port(common::free_port())
        .stub(Arc::new(Stub::returning_text(
            route(Method::GET, "/health"),
            "instance",
        )))
        .build()
        .unwrap();
    assert_eq!(plain.stubs().len(), 1);
    assert_eq!(overriding.stubs().len(), 2);

    plain.start_async().await.unwrap();
    overriding.start_async().await.unwrap();
    let client = common::client();

    let res = client.get(plain.url("/health")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "default");

    let res = client.get(overriding.url("/health")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "instance");

    assert_eq!(health.call_count(), 1);

    plain.stop_async().await.unwrap();
    overriding.stop_async().await.unwrap();

    let messages = logger.0.lock().unwrap();
    assert!(messages
        .iter()
        .any(|(level, m)| *level == Level::Info && m.starts_with("Starting server at")));
    assert!(messages
        .iter()
        .any(|(level, m)| *level == Level::Info && m.starts_with("Stopped server at")));
}
