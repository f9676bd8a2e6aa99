//! 会话串行化与公平性回归。

use bookgate_config::{ReaderConfig, ReaderMode};
use bookgate_driver::{DriverFactory, ReaderDriver, SimReaderDriver, SimTag, new_sim_field};
use bookgate_session::ManagedSession;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn session_with_one_tag() -> Arc<ManagedSession> {
    let field = new_sim_field();
    field.lock().push(SimTag::blank([0xD1; 12]));
    let factory: DriverFactory = Arc::new(move |_name: &str| {
        Box::new(SimReaderDriver::new(Arc::clone(&field))) as Box<dyn ReaderDriver>
    });
    ManagedSession::new(
        ReaderConfig {
            name: "fair".to_string(),
            address: "10.0.0.3".to_string(),
            port: 10001,
            mode: ReaderMode::Host,
            antennas: vec![1],
        },
        factory,
    )
}

#[test]
fn concurrent_operations_serialize_in_submission_order() {
    let session = session_with_one_tag();
    let order: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));

    // 先占住会话锁，让后续请求在公平锁上排队。
    let blocker = {
        let session = Arc::clone(&session);
        let order = Arc::clone(&order);
        std::thread::spawn(move || {
            session
                .execute(|driver| {
                    std::thread::sleep(Duration::from_millis(300));
                    driver.inventory(0x01)
                })
                .expect("blocker");
            order.lock().expect("order").push(0);
        })
    };

    std::thread::sleep(Duration::from_millis(50));

    let mut workers = Vec::new();
    for index in 1..=4 {
        let session = Arc::clone(&session);
        let order = Arc::clone(&order);
        workers.push(std::thread::spawn(move || {
            session
                .execute(|driver| driver.inventory(0x01))
                .expect("worker");
            order.lock().expect("order").push(index);
        }));
        // 错开提交时刻，公平锁保证按提交顺序获得锁。
        std::thread::sleep(Duration::from_millis(40));
    }

    blocker.join().expect("join blocker");
    for worker in workers {
        worker.join().expect("join worker");
    }

    let observed = order.lock().expect("order").clone();
    assert_eq!(observed, vec![0, 1, 2, 3, 4]);
}

#[test]
fn session_state_is_consistent_after_parallel_load() {
    let session = session_with_one_tag();
    let mut workers = Vec::new();
    for _ in 0..8 {
        let session = Arc::clone(&session);
        workers.push(std::thread::spawn(move || {
            for _ in 0..10 {
                let items = session
                    .execute(|driver| driver.inventory(0x01))
                    .expect("inventory");
                assert_eq!(items.len(), 1);
            }
        }));
    }
    for worker in workers {
        worker.join().expect("join");
    }
}
