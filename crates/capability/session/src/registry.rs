//! 读写器注册表。

use crate::session::ManagedSession;
use bookgate_config::ReaderConfig;
use bookgate_driver::DriverFactory;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// 监听端口分配起点。
const LISTENER_PORT_SEED: u16 = 20001;

/// 名称到会话的注册表。
///
/// 启动时一次性装载，稳态只读；监听端口计数器在注册表锁下递增。
pub struct ReaderRegistry {
    readers: HashMap<String, Arc<ManagedSession>>,
    next_listener_port: Mutex<u16>,
}

impl ReaderRegistry {
    pub fn new(configs: Vec<ReaderConfig>, driver_factory: DriverFactory) -> Self {
        let mut readers = HashMap::new();
        for config in configs {
            info!(
                reader = %config.name,
                mode = config.mode.as_str(),
                antennas = ?config.antennas,
                "registered reader"
            );
            readers.insert(
                config.name.clone(),
                ManagedSession::new(config, Arc::clone(&driver_factory)),
            );
        }
        Self {
            readers,
            next_listener_port: Mutex::new(LISTENER_PORT_SEED),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ManagedSession>> {
        self.readers.get(name).cloned()
    }

    /// 按名称排序的会话清单（保证列表端点输出稳定）。
    pub fn sessions(&self) -> Vec<(String, Arc<ManagedSession>)> {
        let mut sessions: Vec<(String, Arc<ManagedSession>)> = self
            .readers
            .iter()
            .map(|(name, session)| (name.clone(), Arc::clone(session)))
            .collect();
        sessions.sort_by(|a, b| a.0.cmp(&b.0));
        sessions
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// 分配下一个监听端口（种子 20001，单调递增）。
    pub fn allocate_listener_port(&self) -> u16 {
        let mut next = self.next_listener_port.lock();
        let port = *next;
        *next += 1;
        port
    }

    /// 关停扇出：关闭全部会话。
    pub fn close_all(&self) {
        for (name, session) in &self.readers {
            info!(reader = %name, "closing reader session");
            session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookgate_config::ReaderMode;
    use bookgate_driver::{ReaderDriver, SimReaderDriver, new_sim_field};

    fn registry_with(names: &[&str]) -> ReaderRegistry {
        let configs = names
            .iter()
            .map(|name| ReaderConfig {
                name: (*name).to_string(),
                address: "10.0.0.2".to_string(),
                port: 10001,
                mode: ReaderMode::Host,
                antennas: vec![1],
            })
            .collect();
        let field = new_sim_field();
        let factory: DriverFactory = Arc::new(move |_name: &str| {
            Box::new(SimReaderDriver::new(Arc::clone(&field))) as Box<dyn ReaderDriver>
        });
        ReaderRegistry::new(configs, factory)
    }

    #[test]
    fn lookup_by_name() {
        let registry = registry_with(&["foyer", "backoffice"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("foyer").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn listener_ports_are_monotonic_from_seed() {
        let registry = registry_with(&["foyer"]);
        assert_eq!(registry.allocate_listener_port(), 20001);
        assert_eq!(registry.allocate_listener_port(), 20002);
        assert_eq!(registry.allocate_listener_port(), 20003);
    }

    #[test]
    fn sessions_are_sorted_by_name() {
        let registry = registry_with(&["zulu", "alpha", "mike"]);
        let names: Vec<String> = registry
            .sessions()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["alpha", "mike", "zulu"]);
    }

    #[test]
    fn close_all_terminates_sessions() {
        let registry = registry_with(&["foyer"]);
        let session = registry.get("foyer").expect("session");
        registry.close_all();
        assert!(session.execute(|driver| driver.inventory(0x01)).is_err());
    }
}
