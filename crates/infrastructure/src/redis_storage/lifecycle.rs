use broker_core::{BrokerError, BrokerResult};

/// 存储提供者的生命周期状态
///
/// `init` 只允许从 `Uninitialized` 开始一次；连接失败后进入 `Failed`，实例不可再用。
pub(crate) enum Lifecycle<S> {
    Uninitialized,
    Initializing,
    Ready(S),
    Failed,
    Destroyed,
}

impl<S> Lifecycle<S> {
    pub(crate) fn begin_init(&mut self, component: &str) -> BrokerResult<()> {
        match self {
            Lifecycle::Uninitialized => {
                *self = Lifecycle::Initializing;
                Ok(())
            }
            _ => Err(BrokerError::AlreadyInitialized(component.to_string())),
        }
    }

    /// 完成初始化；期间实例已被销毁时把状态原样交还给调用方释放
    pub(crate) fn finish_init(&mut self, state: S) -> Result<(), S> {
        match self {
            Lifecycle::Initializing => {
                *self = Lifecycle::Ready(state);
                Ok(())
            }
            _ => Err(state),
        }
    }

    pub(crate) fn fail_init(&mut self) {
        if matches!(self, Lifecycle::Initializing) {
            *self = Lifecycle::Failed;
        }
    }

    pub(crate) fn ready(&self) -> Option<&S> {
        match self {
            Lifecycle::Ready(state) => Some(state),
            _ => None,
        }
    }

    /// 取出运行状态并标记为已销毁；未初始化的实例保持原状
    pub(crate) fn take_for_destroy(&mut self) -> Option<S> {
        match std::mem::replace(self, Lifecycle::Destroyed) {
            Lifecycle::Ready(state) => Some(state),
            Lifecycle::Uninitialized => {
                *self = Lifecycle::Uninitialized;
                None
            }
            _ => None,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Initializing => "initializing",
            Lifecycle::Ready(_) => "ready",
            Lifecycle::Failed => "failed",
            Lifecycle::Destroyed => "destroyed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_only_once() {
        let mut lifecycle: Lifecycle<u8> = Lifecycle::Uninitialized;
        lifecycle.begin_init("test").unwrap();
        assert!(matches!(
            lifecycle.begin_init("test"),
            Err(BrokerError::AlreadyInitialized(_))
        ));

        lifecycle = Lifecycle::Failed;
        assert!(lifecycle.begin_init("test").is_err());
    }

    #[test]
    fn test_destroy_during_init_returns_state() {
        let mut lifecycle: Lifecycle<u8> = Lifecycle::Uninitialized;
        lifecycle.begin_init("test").unwrap();
        assert_eq!(lifecycle.take_for_destroy(), None);
        assert_eq!(lifecycle.finish_init(3), Err(3));
        lifecycle.fail_init();
        assert_eq!(lifecycle.name(), "destroyed");
    }

    #[test]
    fn test_destroy_transitions() {
        let mut lifecycle: Lifecycle<u8> = Lifecycle::Uninitialized;
        assert_eq!(lifecycle.take_for_destroy(), None);
        assert_eq!(lifecycle.name(), "uninitialized");

        lifecycle = Lifecycle::Ready(7);
        assert_eq!(lifecycle.ready(), Some(&7));
        assert_eq!(lifecycle.take_for_destroy(), Some(7));
        assert_eq!(lifecycle.name(), "destroyed");
        assert_eq!(lifecycle.ready(), None);
        assert!(lifecycle.begin_init("test").is_err());
    }
}
