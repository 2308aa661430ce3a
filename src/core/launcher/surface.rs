//! 与外部 UI 协作的能力接口。
//!
//! 编排层不知道窗口是什么，只通过这些 trait 关闭/恢复交互、显示加载状态、
//! 上报批量进度。所有方法都必须是廉价且不会失败的。

use tracing::debug;

use super::cancel::CancelFlag;

/// 可以切换交互状态的 UI 对象
pub trait Interactable: Send + Sync {
    fn set_interactive(&self, enabled: bool);
}

/// 启动过程中的临时加载界面。
///
/// 实现方必须在 `close()`（不论是用户关闭还是代码关闭）时触发
/// 创建时拿到的取消标志。
pub trait LoadingSurface: Send + Sync {
    fn show(&self);
    fn set_status(&self, text: &str);
    fn close(&self);
}

/// 发起启动的上下文（例如主窗口）
pub trait OwnerContext: Send + Sync {
    /// 不支持交互切换的上下文返回 `None`
    fn interactable(&self) -> Option<&dyn Interactable> {
        None
    }

    /// 打开一个加载界面；关闭它会触发 `cancel`
    fn open_loading(&self, _cancel: CancelFlag) -> Option<Box<dyn LoadingSurface>> {
        None
    }
}

/// 什么都不做的上下文（无界面调用）
#[derive(Debug, Default, Clone, Copy)]
pub struct Headless;

impl OwnerContext for Headless {}

pub(crate) fn toggle_interactivity(owner: &dyn OwnerContext, enabled: bool) {
    match owner.interactable() {
        Some(target) => target.set_interactive(enabled),
        None => debug!(enabled, "上下文不支持交互切换，忽略"),
    }
}

/// 批量启动的进度观察者
pub trait GroupProgress: Send + Sync {
    /// `index` 从 1 开始
    fn on_progress(&self, group: &str, profile_name: &str, index: usize, total: usize);

    fn on_finished(&self, _group: &str, _report: &super::group::GroupReport) {}
}

/// 批量启动期间包装外层上下文：屏蔽单个启动的交互切换，保留加载界面
pub(crate) struct BatchOwner<'a> {
    pub(crate) outer: &'a dyn OwnerContext,
}

impl OwnerContext for BatchOwner<'_> {
    fn interactable(&self) -> Option<&dyn Interactable> {
        None
    }

    fn open_loading(&self, cancel: CancelFlag) -> Option<Box<dyn LoadingSurface>> {
        self.outer.open_loading(cancel)
    }
}
