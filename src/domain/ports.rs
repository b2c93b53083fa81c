use crate::domain::model::{CommandOutput, CommandSpec};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 執行外部指令的介面；正式環境用真實行程，測試換成模擬主機
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// 執行指令並等待結束。非零結束碼不算錯誤，由呼叫端判斷；
    /// 只有無法啟動或逾時才回傳 `Err`
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

#[async_trait]
impl<T: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<T> {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        (**self).run(spec).await
    }
}
