pub mod config;
pub mod sender;
pub mod session;
pub mod statistics;

use std::sync::Arc;

use tokio::sync::mpsc::channel;
use tokio::task::JoinSet;

use self::{config::Config, session::Command, statistics::Statistics};

/// In order to let integration tests start the endpoint directly from
/// the crate, a function is opened to replace the main function.
pub async fn startup(config: Arc<Config>) -> anyhow::Result<()> {
    let statistics = Statistics::default();
    let (commands, receiver) = channel::<Command>(16);

    let mut workers = JoinSet::new();
    workers.spawn(session::start(config, statistics.clone(), receiver));

    // Forward ctrl-c as a leave command, then park so the session
    // worker is the one that decides when the set finishes.
    workers.spawn(async move {
        tokio::signal::ctrl_c().await?;
        let _ = commands.send(Command::Leave).await;
        std::future::pending::<()>().await;
        Ok(())
    });

    if let Some(res) = workers.join_next().await {
        workers.abort_all();

        return res?;
    }

    Ok(())
}
