use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio_util::sync::CancellationToken;

use frb_core::{
    auth::SessionManager, config::Config, known::KnownEntries, ports::Enricher,
    registry::SubscriberRegistry, state::StateStore,
};

use crate::handlers;
use crate::TelegramNotifier;

/// Everything the update handlers need, shared through dptree.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub session: Arc<SessionManager>,
    pub known: Arc<KnownEntries>,
    pub registry: Arc<SubscriberRegistry>,
    pub store: Arc<StateStore>,
    pub notifier: Arc<TelegramNotifier>,
    pub enricher: Arc<dyn Enricher>,
}

/// Long-poll Telegram updates until the process-wide cancellation fires.
pub async fn run_polling(
    bot: Bot,
    state: Arc<AppState>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    if let Ok(me) = bot.get_me().await {
        tracing::info!(username = me.username(), "connected to Telegram");
    }

    let handler = dptree::entry()
        .branch(Update::filter_my_chat_member().endpoint(handlers::handle_my_chat_member))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build();

    let shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        cancel.cancelled().await;
        if let Ok(fut) = shutdown.shutdown() {
            fut.await;
        }
    });

    dispatcher.dispatch().await;
    Ok(())
}
