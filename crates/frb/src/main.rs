use std::sync::Arc;

use teloxide::Bot;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use frb_core::{
    auth::SessionManager,
    config::Config,
    domain::ChatId,
    extract::PageEnricher,
    known::KnownEntries,
    pipeline::NotificationPipeline,
    poller::FeedPoller,
    registry::SubscriberRegistry,
    state::StateStore,
};
use frb_telegram::{
    router::{self, AppState},
    TelegramNotifier,
};

#[tokio::main]
async fn main() -> Result<(), frb_core::Error> {
    frb_core::logging::init("frb")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        feed = %cfg.feed_url,
        auth = ?cfg.auth_method,
        interval_secs = cfg.check_interval.as_secs(),
        delay_secs = cfg.notification_delay.as_secs(),
        "starting feed relay bot"
    );

    // Initial login (cookie mode) happens here; a feed origin we cannot
    // authenticate against is not worth starting up for.
    let session = Arc::new(SessionManager::connect(&cfg).await?);

    let (store, persisted) = StateStore::open(cfg.state_file.clone())?;
    let store = Arc::new(store);
    tracing::info!(
        known = persisted.known_entries.len(),
        chats = persisted.chat_ids.len(),
        last_check = %persisted.last_check_time,
        "state loaded"
    );

    let known = Arc::new(KnownEntries::seeded(persisted.known_entries));
    let registry = Arc::new(SubscriberRegistry::seeded(
        persisted.chat_ids.into_iter().map(ChatId),
    ));

    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let notifier = Arc::new(TelegramNotifier::new(bot.clone()));
    let enricher = Arc::new(PageEnricher::new(session.clone()));

    let (intake_tx, intake_rx) = mpsc::channel(cfg.notification_queue_size);
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received");
            cancel.cancel();
        });
    }

    let pipeline = NotificationPipeline::new(
        registry.clone(),
        enricher.clone(),
        notifier.clone(),
        cfg.notification_delay,
    );
    tokio::spawn(pipeline.run(intake_rx, cancel.clone()));

    let poller = FeedPoller::new(
        session.clone(),
        known.clone(),
        registry.clone(),
        store.clone(),
        intake_tx,
        cfg.feed_url.clone(),
        cfg.check_interval,
    );
    {
        let cancel = cancel.clone();
        tokio::spawn(async move { poller.run(cancel).await });
    }

    let state = Arc::new(AppState {
        cfg,
        session,
        known,
        registry,
        store,
        notifier,
        enricher,
    });

    router::run_polling(bot, state, cancel)
        .await
        .map_err(|e| frb_core::Error::Delivery(format!("telegram bot failed: {e}")))?;

    tracing::info!("bot stopped");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(_) => {
            let _ = ctrl_c.await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
