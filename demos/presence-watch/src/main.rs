//! Logs voice channel membership as it changes.
//!
//! ```text
//! WAVEGATE_TOKEN=... RUST_LOG=info cargo run -p presence-watch
//! ```
//!
//! Post `!who` in a text channel to get the list of people in voice.

use serde_json::json;
use tracing_subscriber::EnvFilter;
use wavegate::prelude::*;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn on_ready(_ctx: Context, event: Event) {
    if let Event::Ready(ready) = event {
        tracing::info!(me = %ready.user.id, session = %ready.session_id, "connected");
    }
}

async fn on_snapshot(ctx: Context, event: Event) {
    let Event::RoomSnapshot(snapshot) = event else { return };
    match ctx.cache().room_participants(&snapshot.id).await {
        Ok(records) => tracing::info!(room = %snapshot.id, in_voice = records.len(), "room loaded"),
        Err(e) => tracing::warn!(error = %e, "room missing after snapshot"),
    }
}

async fn on_participant(ctx: Context, event: Event) {
    let Event::ParticipantUpdate(state) = event else { return };
    let Some(room) = state.guild_id else { return };

    match state.channel_id {
        Some(channel) => {
            let members = ctx
                .cache()
                .channel_members(&room, &channel)
                .await
                .unwrap_or_default();
            tracing::info!(
                %room,
                %channel,
                participant = %state.user_id,
                members = members.len(),
                "joined or moved"
            );
        }
        None => tracing::info!(%room, participant = %state.user_id, "left voice"),
    }
}

async fn on_message(ctx: Context, event: Event) {
    let Event::MessageReceived(message) = event else { return };
    if message.content.trim() != "!who" {
        return;
    }
    let Some(room) = message.guild_id else { return };

    let records = ctx.cache().room_participants(&room).await.unwrap_or_default();
    let mut lines: Vec<String> = records
        .iter()
        .filter_map(|r| {
            r.channel_id
                .as_ref()
                .map(|channel| format!("<@{}> in <#{}>", r.participant_id, channel))
        })
        .collect();
    lines.sort();
    let content = if lines.is_empty() {
        "Nobody is in voice.".to_owned()
    } else {
        lines.join("\n")
    };

    let body = json!({ "content": content });
    if let Err(e) = ctx.rest().send_message(&message.channel_id, &body).await {
        tracing::warn!(error = %e, "reply failed");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env()?;
    let client = GatewayClient::builder(config)
        .on(EventKind::Ready, on_ready)
        .on(EventKind::RoomSnapshot, on_snapshot)
        .on(EventKind::ParticipantUpdate, on_participant)
        .on(EventKind::MessageReceived, on_message)
        .build()?;

    let handle = client.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down");
            handle.disconnect();
        }
    });

    client.run().await
}
