use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use super::frame::Inbound;
use super::session::Bridge;
use crate::engine::EngineHandle;

pub async fn handle_websocket(socket: WebSocket, bridge: Bridge, engine: EngineHandle) {
    let (session, mut outbound) = bridge.attach();
    info!("Browser connected (session {})", session);

    let (mut sender, mut receiver) = socket.split();

    // Frames from the browser: replies, pushes and host events
    let input_bridge = bridge.clone();
    let mut input_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<Inbound>(&text) {
                    Ok(frame) => {
                        debug!("Received frame: {:?}", frame);
                        input_bridge.dispatch(frame, &engine);
                    }
                    Err(e) => warn!("Ignoring malformed frame: {}", e),
                },
                Ok(Message::Close(_)) => {
                    info!("WebSocket connection closed by browser");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    // Frames to the browser
    let mut output_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                debug!("WebSocket sender closed");
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut input_task => {
            debug!("Input task completed");
            output_task.abort();
        }
        _ = &mut output_task => {
            debug!("Output task completed");
            input_task.abort();
        }
    }

    bridge.detach(session);
    info!("Browser disconnected (session {})", session);
}
