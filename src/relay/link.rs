// author: kodeholic (powered by Claude)
// RelayLink: 클라이언트 측 릴레이 채널 (tokio-tungstenite)
//
// 구조:
//   [writer] RelayTx(ClientEnvelope) → JSON text → WS
//   [reader] WS → JSON text → ServerEnvelope → RelayEvent::Message
//
// 이벤트 순서 보장: Open 먼저, Close는 마지막에 정확히 1번
// 해석 불가 프레임은 로그만 남기고 건너뜀

use std::sync::Arc;

use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use crate::config;
use crate::core::RelayTx;
use crate::error::{RtcError, RtcResult};
use crate::protocol::{ClientEnvelope, ServerEnvelope};

#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Open,
    Message(ServerEnvelope),
    Close,
}

pub struct RelayLink {
    tx:       RelayTx,
    events:   mpsc::Receiver<RelayEvent>,
    shutdown: Arc<Notify>,
}

/// 다른 태스크에서 채널을 닫기 위한 핸들 (세션 leave)
#[derive(Clone)]
pub struct RelayCloser {
    shutdown: Arc<Notify>,
}

impl RelayCloser {
    pub fn close(&self) {
        self.shutdown.notify_one();
    }
}

impl RelayLink {
    pub fn sender(&self) -> RelayTx {
        self.tx.clone()
    }

    pub async fn next_event(&mut self) -> Option<RelayEvent> {
        self.events.recv().await
    }

    pub fn closer(&self) -> RelayCloser {
        RelayCloser { shutdown: Arc::clone(&self.shutdown) }
    }

    /// Close 프레임 송신 후 writer 종료: reader는 서버의 Close로 끝남
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

pub async fn connect(url: &str) -> RtcResult<RelayLink> {
    let (ws, _resp) = connect_async(url)
        .await
        .map_err(|e| RtcError::Transport(e.to_string()))?;
    info!("[relay-link] connected to {}", url);

    let (mut sink, mut stream) = ws.split();
    let (out_tx, mut out_rx)  = mpsc::channel::<ClientEnvelope>(config::RELAY_QUEUE_SIZE);
    let (event_tx, event_rx)  = mpsc::channel::<RelayEvent>(config::RELAY_QUEUE_SIZE);
    let shutdown = Arc::new(Notify::new());

    event_tx.send(RelayEvent::Open).await.map_err(|_| RtcError::RelayClosed)?;

    // [writer]
    let stop = Arc::clone(&shutdown);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                next = out_rx.recv() => {
                    let Some(env) = next else { break };
                    let json = match serde_json::to_string(&env) {
                        Ok(j)  => j,
                        Err(e) => { warn!("[relay-link] encode failed: {}", e); continue; }
                    };
                    trace!("[relay-link] → {}", json);
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                _ = stop.notified() => {
                    debug!("[relay-link] shutdown requested");
                    break;
                }
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    // [reader]
    tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            let text = match msg {
                Ok(Message::Text(t))  => t,
                Ok(Message::Close(_)) => break,
                Err(e) => { warn!("[relay-link] ws error: {}", e); break; }
                _ => continue,
            };
            match serde_json::from_str::<ServerEnvelope>(text.as_str()) {
                Ok(env) => {
                    if event_tx.send(RelayEvent::Message(env)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("[relay-link] unparseable frame skipped: {}", e),
            }
        }
        let _ = event_tx.send(RelayEvent::Close).await;
        debug!("[relay-link] reader finished");
    });

    Ok(RelayLink { tx: out_tx, events: event_rx, shutdown })
}
