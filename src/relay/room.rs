// author: kodeholic (powered by Claude)
// RoomHub: 룸 코드별 멤버 관리 + 라우팅 테이블
//
// 입장 시 {id} → {peers} 인사를 egress 큐에 먼저 넣고 나서 멤버로 등록
// (같은 write lock 안: 다른 멤버의 전달 메시지가 인사보다 앞설 수 없음)
// 마지막 멤버가 나가면 룸 자체를 제거

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::config;
use crate::error::{RtcError, RtcResult};
use crate::protocol::{Participant, ParticipantId, ServerEnvelope, ServerMessage};
use crate::utils::current_timestamp;

/// 멤버 송신 큐 (직렬화된 ServerEnvelope JSON)
pub type EgressTx = mpsc::Sender<String>;

// ----------------------------------------------------------------------------
// [Member] WS 연결 1개
// ----------------------------------------------------------------------------

pub struct Member {
    pub id:        ParticipantId,
    pub tx:        EgressTx,
    pub joined_at: u64,
    name:          RwLock<String>,
}

impl Member {
    pub fn new(id: ParticipantId, tx: EgressTx) -> Self {
        Self {
            id,
            tx,
            joined_at: current_timestamp(),
            name:      RwLock::new(String::new()),
        }
    }

    pub fn name(&self) -> String {
        self.name.read().unwrap().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.write().unwrap() = name.to_string();
    }

    pub fn participant(&self) -> Participant {
        Participant::new(self.id, self.name())
    }
}

// ----------------------------------------------------------------------------
// [Room]
// ----------------------------------------------------------------------------

pub struct Room {
    pub code:       String,
    pub capacity:   usize,
    pub created_at: u64,
    members:        RwLock<HashMap<ParticipantId, Arc<Member>>>,
}

impl Room {
    pub fn new(code: &str, capacity: usize) -> Self {
        trace!("Creating room: {}", code);
        Self {
            code:       code.to_string(),
            capacity,
            created_at: current_timestamp(),
            members:    RwLock::new(HashMap::new()),
        }
    }

    /// 정원 확인 → 인사({id}, {peers}) 적재 → 등록
    /// 반환: 입장 시점의 다른 멤버 목록
    pub fn admit(&self, member: Arc<Member>) -> RtcResult<Vec<Participant>> {
        let mut members = self.members.write().unwrap();
        if members.len() >= self.capacity {
            warn!("[relay] room {} full, member {} rejected", self.code, member.id);
            return Err(RtcError::RoomFull(self.code.clone()));
        }

        let mut others: Vec<Participant> = members.values().map(|m| m.participant()).collect();
        others.sort_by_key(|p| p.id);

        let greeting = [
            ServerEnvelope::relay(ServerMessage::Id(member.id)),
            ServerEnvelope::relay(ServerMessage::Peers(others.clone())),
        ];
        for env in &greeting {
            let json = serde_json::to_string(env)?;
            member.tx.try_send(json)
                .map_err(|e| RtcError::InternalError(format!("greeting not queued: {}", e)))?;
        }

        members.insert(member.id, member);
        Ok(others)
    }

    pub fn remove(&self, id: ParticipantId) -> Option<Arc<Member>> {
        self.members.write().unwrap().remove(&id)
    }

    pub fn member(&self, id: ParticipantId) -> Option<Arc<Member>> {
        self.members.read().unwrap().get(&id).cloned()
    }

    pub fn member_count(&self) -> usize {
        self.members.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().unwrap().is_empty()
    }

    pub fn participants(&self) -> Vec<Participant> {
        let mut list: Vec<Participant> = self.members.read().unwrap()
            .values()
            .map(|m| m.participant())
            .collect();
        list.sort_by_key(|p| p.id);
        list
    }

    /// 특정 멤버에게 전송: 대상이 없거나 큐가 닫혔으면 false
    pub async fn send_to(&self, id: ParticipantId, json: String) -> bool {
        let Some(member) = self.member(id) else { return false };
        member.tx.send(json).await.is_ok()
    }

    /// exclude를 뺀 전원에게 전송
    pub async fn broadcast(&self, json: &str, exclude: Option<ParticipantId>) {
        let targets: Vec<Arc<Member>> = self.members.read().unwrap()
            .values()
            .filter(|m| Some(m.id) != exclude)
            .cloned()
            .collect();

        for member in targets {
            if member.tx.send(json.to_string()).await.is_err() {
                warn!("[relay] broadcast to {} failed: rx closed", member.id);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// [RoomHub]
// ----------------------------------------------------------------------------

pub struct RoomHub {
    rooms:   RwLock<HashMap<String, Arc<Room>>>,
    next_id: AtomicU32,
}

impl RoomHub {
    pub fn new() -> Self {
        trace!("Initializing RoomHub");
        Self {
            rooms:   RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// 프로세스 전체에서 유일한 participant id
    pub fn next_participant_id(&self) -> ParticipantId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms.read().unwrap().get(code).cloned()
    }

    /// 룸이 없으면 만들고 입장: 빈 룸 제거(leave)와 같은 lock 아래에서 수행
    pub fn join(&self, code: &str, member: Arc<Member>) -> RtcResult<(Arc<Room>, Vec<Participant>)> {
        let mut rooms = self.rooms.write().unwrap();
        let room = Arc::clone(rooms.entry(code.to_string()).or_insert_with(|| {
            Arc::new(Room::new(code, config::MAX_PEERS_PER_ROOM))
        }));
        let others = room.admit(member)?;
        Ok((room, others))
    }

    /// 멤버 제거: 룸이 비면 룸도 제거. 제거된 멤버 반환
    pub fn leave(&self, code: &str, id: ParticipantId) -> Option<Arc<Member>> {
        let mut rooms = self.rooms.write().unwrap();
        let room = rooms.get(code)?;
        let removed = room.remove(id);
        if room.is_empty() {
            rooms.remove(code);
            trace!("Room {} removed (empty)", code);
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.rooms.read().unwrap().len()
    }

    pub fn member_count(&self) -> usize {
        self.rooms.read().unwrap().values().map(|r| r.member_count()).sum()
    }

    pub fn all_rooms(&self) -> Vec<Arc<Room>> {
        self.rooms.read().unwrap().values().cloned().collect()
    }
}
