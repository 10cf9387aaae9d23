// author: kodeholic (powered by Claude)
// RosterManager: participant id ↔ 표시 이름 테이블
//
// 릴레이 시점과 최종적으로만 일치 (eventual). peers 스냅샷과 개별 join/leave
// 사이 순서 보장 없음: 같은 id에 대해 나중에 온 통지가 스냅샷을 덮어씀.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, trace};

use crate::capability::Presentation;
use crate::protocol::{Participant, ParticipantId};
use crate::utils::participant_of_track;

pub struct RosterManager {
    entries:      RwLock<HashMap<ParticipantId, String>>,
    presentation: Arc<dyn Presentation>,
}

impl RosterManager {
    pub fn new(presentation: Arc<dyn Presentation>) -> Self {
        trace!("Initializing RosterManager");
        Self {
            entries: RwLock::new(HashMap::new()),
            presentation,
        }
    }

    /// 세션 시작 시 peers 스냅샷으로 통째 교체
    pub fn replace_all(&self, participants: &[Participant]) {
        let mut entries = self.entries.write().unwrap();
        entries.clear();
        for p in participants {
            entries.insert(p.id, p.name.clone());
        }
        debug!("[roster] snapshot applied ({} participants)", entries.len());
    }

    /// peerJoined: 이미 있으면 이름 갱신
    pub fn add(&self, participant: &Participant) {
        let prev = self.entries.write().unwrap().insert(participant.id, participant.name.clone());
        match prev {
            Some(old) => debug!("[roster] id={} renamed '{}' → '{}'", participant.id, old, participant.name),
            None      => debug!("[roster] id={} joined as '{}'", participant.id, participant.name),
        }
    }

    /// peerLeft: 모르는 id여도 detach는 항상 수행
    /// (roster 메타데이터와 무관하게 화면 표면이 있을 수 있음)
    pub fn remove(&self, id: ParticipantId) {
        let removed = self.entries.write().unwrap().remove(&id);
        if removed.is_none() {
            trace!("[roster] id={} not in roster", id);
        }
        self.presentation.detach_surface(id);
        debug!("[roster] id={} removed", id);
    }

    /// 트랙 식별자 → 표시 이름. None이면 호출자는 익명으로 표시
    pub fn resolve_name(&self, track_id: &str) -> Option<String> {
        let id = participant_of_track(track_id)?;
        self.get(id)
    }

    pub fn get(&self, id: ParticipantId) -> Option<String> {
        self.entries.read().unwrap().get(&id).cloned()
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    pub fn count(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// id 순 정렬된 스냅샷
    pub fn all(&self) -> Vec<Participant> {
        let mut list: Vec<Participant> = self.entries.read().unwrap()
            .iter()
            .map(|(id, name)| Participant::new(*id, name.clone()))
            .collect();
        list.sort_by_key(|p| p.id);
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::mock::{RecordingPresentation, SurfaceCall};

    fn roster() -> (RosterManager, Arc<RecordingPresentation>) {
        let presentation = RecordingPresentation::new();
        let roster = RosterManager::new(Arc::clone(&presentation) as Arc<dyn Presentation>);
        (roster, presentation)
    }

    #[test]
    fn replace_all_discards_previous_entries() {
        let (roster, _) = roster();
        roster.add(&Participant::new(1, "old"));
        roster.replace_all(&[Participant::new(2, "bob"), Participant::new(3, "carol")]);

        assert_eq!(roster.count(), 2);
        assert!(roster.get(1).is_none());
        assert_eq!(roster.get(3).as_deref(), Some("carol"));
    }

    #[test]
    fn later_join_supersedes_snapshot() {
        let (roster, _) = roster();
        roster.replace_all(&[Participant::new(5, "")]);
        roster.add(&Participant::new(5, "eve"));
        assert_eq!(roster.get(5).as_deref(), Some("eve"));
        assert_eq!(roster.count(), 1);
    }

    #[test]
    fn remove_known_detaches_surface() {
        let (roster, presentation) = roster();
        roster.add(&Participant::new(4, "dave"));
        roster.remove(4);

        assert_eq!(roster.count(), 0);
        assert_eq!(presentation.calls(), vec![SurfaceCall::Detach(4)]);
    }

    #[test]
    fn remove_unknown_is_harmless_and_still_detaches() {
        let (roster, presentation) = roster();
        roster.add(&Participant::new(1, "alice"));

        roster.remove(7);
        roster.remove(7);

        assert_eq!(roster.count(), 1);
        assert_eq!(presentation.detached(), vec![7, 7]);
    }

    #[test]
    fn resolve_name_follows_track_binding() {
        let (roster, _) = roster();
        roster.add(&Participant::new(7, "grace"));

        assert_eq!(roster.resolve_name("7-video").as_deref(), Some("grace"));
        assert_eq!(roster.resolve_name("8-video"), None);
        assert_eq!(roster.resolve_name("camera"), None);
    }

    #[test]
    fn all_is_sorted_by_id() {
        let (roster, _) = roster();
        roster.add(&Participant::new(9, "i"));
        roster.add(&Participant::new(2, "b"));
        let ids: Vec<_> = roster.all().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 9]);

        roster.clear();
        assert!(roster.all().is_empty());
    }
}
