//! A room: the membership set of one session plus its shared source snapshot.
//!
//! All state sits behind one mutex. The only work done while it is held is
//! bookkeeping and non-blocking enqueues onto per-client queues; socket writes
//! happen in each session's own write loop, and logging happens after the
//! guard is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use codeshare_types::{Event, UserEntry};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Identity of one connected client. Usernames may collide, ids never do.
pub type ClientId = Uuid;

/// One serialized event, shared by every recipient of a broadcast.
pub type Frame = Arc<str>;

/// Sending half of a client's bounded outbound queue.
pub type Outbox = mpsc::Sender<Frame>;

/// Receiving half of a client's bounded outbound queue.
pub type Inbox = mpsc::Receiver<Frame>;

/// Create a bounded outbound queue.
pub fn outbound_queue(capacity: usize) -> (Outbox, Inbox) {
    mpsc::channel(capacity.max(1))
}

struct Member {
    username: String,
    is_host: bool,
    joined: u64,
    outbox: Outbox,
}

#[derive(Default)]
struct RoomState {
    clients: HashMap<ClientId, Member>,
    current_source: Option<String>,
    host: Option<String>,
    next_join: u64,
}

/// What happened to one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients whose queue accepted the frame.
    pub delivered: usize,
    /// Clients removed because their queue was full or already closed.
    pub evicted: Vec<ClientId>,
}

pub struct Room {
    code: String,
    state: Mutex<RoomState>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("code", &self.code)
            .field("clients", &self.client_count())
            .finish()
    }
}

impl Room {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            state: Mutex::new(RoomState::default()),
        }
    }

    /// Create a room whose host is known up front.
    pub fn with_host(code: impl Into<String>, host: impl Into<String>) -> Self {
        let room = Self::new(code);
        room.lock().host = Some(host.into());
        room
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a client to the room.
    ///
    /// Returns `false` and leaves the room untouched when `id` is already a
    /// member. A new member whose username matches the recorded host is
    /// flagged as host; the first member of a hostless room claims it. If a
    /// source snapshot exists it is queued to the new member alone.
    pub fn register(&self, id: ClientId, username: &str, outbox: Outbox) -> bool {
        let mut state = self.lock();
        if state.clients.contains_key(&id) {
            return false;
        }

        let is_host = match &state.host {
            Some(host) => host == username,
            None => {
                state.host = Some(username.to_string());
                true
            }
        };

        if let Some(source) = &state.current_source {
            if let Ok(frame) = Event::code(source.clone()).encode() {
                // A fresh queue only rejects when its receiver is already gone.
                let _ = outbox.try_send(Frame::from(frame));
            }
        }

        let joined = state.next_join;
        state.next_join += 1;
        state.clients.insert(
            id,
            Member {
                username: username.to_string(),
                is_host,
                joined,
                outbox,
            },
        );
        drop(state);

        log::info!("Client registered: {} in room {}", username, self.code);
        true
    }

    /// Remove a client and close its outbound queue.
    ///
    /// Dropping the room's sender is the end-of-stream signal: the client's
    /// write loop sees the queue close once pending frames are drained.
    pub fn unregister(&self, id: ClientId) -> bool {
        let removed = self.lock().clients.remove(&id);
        match removed {
            Some(member) => {
                log::info!(
                    "Client unregistered: {} from room {}",
                    member.username,
                    self.code
                );
                true
            }
            None => false,
        }
    }

    /// Serialize `event` once and queue it to every member.
    pub fn broadcast(&self, event: &Event) -> BroadcastReport {
        match event.encode() {
            Ok(frame) => self.broadcast_frame(Frame::from(frame)),
            Err(e) => {
                log::error!("Error serializing {} event: {}", event.event_type(), e);
                BroadcastReport::default()
            }
        }
    }

    /// Queue an already serialized frame to every member.
    pub fn broadcast_frame(&self, frame: Frame) -> BroadcastReport {
        let mut state = self.lock();
        let (report, evicted) = deliver(&mut state, &frame);
        drop(state);
        self.log_evictions(&evicted);
        report
    }

    /// Replace the source snapshot and broadcast the frame that carried it,
    /// as one step with respect to concurrent joins.
    pub fn publish_source(&self, source: String, frame: Frame) -> BroadcastReport {
        let mut state = self.lock();
        state.current_source = Some(source);
        let (report, evicted) = deliver(&mut state, &frame);
        drop(state);
        self.log_evictions(&evicted);
        report
    }

    /// Broadcast the current membership as a `userList` event.
    ///
    /// The snapshot is taken and delivered under the same lock, so no member
    /// can join or leave between the list being computed and being queued.
    pub fn broadcast_user_list(&self) -> BroadcastReport {
        let mut state = self.lock();
        let users = snapshot_users(&state);
        let frame = match Event::user_list(users).encode() {
            Ok(frame) => Frame::from(frame),
            Err(e) => {
                drop(state);
                log::error!("Error serializing user list: {}", e);
                return BroadcastReport::default();
            }
        };
        let (report, evicted) = deliver(&mut state, &frame);
        drop(state);
        log::debug!(
            "Broadcast user list in room {} to {} clients",
            self.code,
            report.delivered
        );
        self.log_evictions(&evicted);
        report
    }

    /// Current membership, in join order.
    pub fn users(&self) -> Vec<UserEntry> {
        snapshot_users(&self.lock())
    }

    pub fn client_count(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.lock().clients.contains_key(&id)
    }

    pub fn current_source(&self) -> Option<String> {
        self.lock().current_source.clone()
    }

    pub fn host(&self) -> Option<String> {
        self.lock().host.clone()
    }

    fn log_evictions(&self, evicted: &[String]) {
        for username in evicted {
            log::warn!(
                "Dropped slow client {} from room {}: outbound queue full",
                username,
                self.code
            );
        }
    }
}

fn snapshot_users(state: &RoomState) -> Vec<UserEntry> {
    let mut members: Vec<&Member> = state.clients.values().collect();
    members.sort_by_key(|m| m.joined);
    members
        .into_iter()
        .map(|m| UserEntry::new(m.username.clone(), m.is_host))
        .collect()
}

/// Non-blocking fan-out. Members whose queue cannot take the frame are
/// removed, which drops their sender and closes their queue.
fn deliver(state: &mut RoomState, frame: &Frame) -> (BroadcastReport, Vec<String>) {
    let mut report = BroadcastReport::default();
    for (id, member) in state.clients.iter() {
        match member.outbox.try_send(frame.clone()) {
            Ok(()) => report.delivered += 1,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                report.evicted.push(*id)
            }
        }
    }

    let mut evicted_names = Vec::with_capacity(report.evicted.len());
    for id in &report.evicted {
        if let Some(member) = state.clients.remove(id) {
            evicted_names.push(member.username);
        }
    }
    (report, evicted_names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeshare_types::EventType;

    fn join(room: &Room, username: &str, capacity: usize) -> (ClientId, Inbox) {
        let (outbox, inbox) = outbound_queue(capacity);
        let id = Uuid::new_v4();
        assert!(room.register(id, username, outbox));
        (id, inbox)
    }

    fn drain(inbox: &mut Inbox) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(frame) = inbox.try_recv() {
            events.push(Event::decode(&frame).unwrap());
        }
        events
    }

    #[test]
    fn test_register_is_idempotent_per_client() {
        let room = Room::new("abc123");
        let (outbox, _inbox) = outbound_queue(4);
        let id = Uuid::new_v4();
        assert!(room.register(id, "alice", outbox.clone()));
        assert!(!room.register(id, "alice", outbox));
        assert_eq!(room.client_count(), 1);
    }

    #[test]
    fn test_client_count_tracks_register_and_unregister() {
        let room = Room::new("abc123");
        let mut live = Vec::new();
        for i in 0..10 {
            let (id, inbox) = join(&room, &format!("user{}", i), 4);
            live.push((id, inbox));
            assert_eq!(room.client_count(), live.len());
        }
        while let Some((id, _inbox)) = live.pop() {
            assert!(room.unregister(id));
            assert_eq!(room.client_count(), live.len());
        }
        // Absent client: safe no-op.
        assert!(!room.unregister(Uuid::new_v4()));
        assert_eq!(room.client_count(), 0);
    }

    #[test]
    fn test_unregister_closes_outbound_queue() {
        let room = Room::new("abc123");
        let (id, mut inbox) = join(&room, "alice", 4);
        room.broadcast(&Event::code("x = 1"));
        assert!(room.unregister(id));

        // Pending frame is still delivered, then end-of-stream.
        assert!(inbox.try_recv().is_ok());
        assert!(matches!(
            inbox.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_broadcast_reaches_every_member() {
        let room = Room::new("abc123");
        let (_a, mut inbox_a) = join(&room, "alice", 4);
        let (_b, mut inbox_b) = join(&room, "bob", 4);

        let report = room.broadcast(&Event::chat("alice", "hi"));
        assert_eq!(report.delivered, 2);
        assert!(report.evicted.is_empty());
        assert_eq!(drain(&mut inbox_a), vec![Event::chat("alice", "hi")]);
        assert_eq!(drain(&mut inbox_b), vec![Event::chat("alice", "hi")]);
    }

    #[test]
    fn test_full_queue_evicts_only_that_client() {
        let room = Room::new("abc123");
        let (fast, mut fast_inbox) = join(&room, "fast", 8);
        let (slow, mut slow_inbox) = join(&room, "slow", 1);

        let first = room.broadcast(&Event::code("v1"));
        assert_eq!(first.delivered, 2);

        // The slow client has not drained its single slot.
        let second = room.broadcast(&Event::code("v2"));
        assert_eq!(second.delivered, 1);
        assert_eq!(second.evicted, vec![slow]);
        assert!(room.contains(fast));
        assert!(!room.contains(slow));
        assert_eq!(room.client_count(), 1);

        assert_eq!(drain(&mut fast_inbox).len(), 2);
        // The slow client gets what fit, then end-of-stream.
        assert!(slow_inbox.try_recv().is_ok());
        assert!(matches!(
            slow_inbox.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_closed_queue_is_evicted() {
        let room = Room::new("abc123");
        let (gone, inbox) = join(&room, "gone", 4);
        drop(inbox);
        let report = room.broadcast(&Event::code("v1"));
        assert_eq!(report.delivered, 0);
        assert_eq!(report.evicted, vec![gone]);
        assert_eq!(room.client_count(), 0);
    }

    #[test]
    fn test_user_list_contains_exactly_the_members() {
        for order in [["alice", "bob"], ["bob", "alice"]] {
            let room = Room::new("abc123");
            let (_first, mut inbox) = join(&room, order[0], 4);
            let (_second, _inbox2) = join(&room, order[1], 4);

            let report = room.broadcast_user_list();
            assert_eq!(report.delivered, 2);

            let events = drain(&mut inbox);
            assert_eq!(events.len(), 1);
            match &events[0] {
                Event::UserList { content } => {
                    let mut names: Vec<&str> =
                        content.iter().map(|u| u.username.as_str()).collect();
                    names.sort();
                    assert_eq!(names, vec!["alice", "bob"]);
                }
                other => panic!("Expected userList, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_host_flag() {
        let room = Room::with_host("abc123", "carol");
        join(&room, "dave", 4);
        join(&room, "carol", 4);
        let users = room.users();
        assert_eq!(
            users,
            vec![UserEntry::new("dave", false), UserEntry::new("carol", true)]
        );

        let hostless = Room::new("zzz999");
        join(&hostless, "erin", 4);
        join(&hostless, "frank", 4);
        assert_eq!(hostless.host().as_deref(), Some("erin"));
        assert!(hostless.users()[0].is_host);
        assert!(!hostless.users()[1].is_host);
    }

    #[test]
    fn test_late_joiner_receives_source_snapshot() {
        let room = Room::new("abc123");
        let (_a, _inbox_a) = join(&room, "alice", 4);
        let frame = Event::code("print('hi')").encode().unwrap();
        room.publish_source("print('hi')".to_string(), Frame::from(frame));
        assert_eq!(room.current_source().as_deref(), Some("print('hi')"));

        let (_b, mut inbox_b) = join(&room, "bob", 4);
        let events = drain(&mut inbox_b);
        assert_eq!(events, vec![Event::code("print('hi')")]);
        assert_eq!(events[0].event_type(), EventType::Code);
    }

    #[test]
    fn test_publish_source_overwrites_snapshot() {
        let room = Room::new("abc123");
        room.publish_source("a".to_string(), Frame::from("{}"));
        room.publish_source("b".to_string(), Frame::from("{}"));
        assert_eq!(room.current_source().as_deref(), Some("b"));
    }

    #[test]
    fn test_frames_from_one_sender_arrive_in_order() {
        let room = Room::new("abc123");
        let (_r, mut inbox) = join(&room, "reader", 16);
        for i in 0..10 {
            room.broadcast(&Event::chat("writer", format!("{}", i)));
        }
        let contents: Vec<String> = drain(&mut inbox)
            .into_iter()
            .map(|e| match e {
                Event::Chat { content, .. } => content,
                other => panic!("Expected chat, got {:?}", other),
            })
            .collect();
        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(contents, expected);
    }
}
