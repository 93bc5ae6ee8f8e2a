//! Integration tests for rooms: session manager, table and dispatcher
//! together, driven through the registry's outbound queues.

use std::sync::Arc;
use std::time::Duration;

use roomrelay_room::{RoomDescription, RoomError, RoomTable, SessionManager};
use roomrelay_protocol::RoomId;
use roomrelay_session::{ConnectionRegistry, OutboundQueue, SessionConfig};
use roomrelay_transport::ConnectionId;

// =========================================================================
// Harness: a fake client is a connection id plus its outbound queue.
// =========================================================================

struct Client {
    id: ConnectionId,
    name: &'static str,
    queue: OutboundQueue,
}

impl Client {
    async fn connect(manager: &SessionManager, id: u64, name: &'static str) -> Self {
        let id = ConnectionId::new(id);
        let mut queue = manager.connection_opened(id).await.unwrap();
        let ack = next(&mut queue).await;
        assert!(ack.starts_with("ack,"), "{ack}");
        Self { id, name, queue }
    }

    fn user_json(&self) -> String {
        format!(r#""username":"{}","userId":"{}""#, self.name, self.id.into_inner())
    }

    async fn send(&self, manager: &SessionManager, frame: &str) -> Result<(), RoomError> {
        manager.handle_frame(self.id, frame).await
    }

    async fn hello(&mut self, manager: &SessionManager) {
        let frame = format!("roomHello,lobby,{{{},\"version\":2}}", self.user_json());
        self.send(manager, &frame).await.unwrap();
        assert!(self.next().await.contains(r#""type":"location""#));
        assert!(self.next().await.contains("Welcome!"));
    }

    async fn join(&mut self, manager: &SessionManager, room: &str) {
        let frame = format!("roomJoin,{room},{{{},\"version\":2}}", self.user_json());
        self.send(manager, &frame).await.unwrap();
        let location = self.next().await;
        assert!(location.contains(r#""type":"location""#), "{location}");
    }

    async fn part(&self, manager: &SessionManager, room: &str) {
        let frame = format!("roomPart,{room},{{{}}}", self.user_json());
        self.send(manager, &frame).await.unwrap();
    }

    async fn say(&self, manager: &SessionManager, room: &str, content: &str) -> Result<(), RoomError> {
        let frame = format!(
            "room,{room},{{{},\"content\":\"{content}\"}}",
            self.user_json()
        );
        self.send(manager, &frame).await
    }

    async fn next(&mut self) -> String {
        next(&mut self.queue).await
    }

    /// Asserts nothing further is queued.
    async fn assert_silent(&mut self) {
        let got = tokio::time::timeout(Duration::from_millis(30), self.queue.recv()).await;
        assert!(got.is_err(), "unexpected frame for {}: {:?}", self.name, got);
    }
}

async fn next(queue: &mut OutboundQueue) -> String {
    tokio::time::timeout(Duration::from_secs(1), queue.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("outbound queue closed")
}

fn manager_with_capacity(capacity: usize) -> SessionManager {
    SessionManager::with_text_codec(
        Arc::new(ConnectionRegistry::new(SessionConfig {
            outbound_queue_capacity: capacity,
        })),
        Arc::new(RoomTable::new()),
        RoomDescription::default(),
    )
}

fn manager() -> SessionManager {
    manager_with_capacity(256)
}

fn lobby() -> RoomId {
    RoomId::new("lobby")
}

// =========================================================================
// Identity
// =========================================================================

#[tokio::test]
async fn test_commands_before_hello_are_rejected() {
    let manager = manager();
    let mut a = Client::connect(&manager, 1, "a").await;

    let frames = [
        r#"roomJoin,lobby,{"username":"a","userId":"1","version":2}"#,
        r#"roomPart,lobby,{"username":"a","userId":"1"}"#,
        r#"room,lobby,{"username":"a","userId":"1","content":"hi"}"#,
        r#"roomGoodbye,lobby,{"username":"a","userId":"1"}"#,
    ];
    for frame in frames {
        let err = a.send(&manager, frame).await.unwrap_err();
        assert!(matches!(err, RoomError::NotHelloed { .. }), "{frame}: {err}");
        let reply = a.next().await;
        assert!(reply.contains(r#""code":"notHelloed""#), "{reply}");
    }

    assert_eq!(manager.table().room_count().await, 0);
    assert!(manager.registry().joined_rooms(a.id).await.is_empty());
}

#[tokio::test]
async fn test_goodbye_parts_everything_and_forgets_identity() {
    let manager = manager();
    let mut a = Client::connect(&manager, 1, "a").await;
    let mut b = Client::connect(&manager, 2, "b").await;
    a.hello(&manager).await;
    b.hello(&manager).await;
    a.join(&manager, "lobby").await;
    a.join(&manager, "attic").await;
    b.join(&manager, "attic").await;
    assert!(a.next().await.contains("b is here"));

    a.send(&manager, r#"roomGoodbye,lobby,{"username":"a","userId":"1"}"#)
        .await
        .unwrap();

    assert!(b.next().await.contains("a has gone"));
    assert!(a.next().await.contains(r#""1":"Bye!""#));
    assert!(!manager.table().exists(&lobby()).await);
    assert_eq!(
        manager.table().members_of(&RoomId::new("attic")).await,
        vec![b.id]
    );

    // Back to unidentified.
    let err = a.say(&manager, "attic", "still here?").await.unwrap_err();
    assert!(matches!(err, RoomError::NotHelloed { .. }));
}

// =========================================================================
// Membership
// =========================================================================

#[tokio::test]
async fn test_join_then_part_removes_member_and_room() {
    let manager = manager();
    let mut a = Client::connect(&manager, 1, "a").await;
    a.hello(&manager).await;
    a.join(&manager, "lobby").await;
    assert_eq!(manager.table().members_of(&lobby()).await, vec![a.id]);

    a.part(&manager, "lobby").await;

    assert!(manager.table().members_of(&lobby()).await.is_empty());
    assert!(!manager.table().exists(&lobby()).await);
    assert!(manager.registry().joined_rooms(a.id).await.is_empty());
    a.assert_silent().await;
}

#[tokio::test]
async fn test_part_of_unjoined_room_is_silent() {
    let manager = manager();
    let mut a = Client::connect(&manager, 1, "a").await;
    let mut b = Client::connect(&manager, 2, "b").await;
    a.hello(&manager).await;
    b.hello(&manager).await;
    b.join(&manager, "lobby").await;

    a.part(&manager, "lobby").await;
    a.part(&manager, "nowhere").await;

    a.assert_silent().await;
    b.assert_silent().await;
    assert_eq!(manager.table().members_of(&lobby()).await, vec![b.id]);
}

#[tokio::test]
async fn test_members_follow_last_membership_op() {
    let manager = manager();
    let mut clients = Vec::new();
    for (id, name) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
        let mut c = Client::connect(&manager, id, name).await;
        c.hello(&manager).await;
        clients.push(c);
    }

    for c in clients.iter_mut() {
        c.join(&manager, "lobby").await;
    }
    clients[1].part(&manager, "lobby").await;
    assert!(clients[3].next().await.contains("b has gone"));
    clients[3].part(&manager, "lobby").await;
    clients[3].join(&manager, "lobby").await;

    let ids: Vec<_> = [0, 2, 3].iter().map(|i| clients[*i].id).collect();
    assert_eq!(manager.table().members_of(&lobby()).await, ids);
    for i in [0, 2, 3] {
        assert_eq!(
            manager.registry().joined_rooms(clients[i].id).await,
            vec![lobby()]
        );
    }
    assert!(manager.registry().joined_rooms(clients[1].id).await.is_empty());
}

#[tokio::test]
async fn test_join_and_part_notify_others_only() {
    let manager = manager();
    let mut a = Client::connect(&manager, 1, "a").await;
    let mut b = Client::connect(&manager, 2, "b").await;
    a.hello(&manager).await;
    b.hello(&manager).await;

    a.join(&manager, "lobby").await;
    a.assert_silent().await;

    b.join(&manager, "lobby").await;
    let notice = a.next().await;
    assert!(notice.starts_with(r#"player,*,{"type":"event","content":{"*":"b is here"}"#), "{notice}");
    b.assert_silent().await;

    b.part(&manager, "lobby").await;
    assert!(a.next().await.contains(r#""*":"b has gone""#));
    b.assert_silent().await;
}

#[tokio::test]
async fn test_rejoin_sends_no_second_notice() {
    let manager = manager();
    let mut a = Client::connect(&manager, 1, "a").await;
    let mut b = Client::connect(&manager, 2, "b").await;
    a.hello(&manager).await;
    b.hello(&manager).await;
    a.join(&manager, "lobby").await;
    b.join(&manager, "lobby").await;
    a.next().await;

    b.join(&manager, "lobby").await;

    a.assert_silent().await;
    assert_eq!(manager.table().members_of(&lobby()).await, vec![a.id, b.id]);
}

// =========================================================================
// Messages
// =========================================================================

#[tokio::test]
async fn test_hi_example_reaches_sender() {
    let manager = manager();
    let mut u = Client::connect(&manager, 1, "u1").await;
    u.send(&manager, r#"roomHello,lobby,{"username":"u1","userId":"1","version":2}"#)
        .await
        .unwrap();
    u.next().await;
    u.next().await;
    u.send(&manager, r#"roomJoin,lobby,{"username":"u1","userId":"1","version":2}"#)
        .await
        .unwrap();
    u.next().await;

    u.send(&manager, r#"room,lobby,{"username":"u1","userId":"1","content":"hi"}"#)
        .await
        .unwrap();

    let frame = u.next().await;
    assert!(frame.contains(r#""content":"hi""#), "{frame}");
    assert!(frame.contains(r#""username":"u1""#), "{frame}");
}

#[tokio::test]
async fn test_message_delivered_once_to_every_member() {
    let manager = manager();
    let mut a = Client::connect(&manager, 1, "a").await;
    let mut b = Client::connect(&manager, 2, "b").await;
    let mut c = Client::connect(&manager, 3, "c").await;
    for cl in [&mut a, &mut b, &mut c] {
        cl.hello(&manager).await;
    }
    a.join(&manager, "lobby").await;
    b.join(&manager, "lobby").await;
    c.join(&manager, "lobby").await;
    // join notices
    a.next().await;
    a.next().await;
    b.next().await;

    a.say(&manager, "lobby", "hello all").await.unwrap();

    for cl in [&mut a, &mut b, &mut c] {
        let frame = cl.next().await;
        assert!(frame.starts_with(r#"player,*,{"type":"chat""#), "{frame}");
        assert!(frame.contains(r#""content":"hello all""#), "{frame}");
        cl.assert_silent().await;
    }
}

#[tokio::test]
async fn test_message_to_unjoined_room_is_not_in_room() {
    let manager = manager();
    let mut a = Client::connect(&manager, 1, "a").await;
    let mut b = Client::connect(&manager, 2, "b").await;
    a.hello(&manager).await;
    b.hello(&manager).await;
    b.join(&manager, "lobby").await;

    for room in ["lobby", "nowhere"] {
        let err = a.say(&manager, room, "psst").await.unwrap_err();
        assert!(matches!(err, RoomError::NotInRoom(ref r) if r.as_str() == room));
        let reply = a.next().await;
        assert!(
            reply.starts_with(&format!(r#"error,{room},{{"type":"error","code":"notInRoom""#)),
            "{reply}"
        );
    }
    b.assert_silent().await;
}

#[tokio::test]
async fn test_slash_commands_answer_sender_only() {
    let manager = manager();
    let mut a = Client::connect(&manager, 1, "a").await;
    let mut b = Client::connect(&manager, 2, "b").await;
    a.hello(&manager).await;
    b.hello(&manager).await;
    b.join(&manager, "lobby").await;
    a.join(&manager, "lobby").await;
    b.next().await;

    a.say(&manager, "lobby", "/look").await.unwrap();
    let look = a.next().await;
    assert!(look.starts_with(r#"player,1,{"type":"location","name":"lobby""#), "{look}");

    a.say(&manager, "lobby", "/go north").await.unwrap();
    assert_eq!(
        a.next().await,
        r#"playerLocation,1,{"type":"exit","content":"You head north","exitId":"n"}"#
    );

    a.say(&manager, "lobby", "/dance").await.unwrap();
    assert!(a.next().await.contains("This room is a basic model. It doesn't understand `/dance`"));

    a.say(&manager, "lobby", "/go sideways").await.unwrap();
    assert!(a.next().await.contains("There isn't a door in that direction (sideways)"));

    a.say(&manager, "lobby", "/go north quickly").await.unwrap();
    assert!(a.next().await.contains("There isn't a door in that direction (north quickly)"));

    a.say(&manager, "lobby", "/go").await.unwrap();
    assert!(a.next().await.contains("You didn't say which way you wanted to go."));

    a.say(&manager, "lobby", "/look at the window").await.unwrap();
    assert!(a.next().await.contains(r#""1":"It doesn't look interesting""#));

    a.say(&manager, "lobby", "/use a sock").await.unwrap();
    assert!(a.next().await.contains("You have no idea how to use that"));

    a.say(&manager, "lobby", "/use book").await.unwrap();
    let exit = a.next().await;
    assert!(exit.starts_with(r#"playerLocation,1,{"type":"exit""#), "{exit}");
    assert!(exit.contains(r#""exitId":"w""#), "{exit}");

    a.say(&manager, "lobby", "/about").await.unwrap();
    a.assert_silent().await;
    b.assert_silent().await;
}

#[tokio::test]
async fn test_leading_space_slash_is_chat() {
    let manager = manager();
    let mut a = Client::connect(&manager, 1, "a").await;
    a.hello(&manager).await;
    a.join(&manager, "lobby").await;

    a.say(&manager, "lobby", "  /look").await.unwrap();
    let chat = a.next().await;
    assert!(chat.starts_with(r#"player,*,{"type":"chat""#), "{chat}");
    assert!(chat.contains(r#""content":"  /look""#), "{chat}");
}

#[tokio::test]
async fn test_item_reactions_reach_the_whole_room() {
    let manager = manager();
    let mut a = Client::connect(&manager, 1, "ann").await;
    let mut b = Client::connect(&manager, 2, "bob").await;
    a.hello(&manager).await;
    b.hello(&manager).await;
    b.join(&manager, "lobby").await;
    a.join(&manager, "lobby").await;
    b.next().await;

    a.say(&manager, "lobby", "/use the mud").await.unwrap();
    for client in [&mut a, &mut b] {
        let frame = client.next().await;
        assert!(
            frame.starts_with(r#"player,*,{"type":"event","content":{"*":"ann has very dirty hands.","1":"You pat"#),
            "{frame}"
        );
    }

    b.say(&manager, "lobby", "/look teddy").await.unwrap();
    for client in [&mut a, &mut b] {
        let frame = client.next().await;
        assert!(
            frame.starts_with(r#"player,*,{"type":"event","content":{"*":"The teddy bear burps, 'Hello'"}"#),
            "{frame}"
        );
    }

    a.assert_silent().await;
    b.assert_silent().await;
}

#[tokio::test]
async fn test_unstocked_items_do_not_react() {
    let description = RoomDescription {
        inventory: vec!["a chair".into()],
        ..RoomDescription::default()
    };
    let manager = SessionManager::with_text_codec(
        Arc::new(ConnectionRegistry::default()),
        Arc::new(RoomTable::new()),
        description,
    );
    let mut a = Client::connect(&manager, 1, "ann").await;
    a.hello(&manager).await;
    a.join(&manager, "lobby").await;

    a.say(&manager, "lobby", "/use teddy").await.unwrap();
    assert!(a.next().await.contains(r#""1":"You have no idea how to use that""#));

    a.say(&manager, "lobby", "/look").await.unwrap();
    let location = a.next().await;
    assert!(location.contains(r#""roomInventory":["a chair"]"#), "{location}");
}

// =========================================================================
// Delivery under failure
// =========================================================================

#[tokio::test]
async fn test_closed_member_does_not_block_broadcast() {
    let manager = manager();
    let mut a = Client::connect(&manager, 1, "a").await;
    let mut b = Client::connect(&manager, 2, "b").await;
    let mut c = Client::connect(&manager, 3, "c").await;
    for cl in [&mut a, &mut b, &mut c] {
        cl.hello(&manager).await;
        cl.join(&manager, "lobby").await;
    }
    a.next().await;
    a.next().await;
    b.next().await;

    // B's writer is gone, but its close cascade has not run yet.
    let Client { id: b_id, queue, .. } = b;
    drop(queue);

    a.say(&manager, "lobby", "anyone?").await.unwrap();

    assert!(a.next().await.contains("anyone?"));
    assert!(c.next().await.contains("anyone?"));

    manager.connection_closed(b_id).await;
    assert!(a.next().await.contains("b has gone"));
    assert!(c.next().await.contains("b has gone"));
    assert_eq!(manager.table().members_of(&lobby()).await, vec![a.id, c.id]);
}

#[tokio::test]
async fn test_slow_member_is_evicted_others_unaffected() {
    let manager = manager_with_capacity(8);
    let mut a = Client::connect(&manager, 1, "a").await;
    let mut slow = Client::connect(&manager, 2, "slow").await;
    a.hello(&manager).await;
    slow.hello(&manager).await;
    a.join(&manager, "lobby").await;
    slow.join(&manager, "lobby").await;
    a.next().await;

    for i in 0..20 {
        a.say(&manager, "lobby", &format!("m{i}")).await.unwrap();
        let frame = a.next().await;
        assert!(frame.contains(&format!(r#""content":"m{i}""#)), "{frame}");
    }

    // The slow reader gets what fit, then its queue is closed.
    let mut received = 0;
    while let Some(_frame) = slow.queue.recv().await {
        received += 1;
    }
    assert_eq!(received, 8);

    manager.connection_closed(slow.id).await;
    assert!(a.next().await.contains("slow has gone"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_members_see_room_frames_in_same_order() {
    let manager = Arc::new(manager_with_capacity(1024));
    let mut clients = Vec::new();
    for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
        let mut c = Client::connect(&manager, id, name).await;
        c.hello(&manager).await;
        c.join(&manager, "lobby").await;
        clients.push(c);
    }
    // Drain join notices: a saw b and c, b saw c.
    clients[0].next().await;
    clients[0].next().await;
    clients[1].next().await;

    let mut tasks = Vec::new();
    for (id, name) in [(1u64, "a"), (2, "b"), (3, "c")] {
        let manager = Arc::clone(&manager);
        tasks.push(tokio::spawn(async move {
            for i in 0..25 {
                let frame = format!(
                    r#"room,lobby,{{"username":"{name}","userId":"{id}","content":"{name}{i}"}}"#
                );
                manager
                    .handle_frame(ConnectionId::new(id), &frame)
                    .await
                    .unwrap();
            }
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }

    let mut sequences = Vec::new();
    for c in clients.iter_mut() {
        let mut seq = Vec::new();
        for _ in 0..75 {
            seq.push(c.next().await);
        }
        sequences.push(seq);
    }
    assert_eq!(sequences[0], sequences[1]);
    assert_eq!(sequences[1], sequences[2]);
}
