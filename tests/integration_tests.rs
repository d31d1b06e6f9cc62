//! Integration tests for the room server and client session
//!
//! These tests validate cross-component interactions and real network behavior.

use assert_approx_eq::assert_approx_eq;
use bincode::{deserialize, serialize};
use client::replica::{Replica, ReplicaEvent};
use client::session::ClientSession;
use server::config::{RoomConfig, ServerConfig};
use server::network::{Server, ServerMessage};
use server::room::Room;
use server::sync::Outgoing;
use shared::{
    EntityPatch, EntityState, Input, InputPayload, Packet, SessionId, StateEvent, MAP_HEIGHT,
    MAP_WIDTH, PROTOCOL_VERSION,
};
use std::net::UdpSocket;
use std::time::{Duration, Instant};

const STEP: Duration = Duration::from_nanos(16_666_666);

fn seeded_room(seed: u64) -> Room {
    Room::new(RoomConfig {
        seed: Some(seed),
        ..RoomConfig::default()
    })
}

fn left() -> Input {
    Input {
        left: true,
        ..Input::default()
    }
}

/// Packets addressed to `id` from one flush.
fn packets_for(outgoing: &[Outgoing], id: SessionId) -> Vec<Packet> {
    outgoing
        .iter()
        .filter(|message| message.to == id)
        .map(|message| message.packet.clone())
        .collect()
}

/// Feeds sync packets into a replica the way a client does.
fn apply_all(replica: &mut Replica, packets: &[Packet]) -> Vec<ReplicaEvent> {
    let mut changes = Vec::new();
    for packet in packets {
        if let Packet::Sync {
            seq,
            tick,
            full,
            events,
        } = packet
        {
            changes.extend(replica.apply_sync(*seq, *tick, *full, events).unwrap());
        }
    }
    changes
}

/// SIMULATION TESTS
mod simulation_tests {
    use super::*;

    /// Spawn inside the map, five ticks of left input, leave.
    #[test]
    fn end_to_end_movement_scenario() {
        let mut room = seeded_room(11);
        let id = room.join().unwrap();

        let spawn = room.world().get(&id).unwrap().state;
        assert!(spawn.x >= 0.0 && spawn.x < MAP_WIDTH);
        assert!(spawn.y >= 0.0 && spawn.y < MAP_HEIGHT);

        for _ in 0..5 {
            assert!(room.enqueue_input(&id, left()));
            assert_eq!(room.update(STEP), 1);
        }

        let moved = room.world().get(&id).unwrap().state;
        assert_approx_eq!(moved.x, spawn.x - 10.0, 1e-3);
        assert_eq!(moved.y, spawn.y);

        assert!(room.leave(&id));
        room.update(STEP);
        assert!(room.collect_sync().is_empty());
        assert!(room
            .world()
            .snapshot_events()
            .iter()
            .all(|event| event.entity_id() != Some(id)));
    }

    /// Same inputs, different delta chunking, same result.
    #[test]
    fn chunked_deltas_are_associative() {
        let mut single = seeded_room(5);
        let mut split = seeded_room(5);
        let a = single.join().unwrap();
        let b = split.join().unwrap();

        for _ in 0..2 {
            single.enqueue_input(&a, left());
            split.enqueue_input(&b, left());
        }

        let steps_single = single.update(Duration::from_micros(33_400));
        let steps_split =
            split.update(Duration::from_micros(16_700)) + split.update(Duration::from_micros(16_700));

        assert_eq!(steps_single, 2);
        assert_eq!(steps_split, 2);
        assert_eq!(
            single.world().get(&a).unwrap().state,
            split.world().get(&b).unwrap().state
        );
    }

    /// Inputs queued between ticks are applied in full, oldest first.
    #[test]
    fn queued_inputs_are_not_coalesced() {
        let mut room = seeded_room(2);
        let id = room.join().unwrap();
        let start = room.world().get(&id).unwrap().state;

        room.enqueue_input(&id, left());
        room.enqueue_input(
            &id,
            Input {
                up: true,
                ..Input::default()
            },
        );
        room.enqueue_input(
            &id,
            Input {
                left: true,
                right: true,
                ..Input::default()
            },
        );
        room.fixed_tick();

        let end = room.world().get(&id).unwrap().state;
        assert_approx_eq!(end.x, start.x - 4.0, 1e-3);
        assert_approx_eq!(end.y, start.y - 2.0, 1e-3);
    }

    #[test]
    fn room_capacity_and_disposal() {
        let mut room = seeded_room(1);
        for _ in 0..4 {
            room.join().unwrap();
        }
        assert!(room.join().is_err());

        room.dispose();
        assert!(room.is_empty());
        assert_eq!(room.update(STEP * 10), 0);
        assert!(room.join().is_err());
    }
}

/// SYNCHRONIZATION TESTS
mod sync_tests {
    use super::*;

    /// A late joiner sees Add for every live entity before any Change.
    #[test]
    fn late_joiner_snapshot_before_delta() {
        let mut room = seeded_room(8);
        let e1 = room.join().unwrap();
        let e2 = room.join().unwrap();
        room.collect_sync();

        let late = room.join().unwrap();
        room.enqueue_input(&e1, left());
        room.update(STEP);
        let first = room.collect_sync();

        room.enqueue_input(&e1, left());
        room.update(STEP);
        let second = room.collect_sync();

        let mut replica = Replica::new();
        let mut packets = packets_for(&first, late);
        packets.extend(packets_for(&second, late));
        let changes = apply_all(&mut replica, &packets);

        let first_change = changes
            .iter()
            .position(|change| matches!(change, ReplicaEvent::Changed { id, .. } if *id == e1))
            .unwrap();
        for id in [e1, e2, late] {
            let added = changes
                .iter()
                .position(|change| matches!(change, ReplicaEvent::Added { id: added, .. } if *added == id))
                .unwrap();
            assert!(added < first_change);
        }

        let mirrored = replica.get(&e1).unwrap();
        let truth = room.world().get(&e1).unwrap().state;
        assert_eq!(*mirrored, truth);
    }

    /// No Change for an entity after its Remove.
    #[test]
    fn remove_then_no_change() {
        let mut room = seeded_room(4);
        let leaver = room.join().unwrap();
        let observer = room.join().unwrap();
        let mut replica = Replica::new();
        apply_all(&mut replica, &packets_for(&room.collect_sync(), observer));

        room.enqueue_input(&leaver, left());
        room.leave(&leaver);
        room.update(STEP);
        room.enqueue_input(&observer, left());
        room.update(STEP);

        let packets = packets_for(&room.collect_sync(), observer);
        let changes = apply_all(&mut replica, &packets);
        assert_eq!(
            changes
                .iter()
                .filter(|change| **change == ReplicaEvent::Removed { id: leaver })
                .count(),
            1
        );

        for packet in &packets {
            if let Packet::Sync { events, .. } = packet {
                assert!(!events.iter().any(|event| matches!(
                    event,
                    StateEvent::Change { id, .. } if *id == leaver
                )));
            }
        }
        assert!(replica.get(&leaver).is_none());
    }

    /// Lost packet: the replica asks for a resync and recovers from the
    /// next full snapshot.
    #[test]
    fn lost_packet_recovers_through_resync() {
        let mut room = seeded_room(6);
        let id = room.join().unwrap();
        let now = Instant::now();

        let mut session = ClientSession::default();
        session.start(now);
        session.handle_packet(Packet::Joined { session_id: id }, now);
        for packet in packets_for(&room.collect_sync(), id) {
            session.handle_packet(packet, now);
        }

        room.enqueue_input(&id, left());
        room.update(STEP);
        let _lost = room.collect_sync();

        room.enqueue_input(&id, left());
        room.update(STEP);
        let mut replies = Vec::new();
        for packet in packets_for(&room.collect_sync(), id) {
            replies.extend(session.handle_packet(packet, now));
        }
        assert_eq!(replies, vec![Packet::Resync]);

        assert!(room.request_resync(&id));
        for packet in packets_for(&room.collect_sync(), id) {
            assert!(session.handle_packet(packet, now).is_empty());
        }

        assert!(session.replica().is_synced());
        assert_eq!(
            *session.replica().get(&id).unwrap(),
            room.world().get(&id).unwrap().state
        );
        assert_eq!(session.game().ghost(), {
            let state = room.world().get(&id).unwrap().state;
            Some((state.x, state.y))
        });
    }
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests packet serialization round-trip for network protocol validation
    #[tokio::test]
    async fn packet_serialization_roundtrip() {
        let test_packets = vec![
            Packet::Join {
                client_version: PROTOCOL_VERSION,
            },
            Packet::Input(left().into()),
            Packet::Message {
                channel: "type".to_string(),
                body: "hello".to_string(),
            },
            Packet::Joined {
                session_id: SessionId(3),
            },
            Packet::Sync {
                seq: 2,
                tick: 40,
                full: false,
                events: vec![StateEvent::Change {
                    id: SessionId(3),
                    patch: EntityPatch {
                        x: None,
                        y: Some(12.0),
                    },
                }],
            },
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            let deserialized: Packet = deserialize(&serialized).unwrap();
            assert_eq!(deserialized, packet);
        }
    }

    /// Input with missing flags moves like the flags that are present.
    #[test]
    fn partial_input_payload() {
        let mut room = seeded_room(9);
        let id = room.join().unwrap();
        let start = room.world().get(&id).unwrap().state;

        let payload = InputPayload {
            left: Some(true),
            ..InputPayload::default()
        };
        room.enqueue_input(&id, payload.into());
        room.fixed_tick();

        let end = room.world().get(&id).unwrap().state;
        assert_approx_eq!(end.x, start.x - 2.0, 1e-3);
        assert_eq!(end.y, start.y);
    }

    #[test]
    fn malformed_packet_handling() {
        let garbage = [0xffu8, 0xff, 0xff, 0xff, 0x01];
        assert!(deserialize::<Packet>(&garbage).is_err());
        assert!(deserialize::<Packet>(&[]).is_err());
    }

    fn recv_packet(socket: &UdpSocket) -> Packet {
        let mut buf = [0u8; 2048];
        let (len, _) = socket.recv_from(&mut buf).expect("no packet from server");
        deserialize(&buf[..len]).unwrap()
    }

    /// Real loopback round trip: join, receive own Add, move, leave.
    #[test]
    fn udp_server_round_trip() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            patch_interval: Duration::from_millis(20),
            room: RoomConfig {
                seed: Some(1),
                ..RoomConfig::default()
            },
            ..ServerConfig::default()
        };

        let mut server = runtime.block_on(Server::new(config)).unwrap();
        let server_addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = runtime.spawn(async move { server.run().await.is_ok() });

        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let send = |packet: &Packet| {
            socket
                .send_to(&serialize(packet).unwrap(), server_addr)
                .unwrap();
        };

        send(&Packet::Join {
            client_version: PROTOCOL_VERSION,
        });
        let session_id = match recv_packet(&socket) {
            Packet::Joined { session_id } => session_id,
            other => panic!("Unexpected packet {:?}", other),
        };

        let spawn = match recv_packet(&socket) {
            Packet::Sync { full, events, .. } => {
                assert!(full);
                events
                    .iter()
                    .find_map(|event| match event {
                        StateEvent::Add { id, state } if *id == session_id => Some(*state),
                        _ => None,
                    })
                    .expect("own entity missing from snapshot")
            }
            other => panic!("Unexpected packet {:?}", other),
        };

        send(&Packet::Input(left().into()));
        let moved = match recv_packet(&socket) {
            Packet::Sync { full, events, .. } => {
                assert!(!full);
                let mut state: EntityState = spawn;
                for event in &events {
                    if let StateEvent::Change { id, patch } = event {
                        if *id == session_id {
                            state.apply(patch);
                        }
                    }
                }
                state
            }
            other => panic!("Unexpected packet {:?}", other),
        };
        assert_approx_eq!(moved.x, spawn.x - 2.0, 1e-3);

        send(&Packet::Leave);
        std::thread::sleep(Duration::from_millis(50));

        shutdown.send(ServerMessage::Shutdown).unwrap();
        assert!(runtime.block_on(handle).unwrap());
    }

    #[test]
    fn udp_join_rejected_on_version_mismatch() {
        tokio_test::block_on(async {
            let mut server = Server::new(ServerConfig {
                bind_addr: "127.0.0.1:0".to_string(),
                ..ServerConfig::default()
            })
            .await
            .unwrap();
            let server_addr = server.local_addr().unwrap();
            let shutdown = server.shutdown_handle();

            let client = async move {
                let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
                let join = serialize(&Packet::Join { client_version: 0 }).unwrap();
                socket.send_to(&join, server_addr).await.unwrap();

                let mut buf = [0u8; 2048];
                let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
                    .await
                    .expect("no reply from server")
                    .unwrap();
                let reply: Packet = deserialize(&buf[..len]).unwrap();
                shutdown.send(ServerMessage::Shutdown).unwrap();
                reply
            };

            let (result, reply) = tokio::join!(server.run(), client);
            assert!(result.is_ok());
            assert!(matches!(reply, Packet::Rejected { .. }));
        });
    }

    #[test]
    fn udp_resent_join_keeps_client_on_live_session() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            patch_interval: Duration::from_millis(20),
            room: RoomConfig {
                seed: Some(3),
                ..RoomConfig::default()
            },
            ..ServerConfig::default()
        };

        let mut server = runtime.block_on(Server::new(config)).unwrap();
        let server_addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = runtime.spawn(async move { server.run().await.is_ok() });

        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let now = Instant::now();
        let mut session = ClientSession::default();
        let mut outgoing = session.start(now);
        // The handshake resends Join before the first reply arrives
        outgoing.extend(session.frame(STEP, Input::default(), now + Duration::from_millis(600)));
        assert_eq!(outgoing.len(), 2);
        for packet in &outgoing {
            socket
                .send_to(&serialize(packet).unwrap(), server_addr)
                .unwrap();
        }

        let mut joined = Vec::new();
        for _ in 0..10 {
            let packet = recv_packet(&socket);
            if let Packet::Joined { session_id } = &packet {
                joined.push(*session_id);
            }
            session.handle_packet(packet, now + Duration::from_millis(700));
            if session.replica().is_synced() && joined.len() == 2 {
                break;
            }
        }

        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0], joined[1]);
        assert_eq!(session.session_id(), Some(joined[0]));
        assert_eq!(session.replica().len(), 1);
        assert!(session.replica().get(&joined[0]).is_some());
        assert!(session.game().local().is_some());

        socket
            .send_to(&serialize(&Packet::Leave).unwrap(), server_addr)
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));

        shutdown.send(ServerMessage::Shutdown).unwrap();
        assert!(runtime.block_on(handle).unwrap());
    }
}
