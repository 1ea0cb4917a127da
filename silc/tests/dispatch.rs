#![cfg(feature = "loopback")]

mod common;

use common::{HOST, client, connected, record};
use silc::loopback::Network;
use silc::{
    Actor, ChannelEntry, ChannelListing, Client, ClientEntry, Command, ConnectionStatus, EntryRef,
    Event, EventSlot, IdType, MessageFlags, NotifyType, Notification, Reply, Slot, Status, Value,
};

/// A connected client with bob and carol on #lobby, their join notices drained.
fn lobby(
    network: &Network,
) -> (Client, EntryRef<ClientEntry>, EntryRef<ClientEntry>, EntryRef<ChannelEntry>) {
    let mut client = connected(network);
    let channel = network.join("bob", "#lobby");
    network.join("carol", "#lobby");
    client.run_one();
    let bob = network.user("bob").unwrap();
    let carol = network.user("carol").unwrap();
    (client, bob, carol, channel)
}

/// Name of the user or channel in `value`.
fn name(value: &Value) -> Option<String> {
    match value {
        Value::User(user) => user.name(),
        Value::Channel(channel) => channel.name(),
        _ => None,
    }
}

fn ok(reply: Reply) -> Event {
    Event::CommandReply {
        command: reply.command(),
        status: Status::OK,
        error: Status::OK,
        reply: Some(reply),
    }
}

#[test]
fn channel_message_arguments() {
    let network = Network::new();
    let mut client = connected(&network);
    network.join("bob", "#lobby");
    let calls = record(&mut client, EventSlot::ChannelMessage);

    network.say("bob", "#lobby", "hello there").unwrap();
    network.say("bob", "#lobby", "again").unwrap();
    assert_eq!(client.run_one(), 3);

    let calls = calls.borrow();
    assert_eq!(calls.len(), 2);
    let first = &calls[0];
    assert_eq!(first.len(), 4);
    let sender = first[0].as_user().unwrap();
    assert_eq!(sender.name().as_deref(), Some("bob"));
    assert_eq!(first[1].as_channel().unwrap().name().as_deref(), Some("#lobby"));
    assert_eq!(first[2], Value::from(MessageFlags::UTF8.bits()));
    assert_eq!(first[3].as_str(), Some("hello there"));

    // Same native record, same wrapper.
    assert_eq!(calls[1][0], first[0]);
    assert_eq!(calls[1][1], first[1]);
}

#[test]
fn private_message_arguments() {
    let network = Network::new();
    let mut client = connected(&network);
    network.add_user("carol");
    let calls = record(&mut client, EventSlot::PrivateMessage);

    network.whisper("carol", "psst").unwrap();
    client.run_one();

    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][0].as_user().unwrap().to_string(), "carol <carol@remote.invalid> on loopback.silc");
    assert_eq!(calls[0][2].as_str(), Some("psst"));
}

#[test]
fn failed_reply_goes_to_the_failed_slot() {
    let network = Network::new();
    let mut client = connected(&network);
    let failed = record(&mut client, EventSlot::CommandReplyFailed);
    let leave = record(&mut client, EventSlot::CommandReplyLeave);

    client.command_call("LEAVE #nowhere").unwrap();
    client.run_one();

    assert!(leave.borrow().is_empty());
    let failed = failed.borrow();
    assert_eq!(
        failed.as_slice(),
        [vec![
            Value::from(Command::Leave.code()),
            Value::from("LEAVE"),
            Value::from(Status::ERR_NO_SUCH_CHANNEL.0),
            Value::from(Status::ERR_NO_SUCH_CHANNEL.message()),
        ]]
    );
}

#[test]
fn command_slot_sees_every_accepted_command() {
    let network = Network::new();
    let mut client = connected(&network);
    let commands = record(&mut client, EventSlot::Command);
    let pings = record(&mut client, EventSlot::CommandReplyPing);

    client.command_call("PING").unwrap();
    client.run_one();

    assert_eq!(
        commands.borrow()[0],
        [
            Value::Bool(true),
            Value::from(Command::Ping.code()),
            Value::from("PING"),
            Value::from(Status::OK.message()),
        ]
    );
    assert_eq!(pings.borrow().as_slice(), [Vec::<Value>::new()]);
}

#[test]
fn unknown_command_is_refused_synchronously() {
    let network = Network::new();
    let mut client = connected(&network);
    let commands = record(&mut client, EventSlot::Command);

    assert!(client.command_call("FROBNICATE now").is_err());
    assert_eq!(client.run_one(), 0);
    assert!(commands.borrow().is_empty());
}

#[test]
fn non_callable_slot_drops_events() {
    let network = Network::new();
    let mut client = connected(&network);
    network.join("bob", "#lobby");
    client.set_slot(EventSlot::ChannelMessage, Slot::Value(Value::Int(1)));

    network.say("bob", "#lobby", "ignored").unwrap();
    assert_eq!(client.run_one(), 2);
    assert!(client.take_failures().is_empty());
    assert!(!client.slot(EventSlot::ChannelMessage).is_callable());
}

#[test]
fn handler_errors_and_panics_are_recorded() {
    let network = Network::new();
    let mut client = connected(&network);
    network.join("bob", "#lobby");
    client.set_handler(EventSlot::ChannelMessage, |_, _| Err("boom".into()));
    client.set_handler(EventSlot::PrivateMessage, |_, _| panic!("kaboom"));
    let joins = record(&mut client, EventSlot::NotifyJoin);

    network.say("bob", "#lobby", "one").unwrap();
    network.whisper("bob", "two").unwrap();
    network.join("carol", "#lobby");
    client.run_one();

    // Dispatch carries on after a failing handler.
    assert_eq!(joins.borrow().len(), 2);
    let failures = client.take_failures();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].slot, EventSlot::ChannelMessage);
    assert_eq!(failures[0].message, "boom");
    assert_eq!(failures[1].slot, EventSlot::PrivateMessage);
    assert_eq!(failures[1].message, "handler panicked: kaboom");
    assert!(client.take_failures().is_empty());
}

#[test]
fn events_for_released_entries_are_dropped() {
    let network = Network::new();
    let mut client = connected(&network);
    let channel = network.join("bob", "#lobby");
    let messages = record(&mut client, EventSlot::ChannelMessage);

    network.push(Event::ChannelMessage {
        sender: EntryRef::dangling(),
        channel,
        flags: MessageFlags::UTF8,
        payload: b"ghost".to_vec(),
    });
    client.run_one();

    assert!(messages.borrow().is_empty());
    assert!(client.take_failures().is_empty());
}

#[test]
fn invalid_utf8_payload_is_dropped() {
    let network = Network::new();
    let mut client = connected(&network);
    let channel = network.join("bob", "#lobby");
    let bob = network.user("bob").unwrap();
    let messages = record(&mut client, EventSlot::ChannelMessage);

    network.push(Event::ChannelMessage {
        sender: bob,
        channel,
        flags: MessageFlags::UTF8,
        payload: vec![0xff, 0xfe, 0x00],
    });
    client.run_one();

    assert!(messages.borrow().is_empty());
}

#[test]
fn notifications_without_a_slot_are_ignored() {
    let network = Network::new();
    let mut client = connected(&network);
    let none = record(&mut client, EventSlot::NotifyNone);

    network.push(Event::Notify(Notification::Unhandled(
        silc::NotifyType::UmodeChange,
    )));
    network.push(Event::Notify(Notification::None {
        message: "server notice".into(),
    }));
    assert_eq!(client.run_one(), 2);
    assert_eq!(none.borrow().as_slice(), [vec![Value::from("server notice")]]);
}

#[test]
fn connection_failure_reaches_the_failure_slot() {
    let network = Network::new();
    let mut client = client(&network);
    let connected = record(&mut client, EventSlot::Connected);
    let failures = record(&mut client, EventSlot::Failure);

    network.fail_next_connect(ConnectionStatus::ErrorAuth, Status(13));
    client.connect_to_server(HOST, Some(7070)).unwrap();
    client.run_one();

    assert!(!client.is_connected());
    assert!(connected.borrow().is_empty());
    let failures = failures.borrow();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0][0], Value::from(ConnectionStatus::ErrorAuth.code()));
    assert_eq!(failures[0][1], Value::from(13u8));
    assert_eq!(failures[0][2].as_str(), Some(Status(13).message()));
    assert_eq!(
        failures[0][3].as_str(),
        Some("cannot connect to silc.example.org:7070")
    );
}

#[test]
fn success_with_an_error_code_counts_as_failure() {
    let network = Network::new();
    let mut client = client(&network);
    let connected = record(&mut client, EventSlot::Connected);
    let failures = record(&mut client, EventSlot::Failure);

    network.push(Event::Connection {
        status: ConnectionStatus::Success,
        error: Status(2),
        message: None,
        connection: None,
    });
    client.run_one();

    assert!(connected.borrow().is_empty());
    assert_eq!(failures.borrow().len(), 1);
    assert_eq!(failures.borrow()[0][3], Value::None);
}

#[test]
fn disconnect_reaches_the_disconnected_slot() {
    let network = Network::new();
    let mut client = connected(&network);
    let disconnected = record(&mut client, EventSlot::Disconnected);

    network.disconnect("server going down");
    client.run_one();

    assert!(!client.is_connected());
    assert_eq!(
        disconnected.borrow().as_slice(),
        [vec![Value::from("server going down")]]
    );
}

#[test]
fn passphrase_request_is_answered_by_the_handler() {
    let network = Network::new();
    let mut client = client(&network);
    client.set_slot(
        EventSlot::AskPassphrase,
        Slot::responder(|_, args| {
            assert!(args.is_empty());
            Ok(Value::from("hunter2"))
        }),
    );

    network.ask_passphrase();
    client.run_one();

    assert_eq!(network.passphrases(), [b"hunter2".to_vec()]);
    assert!(client.take_failures().is_empty());
}

#[test]
fn passphrase_defaults_to_empty() {
    let network = Network::new();
    let mut client = client(&network);

    // Empty slot.
    network.ask_passphrase();
    client.run_one();

    // A plain handler has no answer to give.
    client.set_handler(EventSlot::AskPassphrase, |_, _| Ok(()));
    network.ask_passphrase();
    client.run_one();

    // A failing responder.
    client.set_slot(
        EventSlot::AskPassphrase,
        Slot::responder(|_, _| Err("no terminal".into())),
    );
    network.ask_passphrase();
    client.run_one();

    assert_eq!(network.passphrases(), [Vec::<u8>::new(), Vec::new(), Vec::new()]);
    let failures = client.take_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].slot, EventSlot::AskPassphrase);
    assert_eq!(failures[0].message, "no terminal");
}

#[test]
fn entities_are_not_wrapped_without_a_connection() {
    let network = Network::new();
    let mut client = client(&network);
    let joins = record(&mut client, EventSlot::NotifyJoin);
    let messages = record(&mut client, EventSlot::ChannelMessage);

    network.join("bob", "#lobby");
    network.say("bob", "#lobby", "anyone?").unwrap();
    assert_eq!(client.run_one(), 2);
    assert!(joins.borrow().is_empty());
    assert!(messages.borrow().is_empty());

    client.connect_to_server(HOST, None).unwrap();
    client.run_one();
    network.say("bob", "#lobby", "there you are").unwrap();
    client.run_one();
    assert_eq!(messages.borrow().len(), 1);
}

#[test]
fn actors_carry_their_entity_tag() {
    let network = Network::new();
    let (mut client, bob, carol, channel) = lobby(&network);
    let topics = record(&mut client, EventSlot::NotifyTopicSet);
    let cmodes = record(&mut client, EventSlot::NotifyCmodeChange);
    let cumodes = record(&mut client, EventSlot::NotifyCumodeChange);

    for actor in [
        Actor::User(bob.clone()),
        Actor::Channel(channel.clone()),
        Actor::Unknown(IdType::Server),
    ] {
        network.push(Event::Notify(Notification::TopicSet {
            actor,
            channel: channel.clone(),
            topic: "be nice".into(),
        }));
    }
    network.push(Event::Notify(Notification::CmodeChange {
        actor: Actor::Unknown(IdType::Server),
        mode: 0x10,
        cipher: Some("aes-256-cbc".into()),
        hmac: None,
        passphrase: None,
        channel: channel.clone(),
    }));
    network.push(Event::Notify(Notification::CumodeChange {
        actor: Actor::User(carol),
        mode: 2,
        channel,
        target: bob,
    }));
    client.run_one();

    let topics = topics.borrow();
    assert_eq!(topics.len(), 3);
    assert_eq!(topics[0][0], Value::from(IdType::Client.code()));
    assert_eq!(name(&topics[0][1]).as_deref(), Some("bob"));
    assert_eq!(topics[1][0], Value::from(IdType::Channel.code()));
    assert_eq!(name(&topics[1][1]).as_deref(), Some("#lobby"));
    assert_eq!(topics[2][0], Value::from(IdType::Server.code()));
    assert_eq!(topics[2][1], Value::None);
    assert_eq!(name(&topics[2][2]).as_deref(), Some("#lobby"));
    assert_eq!(topics[2][3], Value::from("be nice"));

    let cmode = &cmodes.borrow()[0];
    assert_eq!(cmode.len(), 9);
    assert_eq!(cmode[..8], [
        Value::from(IdType::Server.code()),
        Value::None,
        Value::from(0x10u32),
        Value::from("aes-256-cbc"),
        Value::None,
        Value::None,
        Value::None,
        Value::None,
    ]);
    assert_eq!(name(&cmode[8]).as_deref(), Some("#lobby"));

    let cumode = &cumodes.borrow()[0];
    assert_eq!(cumode.len(), 5);
    assert_eq!(cumode[0], Value::from(IdType::Client.code()));
    assert_eq!(name(&cumode[1]).as_deref(), Some("carol"));
    assert_eq!(cumode[2], Value::from(2u32));
    assert_eq!(name(&cumode[3]).as_deref(), Some("#lobby"));
    assert_eq!(name(&cumode[4]).as_deref(), Some("bob"));
}

#[test]
fn notification_argument_shapes() {
    let network = Network::new();
    let (mut client, bob, carol, channel) = lobby(&network);
    let invites = record(&mut client, EventSlot::NotifyInvite);
    let nicks = record(&mut client, EventSlot::NotifyNickChange);
    let kicks = record(&mut client, EventSlot::NotifyKicked);
    let kills = record(&mut client, EventSlot::NotifyKilled);
    let watches = record(&mut client, EventSlot::NotifyWatch);
    let errors = record(&mut client, EventSlot::NotifyError);
    let changes = record(&mut client, EventSlot::NotifyChannelChange);
    let signoffs = record(&mut client, EventSlot::NotifyServerSignoff);
    let motds = record(&mut client, EventSlot::NotifyMotd);

    let events = [
        Notification::Invite {
            channel: Some(channel.clone()),
            channel_name: "#lobby".into(),
            inviter: bob.clone(),
        },
        Notification::Invite {
            channel: None,
            channel_name: "#secret".into(),
            inviter: bob.clone(),
        },
        Notification::NickChange {
            old: bob.clone(),
            new: carol.clone(),
        },
        Notification::Kicked {
            kicked: carol.clone(),
            message: Some("spam".into()),
            kicker: bob.clone(),
            channel: channel.clone(),
        },
        Notification::Killed {
            killed: carol.clone(),
            message: None,
            actor: Actor::User(bob.clone()),
            channel: None,
        },
        Notification::Watch {
            user: bob.clone(),
            new_nick: Some("robert".into()),
            mode: 0,
            notification: NotifyType::NickChange,
        },
        Notification::Error {
            error: Status::ERR_NO_SUCH_NICK,
        },
        Notification::ChannelChange { channel },
        Notification::ServerSignoff,
        Notification::Motd {
            message: "welcome".into(),
        },
    ];
    for notification in events {
        network.push(Event::Notify(notification));
    }
    client.run_one();

    let invites = invites.borrow();
    assert_eq!(name(&invites[0][0]).as_deref(), Some("#lobby"));
    assert_eq!(invites[0][1], Value::from("#lobby"));
    assert_eq!(name(&invites[0][2]).as_deref(), Some("bob"));
    assert_eq!(invites[1][0], Value::None);
    assert_eq!(invites[1][1], Value::from("#secret"));

    let nick = &nicks.borrow()[0];
    assert_eq!(nick.len(), 2);
    assert_eq!(name(&nick[0]).as_deref(), Some("bob"));
    assert_eq!(name(&nick[1]).as_deref(), Some("carol"));

    let kick = &kicks.borrow()[0];
    assert_eq!(name(&kick[0]).as_deref(), Some("carol"));
    assert_eq!(kick[1], Value::from("spam"));
    assert_eq!(name(&kick[2]).as_deref(), Some("bob"));
    assert_eq!(name(&kick[3]).as_deref(), Some("#lobby"));

    let kill = &kills.borrow()[0];
    assert_eq!(kill.len(), 4);
    assert_eq!(name(&kill[0]).as_deref(), Some("carol"));
    assert_eq!(kill[1], Value::None);
    assert_eq!(name(&kill[2]).as_deref(), Some("bob"));
    assert_eq!(kill[3], Value::None);

    let watch = &watches.borrow()[0];
    assert_eq!(name(&watch[0]).as_deref(), Some("bob"));
    assert_eq!(watch[1..], [
        Value::from("robert"),
        Value::from(0u32),
        Value::from(NotifyType::NickChange.code()),
        Value::None,
    ]);

    assert_eq!(errors.borrow().as_slice(), [vec![
        Value::from(Status::ERR_NO_SUCH_NICK.0),
        Value::from(Status::ERR_NO_SUCH_NICK.message()),
    ]]);
    assert_eq!(name(&changes.borrow()[0][0]).as_deref(), Some("#lobby"));
    assert_eq!(signoffs.borrow().as_slice(), [Vec::<Value>::new()]);
    assert_eq!(motds.borrow().as_slice(), [vec![Value::from("welcome")]]);
}

#[test]
fn command_reply_argument_shapes() {
    let network = Network::new();
    let (mut client, bob, carol, channel) = lobby(&network);
    let whois = record(&mut client, EventSlot::CommandReplyWhois);
    let whowas = record(&mut client, EventSlot::CommandReplyWhowas);
    let users = record(&mut client, EventSlot::CommandReplyUsers);
    let topics = record(&mut client, EventSlot::CommandReplyTopic);
    let kicks = record(&mut client, EventSlot::CommandReplyKick);
    let cmodes = record(&mut client, EventSlot::CommandReplyCmode);
    let cumodes = record(&mut client, EventSlot::CommandReplyCumode);
    let bans = record(&mut client, EventSlot::CommandReplyBan);
    let leaves = record(&mut client, EventSlot::CommandReplyLeave);

    let replies = [
        Reply::Whois {
            user: bob.clone(),
            nickname: "bob".into(),
            username: "bob".into(),
            realname: None,
            mode: 0,
            idle: 42,
        },
        Reply::Whowas {
            user: carol.clone(),
            nickname: "carol".into(),
            username: "carol".into(),
            realname: Some("Carol".into()),
        },
        Reply::Users {
            channel: channel.clone(),
            members: vec![bob.clone(), EntryRef::dangling()],
        },
        Reply::Topic {
            channel: channel.clone(),
            topic: None,
        },
        Reply::Kick {
            channel: channel.clone(),
            user: carol,
        },
        Reply::Cmode {
            channel: channel.clone(),
            mode: 4,
            user_limit: 10,
        },
        Reply::Cumode {
            mode: 1,
            channel: channel.clone(),
            user: bob,
        },
        Reply::Ban {
            channel: channel.clone(),
            bans: Some(vec!["*!*@evil.example".into()]),
        },
        Reply::Ban {
            channel: channel.clone(),
            bans: None,
        },
        Reply::Leave { channel },
    ];
    for reply in replies {
        network.push(ok(reply));
    }
    client.run_one();

    let whois = &whois.borrow()[0];
    assert_eq!(name(&whois[0]).as_deref(), Some("bob"));
    assert_eq!(whois[1..], [
        Value::from("bob"),
        Value::from("bob"),
        Value::None,
        Value::from(0u32),
        Value::from(42u32),
    ]);

    let whowas = &whowas.borrow()[0];
    assert_eq!(whowas.len(), 4);
    assert_eq!(whowas[3], Value::from("Carol"));

    let users = &users.borrow()[0];
    assert_eq!(name(&users[0]).as_deref(), Some("#lobby"));
    let members = users[1].as_tuple().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(name(&members[0]).as_deref(), Some("bob"));
    assert_eq!(members[1], Value::None);

    assert_eq!(topics.borrow()[0][1], Value::None);
    assert_eq!(name(&kicks.borrow()[0][1]).as_deref(), Some("carol"));
    assert_eq!(cmodes.borrow()[0][1..], [
        Value::from(4u32),
        Value::from(10u32),
        Value::None,
        Value::None,
    ]);
    let cumode = &cumodes.borrow()[0];
    assert_eq!(cumode[0], Value::from(1u32));
    assert_eq!(name(&cumode[1]).as_deref(), Some("#lobby"));
    assert_eq!(name(&cumode[2]).as_deref(), Some("bob"));

    let bans = bans.borrow();
    assert_eq!(bans[0][1], Value::Tuple(vec![Value::from("*!*@evil.example")]));
    assert_eq!(bans[1][1], Value::None);
    assert_eq!(leaves.borrow().len(), 1);
    assert_eq!(leaves.borrow()[0].len(), 1);
}

#[test]
fn list_replies_with_and_without_channels() {
    let network = Network::new();
    let (mut client, _, _, channel) = lobby(&network);
    let lists = record(&mut client, EventSlot::CommandReplyList);

    network.push(ok(Reply::List(None)));
    network.push(ok(Reply::List(Some(ChannelListing {
        channel,
        name: "#lobby".into(),
        topic: Some("chat".into()),
        user_count: 2,
    }))));
    client.run_one();

    let lists = lists.borrow();
    assert_eq!(lists[0], [Value::None, Value::None, Value::None, Value::Int(0)]);
    assert_eq!(name(&lists[1][0]).as_deref(), Some("#lobby"));
    assert_eq!(lists[1][1..], [Value::from("#lobby"), Value::from("chat"), Value::Int(2)]);
}

#[test]
fn replies_without_a_payload_are_dropped() {
    let network = Network::new();
    let (mut client, bob, _, _) = lobby(&network);
    let info = record(&mut client, EventSlot::CommandReplyInfo);
    let stats = record(&mut client, EventSlot::CommandReplyStats);
    let service = record(&mut client, EventSlot::CommandReplyService);
    let whois = record(&mut client, EventSlot::CommandReplyWhois);

    for command in [Command::Info, Command::Stats, Command::Service] {
        network.push(Event::CommandReply {
            command,
            status: Status::OK,
            error: Status::OK,
            reply: None,
        });
    }
    // Payload for a different command than the tag.
    network.push(Event::CommandReply {
        command: Command::Whois,
        status: Status::OK,
        error: Status::OK,
        reply: Some(Reply::Kill { user: Some(bob) }),
    });
    assert_eq!(client.run_one(), 4);

    assert!(info.borrow().is_empty());
    assert!(stats.borrow().is_empty());
    assert!(service.borrow().is_empty());
    assert!(whois.borrow().is_empty());
    assert!(client.take_failures().is_empty());
}
