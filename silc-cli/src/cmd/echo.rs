//! Echo bot driven by a simulated loopback network.
//!
//! Every dispatched event is printed to stdout as one JSON line. Peers take
//! turns saying numbered lines on the channel; the bot echoes each back and
//! the session ends with a disconnect once the script runs out or on Ctrl-C.

use std::time::Duration;

use serde_json::{Value as Json, json};
use silc::loopback::{LoopbackToolkit, Network};
use silc::{Client, EventSlot, MessageFlags, Session, Value};

use super::EchoArgs;
use super::keys::load_or_create;

/// Convert a handler argument to JSON for printing.
fn to_json(value: &Value) -> Json {
    match value {
        Value::None => Json::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Str(s) => json!(s),
        Value::Bytes(bytes) => json!(hex::encode(bytes)),
        Value::User(user) => json!({ "user": user.name() }),
        Value::Channel(channel) => json!({ "channel": channel.name() }),
        Value::Tuple(items) => Json::Array(items.iter().map(to_json).collect()),
    }
}

fn print_event(slot: EventSlot, args: &[Value]) {
    let line = json!({
        "slot": slot.name(),
        "args": args.iter().map(to_json).collect::<Vec<_>>(),
    });
    println!("{line}");
}

fn install_handlers(client: &mut Client, channel: &str) {
    for &slot in EventSlot::ALL {
        let channel = channel.to_owned();
        client.set_handler(slot, move |session: &mut Session, args: &[Value]| {
            print_event(slot, args);
            match slot {
                EventSlot::Connected => session.command_call(&format!("JOIN {channel}"))?,
                EventSlot::ChannelMessage => {
                    if let (Some(channel), Some(text)) = (args[1].as_channel(), args[3].as_str()) {
                        session.send_channel_message(
                            channel,
                            &format!("echo: {text}"),
                            MessageFlags::empty(),
                            false,
                        )?;
                    }
                }
                EventSlot::PrivateMessage => {
                    if let (Some(user), Some(text)) = (args[0].as_user(), args[2].as_str()) {
                        session.send_private_message(
                            user,
                            &format!("echo: {text}"),
                            MessageFlags::empty(),
                            false,
                        )?;
                    }
                }
                _ => {}
            }
            Ok(())
        });
    }
}

/// Play one scripted line. Returns `false` once the script is exhausted.
fn step(network: &Network, args: &EchoArgs, line: usize) -> silc::Result<bool> {
    if line >= args.lines || args.peers.is_empty() {
        return Ok(false);
    }
    let peer = &args.peers[line % args.peers.len()];
    if line < args.peers.len() {
        network.join(peer, &args.channel);
    }
    if line % 4 == 3 {
        network.whisper(peer, &format!("psst, line {}", line + 1))?;
    } else {
        network.say(peer, &args.channel, &format!("hello, line {}", line + 1))?;
    }
    Ok(true)
}

pub fn run(profile: &str, args: &EchoArgs) -> silc::Result<()> {
    let keys = load_or_create(profile)?;
    let network = Network::new();
    network.set_motd("Welcome to the loopback network.");

    let mut builder = Client::builder();
    if let Some(ref nick) = args.nick {
        builder = builder.nickname(nick);
    }
    let mut client = builder.build(LoopbackToolkit::new(network.clone()), keys)?;
    install_handlers(&mut client, &args.channel);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(drive(&mut client, &network, args))?;

    for failure in client.take_failures() {
        eprintln!("handler for {} failed: {}", failure.slot, failure.message);
    }
    eprintln!("{} message(s) echoed", network.sent().len());
    Ok(())
}

async fn drive(client: &mut Client, network: &Network, args: &EchoArgs) -> silc::Result<()> {
    client.connect_to_server(&args.server, args.port)?;
    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut line = 0;
    let mut finishing = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                network.disconnect("interrupted");
                client.run_one();
                return Ok(());
            }
        }

        client.run_one();
        if !client.is_connected() {
            return Ok(());
        }
        if finishing {
            network.disconnect("script finished");
        } else if step(network, args, line)? {
            line += 1;
        } else {
            client.command_call("MOTD")?;
            finishing = true;
        }
    }
}
