#![allow(dead_code, missing_docs)]

use std::cell::RefCell;
use std::rc::Rc;

use silc::loopback::{LoopbackToolkit, Network};
use silc::{Client, EventSlot, KeyPair, Keys, PrivateKey, PublicKey, Value};

pub const HOST: &str = "silc.example.org";

pub fn keys() -> Keys {
    Keys::from_pair(KeyPair {
        pkcs_name: "rsa".into(),
        public_key: PublicKey(vec![7; 32]),
        private_key: PrivateKey::new(vec![9; 32]),
    })
}

pub fn client(network: &Network) -> Client {
    Client::builder()
        .nickname("alice")
        .username("alice")
        .realname("Alice Liddell")
        .hostname("localhost")
        .build(LoopbackToolkit::new(network.clone()), keys())
        .unwrap()
}

pub fn connected(network: &Network) -> Client {
    let mut client = client(network);
    client.connect_to_server(HOST, None).unwrap();
    client.run_one();
    assert!(client.is_connected());
    client
}

/// Argument lists seen by a recording handler, oldest first.
pub type Calls = Rc<RefCell<Vec<Vec<Value>>>>;

pub fn record(client: &mut Client, slot: EventSlot) -> Calls {
    let calls = Calls::default();
    let sink = Rc::clone(&calls);
    client.set_handler(slot, move |_, args| {
        sink.borrow_mut().push(args.to_vec());
        Ok(())
    });
    calls
}
