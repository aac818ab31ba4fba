//! End-to-end scenarios over an in-memory face pair: one engine plays
//! producer, the other consumer, each with its own schema tree.

use rust_ndn_common::error::Error;
use rust_ndn_common::name::Name;
use rust_ndn_common::packet::Interest;
use rust_ndn_common::pattern::{Matching, NamePattern};
use rust_ndn_common::tlv::nat_bytes;
use rust_ndn_common::wire::Wire;
use rust_ndn_engine::engine::ExpressResult;
use rust_ndn_engine::security::{self, Sha256Signer};
use rust_ndn_engine::{Engine, Face, InterestContext, Timer};
use rust_ndn_schema::contentkey::EncryptedContent;
use rust_ndn_schema::{
    contentkey, FixedHmacSignerPolicy, MemStoragePolicy, Node, NodeKind, Policy, PolicyContext,
    RegisterPolicy, Sha256SignerPolicy, Tree,
};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn pattern(s: &str) -> NamePattern {
    s.parse().unwrap()
}

fn name(s: &str) -> Name {
    s.parse().unwrap()
}

async fn engine_pair() -> (Engine, Engine) {
    let (face_a, face_b) = Face::memory_pair();
    let a = Engine::new(
        face_a,
        Timer::new(),
        Arc::new(Sha256Signer),
        security::pass_all(),
    );
    let b = Engine::new(
        face_b,
        Timer::new(),
        Arc::new(Sha256Signer),
        security::pass_all(),
    );
    a.start().await.unwrap();
    b.start().await.unwrap();
    (a, b)
}

#[tokio::test]
async fn produce_then_consume_loopback() {
    let (producer_engine, consumer_engine) = engine_pair().await;
    let prefix = name("/example/app");

    // Producer: a leaf at /data/<v=time> serving "hello", Sha256-signed.
    let producer = Tree::new();
    producer
        .put_node(&pattern("/data/<v=time>"), NodeKind::Leaf)
        .unwrap();
    producer
        .set_policy(
            &pattern("/data/<v=time>"),
            Arc::new(Sha256SignerPolicy::new()),
        )
        .unwrap();
    producer
        .on_interest(
            &pattern("/data/<v=time>"),
            Arc::new(|event| {
                let wire = event.provide(Wire::from(&b"hello"[..])).unwrap();
                event.reply(wire).unwrap();
                ControlFlow::Break(())
            }),
        )
        .unwrap();
    producer
        .attach(prefix.clone(), producer_engine.clone())
        .await
        .unwrap();

    // Consumer: an express point at the same pattern, validating the
    // digest signature.
    let consumer = Tree::new();
    consumer
        .put_node(&pattern("/data/<v=time>"), NodeKind::ExpressPoint)
        .unwrap();
    consumer
        .set_policy(
            &pattern("/data/<v=time>"),
            Arc::new(Sha256SignerPolicy::new()),
        )
        .unwrap();
    consumer
        .edit_node(&pattern("/data/<v=time>"), |node| {
            node.properties_mut().lifetime = Duration::from_millis(500);
            node.properties_mut().must_be_fresh = false;
        })
        .unwrap();
    consumer
        .attach(prefix.clone(), consumer_engine.clone())
        .await
        .unwrap();

    let mut matching = Matching::new();
    matching.insert("time".into(), nat_bytes(100));
    let view = consumer
        .at(&pattern("/data/<v=time>"))
        .unwrap()
        .apply(matching);

    let result = view.need().await.unwrap();
    assert_eq!(&result.content().join()[..], b"hello");
    assert_eq!(result.data.name, name("/example/app/data/v=100"));
}

#[tokio::test]
async fn can_be_prefix_resolves_from_storage() {
    let (producer_engine, consumer_engine) = engine_pair().await;
    let prefix = name("/store");

    let producer = Tree::new();
    producer.put_node(&pattern("/a/b/c"), NodeKind::Leaf).unwrap();
    producer
        .set_policy(&pattern("/"), Arc::new(MemStoragePolicy::new()))
        .unwrap();
    producer
        .attach(prefix.clone(), producer_engine.clone())
        .await
        .unwrap();

    // Pre-publish /store/a/b/c into the producer's storage.
    producer
        .at(&pattern("/a/b/c"))
        .unwrap()
        .apply(Matching::new())
        .provide(Wire::from(&b"cached"[..]))
        .unwrap();

    // CanBePrefix=true: the shorter Interest resolves to the stored Data.
    let handle = consumer_engine
        .express(
            Interest::new(name("/store/a/b"))
                .with_can_be_prefix(true)
                .with_lifetime(Duration::from_millis(300)),
        )
        .unwrap();
    match handle.wait().await {
        ExpressResult::Data { data, .. } => {
            assert_eq!(data.name, name("/store/a/b/c"));
            assert_eq!(&data.content.unwrap().join()[..], b"cached");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // CanBePrefix=false: exact lookup misses and the Interest times out.
    let handle = consumer_engine
        .express(
            Interest::new(name("/store/a/b")).with_lifetime(Duration::from_millis(300)),
        )
        .unwrap();
    assert!(matches!(handle.wait().await, ExpressResult::Timeout));
}

#[tokio::test]
async fn stale_data_needs_must_be_fresh_false() {
    let (producer_engine, consumer_engine) = engine_pair().await;
    let prefix = name("/fresh");

    let producer = Tree::new();
    producer.put_node(&pattern("/item"), NodeKind::Leaf).unwrap();
    producer
        .set_policy(&pattern("/"), Arc::new(MemStoragePolicy::new()))
        .unwrap();
    producer
        .edit_node(&pattern("/item"), |node| {
            node.properties_mut().freshness = Duration::from_millis(100);
        })
        .unwrap();
    producer
        .attach(prefix.clone(), producer_engine.clone())
        .await
        .unwrap();

    producer
        .at(&pattern("/item"))
        .unwrap()
        .apply(Matching::new())
        .provide(Wire::from(&b"aging"[..]))
        .unwrap();

    // Let the freshness period elapse.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let express = |must_be_fresh: bool| {
        consumer_engine.express(
            Interest::new(name("/fresh/item"))
                .with_must_be_fresh(must_be_fresh)
                .with_lifetime(Duration::from_millis(300)),
        )
    };

    assert!(matches!(
        express(true).unwrap().wait().await,
        ExpressResult::Timeout
    ));
    match express(false).unwrap().wait().await {
        ExpressResult::Data { data, .. } => {
            assert_eq!(&data.content.unwrap().join()[..], b"aging");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn content_key_flow_end_to_end() {
    let (producer_engine, consumer_engine) = engine_pair().await;
    let prefix = name("/enc");
    let hmac_key = &b"Hello, World!"[..];

    let producer = Tree::new();
    producer.put_node(&pattern("/ck"), NodeKind::content_key()).unwrap();
    producer
        .set_policy(&pattern("/ck"), Arc::new(FixedHmacSignerPolicy::new(hmac_key)))
        .unwrap();
    producer
        .attach(prefix.clone(), producer_engine.clone())
        .await
        .unwrap();

    // Producer generates a key and encrypts a payload under it.
    let ck = producer
        .at(&pattern("/ck"))
        .unwrap()
        .apply(Matching::new());
    let key_id = ck.gen_key().unwrap();
    let ciphertext = ck.encrypt(&key_id, &Wire::from(&b"hi"[..])).unwrap();

    // The second party learns the key id from the ciphertext, fetches
    // the key from the distribution leaf, and decrypts.
    let consumer = Tree::new();
    consumer.put_node(&pattern("/ck"), NodeKind::content_key()).unwrap();
    consumer
        .set_policy(&pattern("/ck"), Arc::new(FixedHmacSignerPolicy::new(hmac_key)))
        .unwrap();
    consumer
        .edit_node(&pattern("/ck/<key-id>"), |node| {
            node.properties_mut().lifetime = Duration::from_millis(500);
            node.properties_mut().must_be_fresh = false;
        })
        .unwrap();
    consumer
        .attach(prefix.clone(), consumer_engine.clone())
        .await
        .unwrap();

    let parsed = EncryptedContent::parse(&ciphertext).unwrap();
    assert_eq!(parsed.key_id, key_id);

    let mut matching = Matching::new();
    matching.insert(contentkey::KEY_ID_TAG.into(), parsed.key_id.clone());
    let key_view = consumer
        .at(&pattern("/ck/<key-id>"))
        .unwrap()
        .apply(matching);
    let key_bytes = key_view.need().await.unwrap().content().join();
    assert_eq!(key_bytes.len(), contentkey::KEY_LEN);

    let plaintext = contentkey::decrypt(&key_bytes, &ciphertext).unwrap();
    assert_eq!(&plaintext.join()[..], b"hi");
}

/// Counts hook firings on every node it is installed into.
struct CountingPolicy {
    attaches: Arc<AtomicUsize>,
    detaches: Arc<AtomicUsize>,
}

impl Policy for CountingPolicy {
    fn install(&self, node: &mut Node, _ctx: &PolicyContext<'_>) {
        let attaches = Arc::clone(&self.attaches);
        node.hooks_mut().on_attach.push(Arc::new(move |_, _| {
            attaches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let detaches = Arc::clone(&self.detaches);
        node.hooks_mut().on_detach.push(Arc::new(move || {
            detaches.fetch_add(1, Ordering::SeqCst);
        }));
    }
}

#[tokio::test]
async fn attach_detach_fire_hooks_exactly_once_per_cycle() {
    let (engine, _peer) = engine_pair().await;
    let attaches = Arc::new(AtomicUsize::new(0));
    let detaches = Arc::new(AtomicUsize::new(0));

    let tree = Tree::new();
    tree.put_node(&pattern("/a/b"), NodeKind::Leaf).unwrap();
    tree.put_node(&pattern("/a/c"), NodeKind::Leaf).unwrap();
    tree.set_policy(
        &pattern("/"),
        Arc::new(CountingPolicy {
            attaches: Arc::clone(&attaches),
            detaches: Arc::clone(&detaches),
        }),
    )
    .unwrap();

    // Root, /a, /a/b, /a/c.
    let node_count = 4;
    let prefix = name("/cycle");

    tree.attach(prefix.clone(), engine.clone()).await.unwrap();
    assert_eq!(attaches.load(Ordering::SeqCst), node_count);
    assert_eq!(detaches.load(Ordering::SeqCst), 0);

    // A second attach is rejected while bound.
    let err = tree.attach(prefix.clone(), engine.clone()).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));

    tree.detach().await;
    assert_eq!(detaches.load(Ordering::SeqCst), node_count);

    // Detaching restored a state where attaching succeeds again.
    tree.attach(prefix, engine).await.unwrap();
    assert_eq!(attaches.load(Ordering::SeqCst), 2 * node_count);
}

#[tokio::test]
async fn register_policy_announces_routes() {
    let (producer_engine, nfd_engine) = engine_pair().await;

    // The peer stands in for NFD's RIB manager.
    let registrations = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&registrations);
    nfd_engine
        .attach_handler(
            &name("/localhost/nfd/rib"),
            Arc::new(move |ctx: InterestContext| {
                seen.fetch_add(1, Ordering::SeqCst);
                let response = rust_ndn_engine::mgmt::ControlResponse {
                    status_code: 200,
                    status_text: "OK".into(),
                };
                let content = rust_ndn_engine::mgmt::encode_control_response(&response);
                let data = rust_ndn_common::packet::Data::new(ctx.interest.name.clone())
                    .with_content(Wire::from(content));
                let encoded = data.encode_signed(&Sha256Signer).unwrap();
                (ctx.reply)(encoded.wire).unwrap();
            }),
        )
        .unwrap();

    let tree = Tree::new();
    tree.put_node(&pattern("/data"), NodeKind::Leaf).unwrap();
    tree.set_policy(&pattern("/"), Arc::new(RegisterPolicy::new(true)))
        .unwrap();
    tree.attach(name("/announced/app"), producer_engine.clone())
        .await
        .unwrap();
    assert_eq!(registrations.load(Ordering::SeqCst), 1);

    // Detach withdraws the route with an unregister command.
    tree.detach().await;
    assert_eq!(registrations.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn structure_is_frozen_while_attached() {
    let (engine, _peer) = engine_pair().await;
    let tree = Tree::new();
    tree.put_node(&pattern("/x"), NodeKind::Leaf).unwrap();
    tree.attach(name("/frozen"), engine.clone()).await.unwrap();

    let err = tree.put_node(&pattern("/y"), NodeKind::Leaf).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));

    tree.detach().await;
    tree.put_node(&pattern("/y"), NodeKind::Leaf).unwrap();
}

#[tokio::test]
async fn need_rejects_forged_signatures() {
    let (producer_engine, consumer_engine) = engine_pair().await;
    let prefix = name("/authn");

    // Producer signs with a digest, but the consumer requires an HMAC
    // under a key the producer does not hold.
    let producer = Tree::new();
    producer.put_node(&pattern("/secret"), NodeKind::Leaf).unwrap();
    producer
        .set_policy(&pattern("/secret"), Arc::new(Sha256SignerPolicy::new()))
        .unwrap();
    producer
        .on_interest(
            &pattern("/secret"),
            Arc::new(|event| {
                let wire = event.provide(Wire::from(&b"forged"[..])).unwrap();
                event.reply(wire).unwrap();
                ControlFlow::Break(())
            }),
        )
        .unwrap();
    producer
        .attach(prefix.clone(), producer_engine.clone())
        .await
        .unwrap();

    let consumer = Tree::new();
    consumer
        .put_node(&pattern("/secret"), NodeKind::ExpressPoint)
        .unwrap();
    consumer
        .set_policy(
            &pattern("/secret"),
            Arc::new(FixedHmacSignerPolicy::new(&b"trusted key"[..])),
        )
        .unwrap();
    consumer
        .edit_node(&pattern("/secret"), |node| {
            node.properties_mut().lifetime = Duration::from_millis(500);
            node.properties_mut().must_be_fresh = false;
        })
        .unwrap();
    consumer
        .attach(prefix.clone(), consumer_engine.clone())
        .await
        .unwrap();

    let err = consumer
        .at(&pattern("/secret"))
        .unwrap()
        .apply(Matching::new())
        .need()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
