//! Engine tests over in-memory face pairs.

use super::*;
use crate::security::{self, Sha256Signer};
use bytes::BytesMut;
use rust_ndn_common::packet::nack_reason;
use rust_ndn_common::tlv::{self, TlNum};

async fn start_pair() -> (Engine, Engine) {
    let (face_a, face_b) = Face::memory_pair();
    let producer = Engine::new(
        face_a,
        Timer::new(),
        Arc::new(Sha256Signer),
        security::pass_all(),
    );
    let consumer = Engine::new(
        face_b,
        Timer::new(),
        Arc::new(Sha256Signer),
        security::digest_validator(),
    );
    producer.start().await.unwrap();
    consumer.start().await.unwrap();
    (producer, consumer)
}

fn echo_handler(content: &'static [u8]) -> InterestHandler {
    Arc::new(move |ctx: InterestContext| {
        let data = Data::new(ctx.interest.name.clone())
            .with_content(Wire::from(content))
            .with_freshness(Duration::from_secs(1));
        let encoded = data.encode_signed(&Sha256Signer).unwrap();
        (ctx.reply)(encoded.wire).unwrap();
    })
}

#[tokio::test]
async fn express_is_satisfied_by_peer_handler() {
    let (producer, consumer) = start_pair().await;
    producer
        .attach_handler(&"/app".parse().unwrap(), echo_handler(b"hello"))
        .unwrap();

    let interest = Interest::new("/app/data".parse().unwrap())
        .with_lifetime(Duration::from_millis(500));
    let handle = consumer.express(interest).unwrap();
    match handle.wait().await {
        ExpressResult::Data { data, .. } => {
            assert_eq!(&data.content.unwrap().join()[..], b"hello");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(consumer.metrics().interests_satisfied.value(), 1);
    assert_eq!(producer.metrics().interests_received.value(), 1);
}

#[tokio::test]
async fn longest_prefix_handler_wins() {
    let (producer, consumer) = start_pair().await;
    producer
        .attach_handler(&"/app".parse().unwrap(), echo_handler(b"short"))
        .unwrap();
    producer
        .attach_handler(&"/other/deep/prefix".parse().unwrap(), echo_handler(b"deep"))
        .unwrap();

    let handle = consumer
        .express(
            Interest::new("/other/deep/prefix/x".parse().unwrap())
                .with_lifetime(Duration::from_millis(500)),
        )
        .unwrap();
    match handle.wait().await {
        ExpressResult::Data { data, .. } => {
            assert_eq!(&data.content.unwrap().join()[..], b"deep");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unanswered_interest_times_out() {
    let (_producer, consumer) = start_pair().await;
    let handle = consumer
        .express(
            Interest::new("/nobody/home".parse().unwrap())
                .with_lifetime(Duration::from_millis(100)),
        )
        .unwrap();
    assert!(matches!(handle.wait().await, ExpressResult::Timeout));
    assert_eq!(consumer.metrics().interests_timed_out.value(), 1);
    assert_eq!(consumer.metrics().pending_interests.value(), 0);
}

#[tokio::test]
async fn cancelled_interest_resolves_cancelled() {
    let (_producer, consumer) = start_pair().await;
    let handle = consumer
        .express(Interest::new("/will/cancel".parse().unwrap()))
        .unwrap();
    handle.canceller().cancel();
    assert!(matches!(handle.wait().await, ExpressResult::Cancelled));
    assert_eq!(consumer.metrics().interests_cancelled.value(), 1);
}

#[tokio::test]
async fn shutdown_cancels_in_flight_interests() {
    let (_producer, consumer) = start_pair().await;
    let handle = consumer
        .express(Interest::new("/in/flight".parse().unwrap()))
        .unwrap();
    consumer.shutdown();
    assert!(matches!(handle.wait().await, ExpressResult::Cancelled));

    // Every API call now fails with NotRunning.
    let err = consumer
        .express(Interest::new("/late".parse().unwrap()))
        .unwrap_err();
    assert!(matches!(err, Error::NotRunning));
    let err = consumer
        .attach_handler(&"/late".parse().unwrap(), echo_handler(b""))
        .unwrap_err();
    assert!(matches!(err, Error::NotRunning));
}

#[tokio::test]
async fn covering_prefixes_are_rejected() {
    let (producer, _consumer) = start_pair().await;
    let a: Name = "/a".parse().unwrap();
    let ab: Name = "/a/b".parse().unwrap();
    producer.attach_handler(&a, echo_handler(b"")).unwrap();

    let err = producer.attach_handler(&ab, echo_handler(b"")).unwrap_err();
    assert!(matches!(err, Error::DuplicatePrefix(_)));
    let err = producer.attach_handler(&a, echo_handler(b"")).unwrap_err();
    assert!(matches!(err, Error::DuplicatePrefix(_)));

    producer.detach_handler(&a).unwrap();
    producer.attach_handler(&ab, echo_handler(b"")).unwrap();
    let err = producer.detach_handler(&a).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn nack_resolves_pending_interest() {
    let (producer, consumer) = start_pair().await;
    producer
        .attach_handler(
            &"/nacked".parse().unwrap(),
            Arc::new(move |ctx: InterestContext| {
                let nack = Frame::encode_nack(&ctx.raw, nack_reason::NO_ROUTE);
                (ctx.reply)(nack).unwrap();
            }),
        )
        .unwrap();

    let handle = consumer
        .express(
            Interest::new("/nacked/x".parse().unwrap())
                .with_lifetime(Duration::from_millis(500)),
        )
        .unwrap();
    match handle.wait().await {
        ExpressResult::Nack { reason } => assert_eq!(reason, nack_reason::NO_ROUTE),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(consumer.metrics().interests_nacked.value(), 1);
}

#[tokio::test]
async fn undecodable_interest_never_reaches_handlers() {
    let (producer, consumer) = start_pair().await;
    let hits = Arc::new(AtomicU64::new(0));
    let hits_in_handler = Arc::clone(&hits);
    producer
        .attach_handler(
            &"/a".parse().unwrap(),
            Arc::new(move |_ctx: InterestContext| {
                hits_in_handler.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

    // An Interest carrying an unrecognized critical (type 1000) field.
    let name: Name = "/a/b".parse().unwrap();
    let mut inner = BytesMut::new();
    name.encode(&mut inner);
    tlv::encode_tlv(1000, b"??", &mut inner);
    let mut frame = BytesMut::new();
    TlNum(tlv::TYPE_INTEREST).encode(&mut frame);
    TlNum(inner.len() as u64).encode(&mut frame);
    frame.extend_from_slice(&inner);
    consumer.produce(&Wire::from(frame.freeze())).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(producer.metrics().decode_errors.value(), 1);
}

#[tokio::test]
async fn invalid_signature_is_dropped_not_delivered() {
    let (producer, consumer) = start_pair().await;
    producer
        .attach_handler(
            &"/tampered".parse().unwrap(),
            Arc::new(move |ctx: InterestContext| {
                let data = Data::new(ctx.interest.name.clone())
                    .with_content(Wire::from(&b"x"[..]));
                let encoded = data.encode_signed(&Sha256Signer).unwrap();
                // Corrupt the signature value (the last 32 bytes).
                let mut bytes = encoded.wire.join().to_vec();
                let last = bytes.len() - 1;
                bytes[last] ^= 0xFF;
                (ctx.reply)(Wire::from(bytes)).unwrap();
            }),
        )
        .unwrap();

    let handle = consumer
        .express(
            Interest::new("/tampered/x".parse().unwrap())
                .with_lifetime(Duration::from_millis(200)),
        )
        .unwrap();
    // The tampered Data is rejected by the validator, so the Interest
    // runs out its lifetime instead.
    assert!(matches!(handle.wait().await, ExpressResult::Timeout));
}
