//! The `produce` command: serve versioned content under a prefix.

use anyhow::{Context, Result};
use bytes::Bytes;
use log::{error, info};
use rust_ndn_common::name::Name;
use rust_ndn_common::pattern::NamePattern;
use rust_ndn_common::tlv::parse_nat;
use rust_ndn_common::wire::Wire;
use rust_ndn_engine::security::{self, Sha256Signer};
use rust_ndn_engine::{Engine, Face, Timer};
use rust_ndn_schema::{
    MemStoragePolicy, NodeKind, RegisterPolicy, Sha256SignerPolicy, Tree,
};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(socket: String, prefix: String, content: String, freshness: u64) -> Result<()> {
    let prefix: Name = prefix.parse().context("invalid prefix")?;
    let leaf: NamePattern = "/<v=time>".parse().expect("static pattern");
    let root: NamePattern = "/".parse().expect("static pattern");

    let engine = Engine::new(
        Face::unix(socket),
        Timer::new(),
        Arc::new(Sha256Signer),
        security::pass_all(),
    );
    engine.start().await.context("unable to start engine")?;

    let tree = Tree::new();
    tree.put_node(&leaf, NodeKind::Leaf)?;
    tree.set_policy(&root, Arc::new(RegisterPolicy::new(true)))?;
    tree.set_policy(&root, Arc::new(MemStoragePolicy::new()))?;
    tree.set_policy(&leaf, Arc::new(Sha256SignerPolicy::new()))?;
    tree.edit_node(&leaf, |node| {
        node.properties_mut().freshness = Duration::from_millis(freshness);
    })?;

    let body = Bytes::from(content.into_bytes());
    tree.on_interest(
        &leaf,
        Arc::new(move |event| {
            if let Some(time) = event.binding("time").and_then(|b| parse_nat(b).ok()) {
                println!(">> I: version {time}");
            }
            match event.provide(Wire::from(body.clone())) {
                Ok(wire) => {
                    if let Err(e) = event.reply(wire) {
                        error!("unable to reply with data: {e}");
                    } else {
                        println!("<< D: {}", event.name);
                    }
                }
                Err(e) => error!("unable to provide data: {e}"),
            }
            ControlFlow::Break(())
        }),
    )?;

    tree.attach(prefix.clone(), engine.clone())
        .await
        .context("unable to attach the schema tree")?;

    println!("Serving {prefix} (ctrl-c to exit)");
    tokio::signal::ctrl_c().await?;
    info!("exiting");

    tree.detach().await;
    engine.shutdown();
    Ok(())
}
