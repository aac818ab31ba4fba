//! The `consume` command: fetch one versioned Data packet.

use anyhow::{bail, Context, Result};
use rust_ndn_common::name::Name;
use rust_ndn_common::pattern::{Matching, NamePattern};
use rust_ndn_common::tlv::nat_bytes;
use rust_ndn_engine::security::{self, Sha256Signer};
use rust_ndn_engine::{Engine, Face, Timer};
use rust_ndn_schema::{NodeKind, Sha256SignerPolicy, Tree};
use std::sync::Arc;
use std::time::Duration;

pub async fn run(
    socket: String,
    prefix: String,
    version: Option<u64>,
    timeout: u64,
) -> Result<()> {
    let prefix: Name = prefix.parse().context("invalid prefix")?;
    let leaf: NamePattern = "/<v=time>".parse().expect("static pattern");

    let engine = Engine::new(
        Face::unix(socket),
        Timer::new(),
        Arc::new(Sha256Signer),
        security::pass_all(),
    );
    engine.start().await.context("unable to start engine")?;

    let tree = Tree::new();
    tree.put_node(&leaf, NodeKind::ExpressPoint)?;
    tree.set_policy(&leaf, Arc::new(Sha256SignerPolicy::new()))?;
    tree.edit_node(&leaf, |node| {
        node.properties_mut().lifetime = Duration::from_millis(timeout);
        node.properties_mut().must_be_fresh = false;
    })?;
    tree.attach(prefix, engine.clone())
        .await
        .context("unable to attach the schema tree")?;

    let version = version.unwrap_or_else(|| engine.timer().timestamp_ms());
    let mut matching = Matching::new();
    matching.insert("time".into(), nat_bytes(version));
    let view = tree
        .at(&leaf)
        .expect("leaf was installed above")
        .apply(matching);

    let outcome = view.need().await;
    tree.detach().await;
    engine.shutdown();

    match outcome {
        Ok(result) => {
            println!("<< D: {}", result.data.name);
            println!(
                "Content: {}",
                String::from_utf8_lossy(&result.content().join())
            );
            Ok(())
        }
        Err(e) => bail!("fetch failed: {e}"),
    }
}
