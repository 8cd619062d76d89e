use anyhow::Result;
use std::{sync::Arc, time::Duration};

use crevice_client::{ClientOptions, NativeClient};
use crevice_relay_server::{MemoryBus, MemoryRegistry};

use crate::test_utils::{
    connect_first, initiator_client, participant_client,
    spawn_server,
};

/// Two clients pair across two nodes sharing a registry and a
/// bus: the second join happens on the other node, the ready
/// signal reaches the creator through the bus and relayed
/// messages cross nodes via bus publish plus local fan-out.
#[tokio::test]
async fn integration_pairing_across_nodes() -> Result<()> {
    let registry = Arc::new(MemoryRegistry::new(
        Duration::from_secs(30),
    ));
    let bus = Arc::new(MemoryBus::new());
    let node_one =
        spawn_server(Arc::clone(&registry), Arc::clone(&bus))
            .await?;
    let node_two =
        spawn_server(Arc::clone(&registry), Arc::clone(&bus))
            .await?;

    let (alice, alice_events, room_id) =
        connect_first(&node_one).await?;

    let options = ClientOptions {
        room_id: Some(room_id),
    };
    let (bob, bob_loop) =
        NativeClient::new(&node_two, options).await?;
    let bob_events = bob_loop.run();

    let alice_task =
        tokio::spawn(initiator_client(alice, alice_events));
    let bob_task =
        tokio::spawn(participant_client(bob, bob_events));

    alice_task.await??;
    bob_task.await??;
    Ok(())
}
