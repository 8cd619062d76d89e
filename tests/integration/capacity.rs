use anyhow::Result;
use std::{sync::Arc, time::Duration};

use crevice_client::{ClientOptions, NativeClient};
use crevice_relay_server::{MemoryBus, MemoryRegistry};

use crate::test_utils::{
    connect_first, initiator_client, participant_client,
    spawn_server,
};

/// A third client joining a full room is refused at admission
/// time, even from another node, and the established pair is
/// unaffected.
#[tokio::test]
async fn integration_room_capacity() -> Result<()> {
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

    let (bob, bob_loop) = NativeClient::new(
        &node_one,
        ClientOptions {
            room_id: Some(room_id.clone()),
        },
    )
    .await?;
    let bob_events = bob_loop.run();

    // The room is full; a third participant is refused before
    // the upgrade completes
    let refused = NativeClient::new(
        &node_two,
        ClientOptions {
            room_id: Some(room_id),
        },
    )
    .await;
    assert!(refused.is_err());

    // The established pair still works end to end
    let alice_task =
        tokio::spawn(initiator_client(alice, alice_events));
    let bob_task =
        tokio::spawn(participant_client(bob, bob_events));

    alice_task.await??;
    bob_task.await??;
    Ok(())
}
