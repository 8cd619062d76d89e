use anyhow::Result;
use std::{sync::Arc, time::Duration};

use crevice_client::{ClientOptions, NativeClient};
use crevice_relay_server::{MemoryBus, MemoryRegistry};

use crate::test_utils::{
    connect_first, initiator_client, participant_client,
    spawn_server,
};

/// Two clients pair on a single node: the creator learns the
/// generated room id, the key exchange converges, an encrypted
/// ping/pong round trips and the survivor is signalled when the
/// peer hangs up.
#[tokio::test]
async fn integration_pairing_single_node() -> Result<()> {
    let registry = Arc::new(MemoryRegistry::new(
        Duration::from_secs(30),
    ));
    let bus = Arc::new(MemoryBus::new());
    let server =
        spawn_server(Arc::clone(&registry), Arc::clone(&bus))
            .await?;

    let (alice, alice_events, room_id) =
        connect_first(&server).await?;

    let options = ClientOptions {
        room_id: Some(room_id),
    };
    let (bob, bob_loop) =
        NativeClient::new(&server, options).await?;
    let bob_events = bob_loop.run();

    let alice_task =
        tokio::spawn(initiator_client(alice, alice_events));
    let bob_task =
        tokio::spawn(participant_client(bob, bob_events));

    alice_task.await??;
    bob_task.await??;
    Ok(())
}
