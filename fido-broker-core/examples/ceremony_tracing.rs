//! Example demonstrating the tracing output of a full sign ceremony.
//!
//! Run with: cargo run -p fido-broker-core --example ceremony_tracing

use std::sync::Arc;
use std::time::Duration;

use fido_broker_core::{
    codec, AuthenticatorResult, AvailabilityOracle, BrokerConfig, ChannelCollaborator,
    CredentialDescriptor, CredentialOptions, Fido2Service, StaticDeviceSecurity,
};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::new("fido_broker_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Sign Ceremony Tracing Demo ===\n");

    let config = BrokerConfig {
        default_timeout: Duration::from_secs(5),
        sweep_interval: Duration::from_millis(250),
        ..Default::default()
    };
    println!("Config: {:?}\n", config);

    let (collaborator, mut handoffs) = ChannelCollaborator::new(4);
    let service = Fido2Service::new(
        config,
        Arc::new(collaborator),
        AvailabilityOracle::new(StaticDeviceSecurity::new(30, true)),
    );
    let sweeper = match service.start() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to start service: {}", e);
            return;
        }
    };

    println!(
        "Platform authenticator available: {}\n",
        service.is_platform_authenticator_available()
    );

    let options = CredentialOptions::builder("example.com", vec![0x42; 32])
        .allow(CredentialDescriptor::new(vec![0xC0, 0xFF, 0xEE]))
        .timeout_ms(2_000)
        .build();
    let encoded = match codec::encode(&options) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to encode options: {}", e);
            return;
        }
    };

    let reply = service.sign_request(&encoded);
    println!("Dispatch status: {}", reply.status);
    let Some(dispatch) = reply.dispatch else {
        return;
    };

    // Play the UI: pick up the hand-off and answer it
    if let Some(handoff) = handoffs.recv().await {
        println!("UI received hand-off for session {}", handoff.session_id);
        service.on_external_result(&handoff.token, AuthenticatorResult::success(vec![0xAB; 16]));
        // A second answer is dropped
        service.on_external_result(&handoff.token, AuthenticatorResult::Cancelled);
    }

    let result = dispatch.pending.wait().await;
    println!("\nCaller observed: {} ({:?})", result.status(), result);

    service.shutdown();
    let _ = sweeper.await;
    println!("\n=== Demo Complete ===");
}
