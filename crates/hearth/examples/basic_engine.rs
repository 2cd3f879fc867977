//! Basic example demonstrating the Hearth engine.
//!
//! This example shows how to:
//! - Build an Engine over a directory of assets
//! - Load text and play audio through the cooperative update loop
//! - Evict unused clips
//! - Let drop perform the teardown
//!
//! Run with: cargo run -p hearth --example basic_engine

use std::time::Duration;

use hearth::audio::wav::encode_pcm16;
use hearth::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    hearth::core::logging::init_with_filter("hearth=debug,info");

    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("motd.txt"), "Stay warm.")?;
    let beep = AudioClip::new(vec![0.1; 4410], 1, 44100);
    std::fs::write(dir.path().join("beep.wav"), encode_pcm16(&beep)?)?;

    let mut engine = Engine::builder()
        .with_asset_root(dir.path())
        .with_audio_channels(2)
        .build()?;

    engine.assets_mut().load::<String>(
        "motd.txt",
        |text| println!("Message of the day: {text}"),
        |err| eprintln!("{err}"),
    );
    for _ in 0..3 {
        // The first call loads; all three share the load and each gets a channel.
        engine.audio_mut().play_sound("beep.wav", false, 0.8);
    }

    let frame = Duration::from_millis(16);
    while engine.assets().pending_count() + engine.audio().pending_count() > 0 {
        engine.update(frame);
        std::thread::sleep(frame);
    }
    println!(
        "{} channels, {} playing",
        engine.audio().pool().len(),
        engine.audio().pool().playing_count()
    );

    // 100 ms clip: a few frames later every channel is idle again.
    for _ in 0..10 {
        engine.update(frame);
    }
    println!("Evicted {} unused clip(s)", engine.audio_mut().clear_unused_clips());

    for event in engine.assets_mut().drain_events() {
        println!("{event:?}");
    }
    Ok(())
}
