//! Basic asset loading example demonstrating the asset system.
//!
//! This example shows:
//! - Building a `LoaderFetcher` over a directory
//! - Registering a custom loader and instantiator
//! - Loading with callbacks and pumping `update`
//! - Instantiating and releasing objects
//! - Processing events

use std::sync::Arc;
use std::time::Duration;

use hearth_assets::prelude::*;
use hearth_assets::{AssetInstantiator, FileReader, InstantiateContext, LoaderFetcher, TextLoader};
use hearth_core::TaskPool;
use hearth_core::math::Vec3;

/// A level layout: one row of characters per line.
#[derive(Debug)]
struct Level {
    rows: Vec<String>,
}

impl Asset for Level {
    fn type_name() -> &'static str {
        "Level"
    }
}

struct LevelLoader;

impl AssetLoader for LevelLoader {
    type Asset = Level;

    fn extensions(&self) -> &[&str] {
        &["lvl"]
    }

    fn load(&self, ctx: LoadContext<'_>) -> Result<Self::Asset, AssetError> {
        let text = std::str::from_utf8(ctx.bytes).map_err(|e| ctx.error(e.to_string()))?;
        Ok(Level {
            rows: text.lines().map(str::to_string).collect(),
        })
    }
}

/// A level placed in the world.
#[derive(Debug)]
struct LevelInstance {
    walls: usize,
    origin: Vec3,
}

impl Asset for LevelInstance {
    fn type_name() -> &'static str {
        "LevelInstance"
    }
}

struct LevelInstantiator;

impl AssetInstantiator for LevelInstantiator {
    type Source = Level;
    type Instance = LevelInstance;

    fn instantiate(
        &self,
        level: &Level,
        ctx: InstantiateContext<'_>,
    ) -> Result<LevelInstance, AssetError> {
        let walls = level
            .rows
            .iter()
            .map(|row| row.chars().filter(|c| *c == '#').count())
            .sum();
        Ok(LevelInstance {
            walls,
            origin: ctx.placement.position,
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    hearth_core::logging::init_with_filter("debug");

    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("readme.txt"), "Welcome to the hearth.")?;
    std::fs::write(dir.path().join("first.lvl"), "#####\n#...#\n#####\n")?;

    let pool = Arc::new(TaskPool::new(2)?);
    let fetcher = LoaderFetcher::builder(FileReader::new(dir.path()))
        .with_loader(TextLoader)
        .with_loader(LevelLoader)
        .with_instantiator(LevelInstantiator)
        .build(pool);
    let mut server = AssetServer::new(Arc::new(fetcher));

    server.load::<String>(
        "readme.txt",
        |text| println!("readme: {text}"),
        |err| eprintln!("{err}"),
    );
    // Joins the load above instead of reading the file twice.
    server.load::<String>(
        "readme.txt",
        |text| println!("readme again ({} bytes)", text.len()),
        |err| eprintln!("{err}"),
    );
    server.load::<String>("missing.txt", |_| {}, |err| println!("expected failure: {err}"));

    server.instantiate::<LevelInstance>(
        "first.lvl",
        Placement::at(Vec3::new(10.0, 0.0, 0.0)),
        |level| println!("level {:?} has {} walls at {}", level.id, level.walls, level.origin),
        |err| eprintln!("{err}"),
    );

    while server.pending_count() > 0 {
        server.update();
        std::thread::sleep(Duration::from_millis(1));
    }

    for event in server.drain_events() {
        match event {
            AssetEvent::Loaded { key, handle } => println!("loaded {key} ({handle})"),
            AssetEvent::LoadFailed { key, .. } => println!("failed {key}"),
            AssetEvent::Instantiated { key, id } => println!("instantiated {key} as {id:?}"),
            other => println!("{other:?}"),
        }
    }

    println!("releasing {} cached entries", server.release_all());
    Ok(())
}
