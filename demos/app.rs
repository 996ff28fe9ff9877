use std::sync::Arc;

use dragon_boot::config::{source_factory, BagSource};
use dragon_boot::factory::{driver_validator, DriverCreator};
use dragon_boot::{Access, AppContext, Bag, Config, Factory, Resource, SourceEntry, Value};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct AppSection {
    name: String,
    debug: bool,
}

#[derive(Debug)]
struct Cache {
    capacity: u64,
}

fn main() -> Result<(), dragon_boot::Error> {
    let mut defaults = Bag::new();
    defaults.set("app.name", "demo")?;
    defaults.set("app.debug", false)?;
    defaults.set("caches.main.driver", "memory")?;
    defaults.set("caches.main.capacity", 64u64)?;

    // APP__APP__DEBUG=true overrides the defaults
    let config = Arc::new(
        Config::builder()
            .with_source("defaults", SourceEntry::new(Arc::new(BagSource::new(0, defaults))))
            .with_env("APP", "__", 10)
            .build()?,
    );
    config.load_sources(&source_factory(config.clone()))?;

    config.add_observer("demo", "app.name", |old: &Value, new: &Value| {
        println!("app.name changed: {old:?} -> {new:?}");
    })?;

    let ctx = AppContext::new(config.clone());
    ctx.provide(|ctx: &AppContext| {
        let caches: Factory<Cache> = Factory::new(ctx.config().clone(), "caches")
            .with_validator(driver_validator("cache"))
            .with_creator(DriverCreator::new("memory", |config: &Bag| {
                Ok(Resource::new(Arc::new(Cache {
                    capacity: config.uint("capacity"),
                })))
            }));
        Ok(Arc::new(caches))
    })?;

    let app: AppSection = config.populate("app")?;
    println!("App: {} (debug={})", app.name, app.debug);

    let caches = ctx.resolve::<Factory<Cache>>()?;
    println!("Cache capacity: {}", caches.get("main")?.capacity);

    config.set("app.name", "renamed")?;
    ctx.shutdown()
}
