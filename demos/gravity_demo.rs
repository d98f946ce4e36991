//! Small end-to-end walkthrough of the engine facade: register component
//! types and a tuple query, spawn a few entities, run a handful of
//! systems across several ticks, then tear everything down.
//!
//! Run with `cargo run --example gravity_demo` from the workspace root.

use ecs_core::component::ComponentTypeId;
use ecs_core::util::IntoTupleSpec;
use ecs_core::{Component, ComponentRef, Engine, EngineConfig, System};
use std::any::Any;

#[derive(Component, Debug, Default)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Component, Debug, Default)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Component, Debug, Default)]
struct Enemy;

/// Integrates `Velocity` into `Position` for every entity carrying both.
struct MovementSystem {
    position_id: ComponentTypeId,
    velocity_id: ComponentTypeId,
    tuple_hash: u64,
}

impl MovementSystem {
    fn new(engine: &mut Engine) -> Self {
        let position_id = engine.registry().id_by_type::<Position>().unwrap();
        let velocity_id = engine.registry().id_by_type::<Velocity>().unwrap();
        let tuple_hash = engine.register_tuple_of::<(Position, Velocity)>();
        MovementSystem {
            position_id,
            velocity_id,
            tuple_hash,
        }
    }
}

impl System for MovementSystem {
    fn priority(&self) -> i32 {
        200
    }

    fn update(&mut self, engine: &mut Engine) {
        let moving: Vec<(ComponentRef, ComponentRef)> = engine
            .view_tuple(self.tuple_hash)
            .expect("movement tuple registered in new()")
            .map(|(_, tuple)| (tuple.refs[0].clone(), tuple.refs[1].clone()))
            .collect();

        for (pos_ref, vel_ref) in moving {
            let pos = pos_ref.downcast::<Position>(self.position_id).unwrap();
            let vel = vel_ref.downcast::<Velocity>(self.velocity_id).unwrap();
            let delta = vel.get(|v| (v.dx, v.dy)).unwrap_or((0.0, 0.0));
            pos.get_mut(|p| {
                p.x += delta.0;
                p.y += delta.1;
            });
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Spawns a wandering `Enemy` every other tick until three are alive.
struct SpawnerSystem {
    enemy_tuple_hash: u64,
    tick: u32,
}

impl SpawnerSystem {
    fn new(engine: &mut Engine) -> Self {
        let enemy_tuple_hash = engine.register_tuple_of::<(Enemy,)>();
        SpawnerSystem {
            enemy_tuple_hash,
            tick: 0,
        }
    }
}

impl System for SpawnerSystem {
    fn priority(&self) -> i32 {
        100
    }

    fn update(&mut self, engine: &mut Engine) {
        self.tick += 1;
        let enemy_count = engine
            .view_tuple(self.enemy_tuple_hash)
            .expect("enemy tuple registered in new()")
            .count();

        if self.tick % 2 == 0 && enemy_count < 3 {
            log::info!("spawning enemy #{}", enemy_count + 1);
            let handle = engine.create_entity();
            let enemy = engine.create_component::<Enemy>().unwrap();
            let pos = engine.create_component::<Position>().unwrap();
            pos.get_mut(|p| {
                p.x = 10.0 * enemy_count as f32;
                p.y = 0.0;
            });
            let vel = engine.create_component::<Velocity>().unwrap();
            vel.get_mut(|v| {
                v.dx = -1.0;
                v.dy = 0.5;
            });
            engine.add_component(handle.id(), enemy.erased());
            engine.add_component(handle.id(), pos.erased());
            engine.add_component(handle.id(), vel.erased());
            engine.activate(handle.id());
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Logs every entity's position. Runs last so it reports the frame's
/// settled state rather than a half-updated one.
struct ReportSystem {
    position_id: ComponentTypeId,
    tuple_hash: u64,
}

impl ReportSystem {
    fn new(engine: &mut Engine) -> Self {
        let position_id = engine.registry().id_by_type::<Position>().unwrap();
        let tuple_hash = engine.register_tuple_of::<(Position,)>();
        ReportSystem {
            position_id,
            tuple_hash,
        }
    }
}

impl System for ReportSystem {
    fn priority(&self) -> i32 {
        10
    }

    fn update(&mut self, engine: &mut Engine) {
        let positions: Vec<(ecs_core::EntityId, ComponentRef)> = engine
            .view_tuple(self.tuple_hash)
            .expect("position tuple registered in new()")
            .map(|(id, tuple)| (*id, tuple.refs[0].clone()))
            .collect();

        for (id, pos_ref) in positions {
            let pos = pos_ref.downcast::<Position>(self.position_id).unwrap();
            pos.get(|p| log::info!("entity {:?} at ({:.1}, {:.1})", id, p.x, p.y));
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn main() {
    env_logger::init();

    let mut engine = Engine::new(EngineConfig::default());
    engine.register_component_type::<Position>("Position");
    engine.register_component_type::<Velocity>("Velocity");
    engine.register_component_type::<Enemy>("Enemy");
    engine.init();

    let movement = MovementSystem::new(&mut engine);
    let spawner = SpawnerSystem::new(&mut engine);
    let report = ReportSystem::new(&mut engine);
    engine.register_system(movement);
    engine.register_system(spawner);
    engine.register_system(report);

    let player = engine.create_entity();
    let pos = engine.create_component::<Position>().unwrap();
    let vel = engine.create_component::<Velocity>().unwrap();
    vel.get_mut(|v| {
        v.dx = 2.0;
        v.dy = 1.0;
    });
    engine.add_component(player.id(), pos.erased());
    engine.add_component(player.id(), vel.erased());
    engine.activate(player.id());

    for frame in 0..6 {
        log::info!("-- frame {frame} --");
        engine.tick();
    }

    engine.destroy_entity(player.id());
    engine.destroy();
}
