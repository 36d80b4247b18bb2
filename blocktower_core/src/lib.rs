// Procedural block-tower generation library.
//
// Given a base platform and a supply of cuboid blocks, this crate searches
// for geometrically valid, locally stable placements and assembles towers
// one block at a time under block-count and height budgets. Finished towers
// serialize to node-link JSON for external renderers and physics engines; the
// entropy analyzer consumes such an engine (through `PhysicsBackend`) to
// score dynamic stability.
//
// Module overview:
// - `types.rs`:     BlockId and shared numeric tolerances.
// - `error.rs`:     Error enums per concern (block, tower, document, physics, config).
// - `geometry.rs`:  Convex polygons, bounds, lattice points (2D, XY plane).
// - `block.rs`:     BaseBlock / Cuboid shapes, the BlockGeometry trait, PlacedBlock.
// - `tower.rs`:     Copy-on-write support DAG with level and surface queries.
// - `document.rs`:  Node-link document form of a tower.
// - `substance.rs`: Substance table and material mixes.
// - `placement.rs`: Exhaustive placement search.
// - `builder.rs`:   Incremental builder with budgets and placement policies.
// - `generator.rs`: Random block sequences, materials, and configurations.
// - `entropy.rs`:   Perturbation-based kinetic-energy analysis.
// - `config.rs`:    TowerConfig, the JSON-loadable bundle of all tunables.
// - `prng`:         Re-exported from `blocktower_prng`.
//
// **Critical constraint: determinism.** All randomness comes from a seeded
// `TowerRng` passed in by the caller. Parallel work forks per-task streams,
// and no output depends on hash-map iteration order.

pub mod block;
pub mod builder;
pub mod config;
pub mod document;
pub mod entropy;
pub mod error;
pub mod generator;
pub mod geometry;
pub mod placement;
pub use blocktower_prng as prng;
pub mod substance;
pub mod tower;
pub mod types;
