pub mod category;
pub mod config;
pub mod consignment;
pub mod customer;
pub mod delivery;
pub mod invoice;
pub mod order;
pub mod product;
pub mod subscription;
pub mod user;

/// Stem lengths the price tiers are quoted for.
pub const STEM_LENGTHS: [i32; 3] = [50, 60, 70];
