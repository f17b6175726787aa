mod is_manifold;

pub use is_manifold::IsManifold;
