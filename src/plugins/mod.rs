// Roundtrip is the reference plugin: both lifecycle hooks, scoped sends in
// both directions
pub mod roundtrip;

pub use roundtrip::Roundtrip;
