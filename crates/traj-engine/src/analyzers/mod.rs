pub mod clustering;
pub mod msd;
pub mod profile;
pub mod rdf;
pub mod vacf;

pub use clustering::Clustering;
pub use msd::{MeanSquaredDisplacement, UnwrapPolicy};
pub use profile::{DensityProfile, TemperatureProfile};
pub use rdf::RadialDistribution;
pub use vacf::VelocityAutocorrelation;
