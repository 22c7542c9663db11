//! Reference models driven through [`Fittable`](crate::Fittable).

pub mod kmeans;
pub mod normal;

pub use kmeans::{KMeans, KMeansSummary};
pub use normal::{NormalDistribution, NormalSummary};
