pub mod loader;
pub mod provider;

pub use loader::PackageLoader;
pub use provider::{
    AvailableResources, PackageResources, PackageSummary, ResourceFilter, ResourceProvider,
};
